// src/settings.rs
use anyhow::{anyhow, Result};

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Environment-style configuration surface for the watcher process.
/// Loaded once at startup (after `dotenvy::dotenv()` in the binary).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Upstream API credential. May be absent only when every high-cost
    /// tier is disabled via `LOW_QUOTA_MODE` plus an enabled free fallback.
    pub api_key: Option<String>,
    /// Force-skip high-cost tiers regardless of observed quota errors.
    pub low_quota_mode: bool,
    pub quota_error_threshold: u32,
    pub quota_cooldown_minutes: i64,
    pub min_poll_interval_secs: u64,
    pub enable_feed_fallback: bool,
    pub enable_scrape_fallback: bool,
    pub ledger_path: String,
    pub tenants_path: String,
    pub stats_bind_addr: String,
    pub dedup_capacity: usize,
    pub search_page_size: u32,
    pub tenant_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            api_key: std::env::var("YOUTUBE_API_KEY").ok().filter(|s| !s.is_empty()),
            low_quota_mode: env_flag("LOW_QUOTA_MODE"),
            quota_error_threshold: env_parse("QUOTA_ERROR_THRESHOLD", 3u32),
            quota_cooldown_minutes: env_parse("QUOTA_COOLDOWN_MINUTES", 120i64),
            min_poll_interval_secs: env_parse("MIN_POLL_INTERVAL_SECS", 60u64),
            enable_feed_fallback: env_flag("ENABLE_FEED_FALLBACK"),
            enable_scrape_fallback: env_flag("ENABLE_SCRAPE_FALLBACK"),
            ledger_path: std::env::var("LEDGER_PATH")
                .unwrap_or_else(|_| "state/announced.json".to_string()),
            tenants_path: std::env::var("TENANTS_PATH")
                .unwrap_or_else(|_| "config/tenants.json".to_string()),
            stats_bind_addr: std::env::var("STATS_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            dedup_capacity: env_parse("DEDUP_CAPACITY", 50usize),
            search_page_size: env_parse("SEARCH_PAGE_SIZE", 10u32),
            tenant_concurrency: env_parse("TENANT_CONCURRENCY", 4usize).max(1),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Catastrophic startup check: without a credential the API tiers can
    /// never run, so at least one free fallback must be opted in.
    fn validate(&self) -> Result<()> {
        if self.api_key.is_none()
            && !self.enable_feed_fallback
            && !self.enable_scrape_fallback
        {
            return Err(anyhow!(
                "YOUTUBE_API_KEY is not set and no free fallback tier is enabled; \
                 set the key or enable ENABLE_FEED_FALLBACK / ENABLE_SCRAPE_FALLBACK"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_without_fallbacks_is_fatal() {
        let s = Settings {
            api_key: None,
            low_quota_mode: false,
            quota_error_threshold: 3,
            quota_cooldown_minutes: 120,
            min_poll_interval_secs: 60,
            enable_feed_fallback: false,
            enable_scrape_fallback: false,
            ledger_path: "state/announced.json".into(),
            tenants_path: "config/tenants.json".into(),
            stats_bind_addr: "127.0.0.1:8080".into(),
            dedup_capacity: 50,
            search_page_size: 10,
            tenant_concurrency: 4,
        };
        assert!(s.validate().is_err());
        let with_feed = Settings {
            enable_feed_fallback: true,
            ..s
        };
        assert!(with_feed.validate().is_ok());
    }
}
