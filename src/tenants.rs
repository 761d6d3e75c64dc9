// src/tenants.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use crate::model::TenantWatchConfig;

pub type TenantId = String;

/// External collaborator boundary: supplies per-tenant watch configuration.
/// Safe to call once per tenant per pass; caching is the provider's concern.
#[async_trait]
pub trait TenantConfigProvider: Send + Sync {
    async fn tenants(&self) -> Result<Vec<(TenantId, TenantWatchConfig)>>;
}

// deny_unknown_fields so a plain map without the wrapper falls through to
// the bare-map parse instead of reading as an empty tenant list.
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TenantsFile {
    #[serde(default)]
    tenants: HashMap<String, TenantWatchConfig>,
}

/// File-backed provider. Supports TOML or JSON; re-read on every call so
/// edits land without a restart.
pub struct FileTenantProvider {
    path: PathBuf,
}

impl FileTenantProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn parse(content: &str, hint_ext: &str) -> Result<HashMap<String, TenantWatchConfig>> {
        let try_toml = hint_ext == "toml" || content.trim_start().starts_with('[');
        if try_toml {
            if let Ok(file) = toml::from_str::<TenantsFile>(content) {
                return Ok(file.tenants);
            }
        }
        if let Ok(file) = serde_json::from_str::<TenantsFile>(content) {
            return Ok(file.tenants);
        }
        // Plain JSON map without the `tenants` wrapper.
        if let Ok(map) = serde_json::from_str::<HashMap<String, TenantWatchConfig>>(content) {
            return Ok(map);
        }
        if !try_toml {
            if let Ok(file) = toml::from_str::<TenantsFile>(content) {
                return Ok(file.tenants);
            }
        }
        Err(anyhow!("unsupported tenants file format"))
    }
}

#[async_trait]
impl TenantConfigProvider for FileTenantProvider {
    async fn tenants(&self) -> Result<Vec<(TenantId, TenantWatchConfig)>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading tenants from {}", self.path.display()))?;
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let map = Self::parse(&content, &ext)?;
        let mut out: Vec<_> = map.into_iter().collect();
        // Stable iteration order keeps logs and tests deterministic.
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
