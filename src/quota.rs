// src/quota.rs
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

/// Backoff gate for quota-expensive upstream calls.
/// - Consecutive quota errors past `threshold` open a cooldown window.
/// - Inside the window, high-cost fetch tiers are skipped before any
///   network call is issued.
/// - A success on a high-cost tier resets the error counter.
///
/// Shared across all concurrent channel fetches, so the state sits behind a
/// mutex. Injected explicitly at construction time, never a hidden global.
#[derive(Debug)]
pub struct QuotaGuard {
    threshold: u32,
    cooldown: ChronoDuration,
    force_low_quota: bool,
    state: Mutex<QuotaState>,
}

#[derive(Debug, Default)]
struct QuotaState {
    consecutive_errors: u32,
    suspend_until: Option<DateTime<Utc>>,
}

/// Read-only view for the stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaSnapshot {
    pub consecutive_errors: u32,
    pub suspended: bool,
    pub suspend_until: Option<DateTime<Utc>>,
}

impl QuotaGuard {
    /// `threshold` < 1 is treated as 1; cooldown given in minutes.
    pub fn new(threshold: u32, cooldown_minutes: i64, force_low_quota: bool) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: ChronoDuration::minutes(cooldown_minutes.max(0)),
            force_low_quota,
            state: Mutex::new(QuotaState::default()),
        }
    }

    /// True while high-cost tiers must be skipped at `now`.
    pub fn is_suspended(&self, now: DateTime<Utc>) -> bool {
        if self.force_low_quota {
            return true;
        }
        let st = self.state.lock().expect("quota mutex poisoned");
        matches!(st.suspend_until, Some(until) if now < until)
    }

    /// Record one quota-exceeded response. Crossing the threshold opens the
    /// cooldown window and resets the counter.
    pub fn note_quota_error(&self, now: DateTime<Utc>) {
        let mut st = self.state.lock().expect("quota mutex poisoned");
        st.consecutive_errors += 1;
        if st.consecutive_errors >= self.threshold {
            st.suspend_until = Some(now + self.cooldown);
            st.consecutive_errors = 0;
            tracing::warn!(
                cooldown_mins = self.cooldown.num_minutes(),
                "quota error threshold reached, suspending expensive tiers"
            );
            metrics::counter!("watch_quota_suspensions_total").increment(1);
        }
    }

    /// Record a successful high-cost call; consecutive errors reset to zero.
    pub fn note_success(&self) {
        let mut st = self.state.lock().expect("quota mutex poisoned");
        st.consecutive_errors = 0;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> QuotaSnapshot {
        let st = self.state.lock().expect("quota mutex poisoned");
        QuotaSnapshot {
            consecutive_errors: st.consecutive_errors,
            suspended: self.force_low_quota
                || matches!(st.suspend_until, Some(until) if now < until),
            suspend_until: st.suspend_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn below_threshold_not_suspended() {
        let g = QuotaGuard::new(3, 120, false);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        g.note_quota_error(t0);
        g.note_quota_error(t0);
        assert!(!g.is_suspended(t0));
    }

    #[test]
    fn threshold_errors_suspend_until_cooldown_elapses() {
        let g = QuotaGuard::new(3, 120, false);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        g.note_quota_error(t0);
        g.note_quota_error(t0);
        g.note_quota_error(t0);
        assert!(g.is_suspended(t0));
        let inside = t0 + ChronoDuration::minutes(119);
        assert!(g.is_suspended(inside));
        let after = t0 + ChronoDuration::minutes(121);
        assert!(!g.is_suspended(after));
    }

    #[test]
    fn success_resets_counter() {
        let g = QuotaGuard::new(3, 120, false);
        let t0 = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        g.note_quota_error(t0);
        g.note_quota_error(t0);
        g.note_success();
        g.note_quota_error(t0);
        g.note_quota_error(t0);
        assert!(!g.is_suspended(t0));
    }

    #[test]
    fn low_quota_override_always_suspended() {
        let g = QuotaGuard::new(3, 120, true);
        assert!(g.is_suspended(Utc::now()));
    }
}
