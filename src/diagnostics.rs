//! diagnostics.rs — bounded in-memory ring of recent operational events,
//! queryable through the stats surface. Pure read API, no side effects.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagEvent {
    pub time: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug)]
pub struct Diagnostics {
    inner: Mutex<VecDeque<DiagEvent>>,
    cap: usize,
}

impl Diagnostics {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, severity: Severity, message: impl Into<String>) {
        let ev = DiagEvent {
            time: Utc::now(),
            severity,
            message: message.into(),
        };
        let mut v = self.inner.lock().expect("diagnostics mutex poisoned");
        v.push_back(ev);
        while v.len() > self.cap {
            v.pop_front();
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(Severity::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Most recent `n` events, oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<DiagEvent> {
        let v = self.inner.lock().expect("diagnostics mutex poisoned");
        let len = v.len();
        let start = len.saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("diagnostics mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_capacity(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_never_exceeds_capacity() {
        let d = Diagnostics::with_capacity(3);
        for i in 0..5 {
            d.info(format!("event {i}"));
        }
        let snap = d.snapshot_last_n(10);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].message, "event 2");
        assert_eq!(snap[2].message, "event 4");
    }

    #[test]
    fn snapshot_last_n_takes_tail() {
        let d = Diagnostics::with_capacity(10);
        d.info("a");
        d.warn("b");
        d.error("c");
        let snap = d.snapshot_last_n(2);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].message, "b");
        assert_eq!(snap[1].severity, Severity::Error);
    }
}
