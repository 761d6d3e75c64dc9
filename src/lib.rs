// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod diagnostics;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod quota;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod tenants;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::diagnostics::{DiagEvent, Diagnostics, Severity};
pub use crate::ledger::DedupLedger;
pub use crate::model::{ItemKind, NotifyPayload, TenantWatchConfig, WatchedItem};
pub use crate::notify::{DestinationSender, Dispatcher};
pub use crate::quota::QuotaGuard;
pub use crate::scheduler::Scheduler;
pub use crate::source::{FetchError, FetchStrategy, SourceAdapter};
pub use crate::tenants::{FileTenantProvider, TenantConfigProvider};
