// src/api.rs
//
// Operator-facing stats surface. Read-only: snapshots of the diagnostics
// ring, quota state, and ledger footprint. No watcher state is mutated here.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;

use crate::diagnostics::{DiagEvent, Diagnostics};
use crate::ledger::DedupLedger;
use crate::quota::{QuotaGuard, QuotaSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub diagnostics: Arc<Diagnostics>,
    pub quota: Arc<QuotaGuard>,
    pub ledger: Arc<DedupLedger>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats))
        .route("/debug/quota", get(debug_quota))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct StatsQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(serde::Serialize)]
struct StatsResp {
    events: Vec<DiagEvent>,
    quota: QuotaSnapshot,
    tracked_pairs: usize,
}

async fn stats(State(state): State<AppState>, Query(q): Query<StatsQuery>) -> Json<StatsResp> {
    Json(StatsResp {
        events: state.diagnostics.snapshot_last_n(q.limit.min(200)),
        quota: state.quota.snapshot(Utc::now()),
        tracked_pairs: state.ledger.tracked_pairs(),
    })
}

async fn debug_quota(State(state): State<AppState>) -> Json<QuotaSnapshot> {
    Json(state.quota.snapshot(Utc::now()))
}
