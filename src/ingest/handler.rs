use crate::api::admin::AdminToken;
use crate::config::Config;
use crate::ingest::recorder::{record_view, ViewOutcome, ViewRequest};
use crate::query::resolver::PageResolver;
use crate::storage::store::VisitStore;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn VisitStore>,
    pub resolver: Arc<dyn PageResolver>,
    pub default_limit: u64,
    pub max_limit: u64,
    pub dashboard_origin: Option<String>,
    pub admin_token: Option<AdminToken>,
    pub views_recorded_total: AtomicU64,
    pub views_skipped_total: AtomicU64,
    pub record_failures_total: AtomicU64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn VisitStore>,
        resolver: Arc<dyn PageResolver>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            resolver,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
            dashboard_origin: config.dashboard_origin.clone(),
            admin_token: config.admin_token.as_deref().map(AdminToken::new),
            views_recorded_total: AtomicU64::new(0),
            views_skipped_total: AtomicU64::new(0),
            record_failures_total: AtomicU64::new(0),
        }
    }
}

/// POST /api/view: Page render trigger.
///
/// Returns 202 when a view was counted and 204 when it was skipped or could
/// not be stored. Storage failures are logged, never reported to the caller.
pub async fn ingest_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewRequest>,
) -> StatusCode {
    let state2 = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || {
        let now = Utc::now().naive_utc();
        record_view(state2.store.as_ref(), state2.resolver.as_ref(), &request, now)
    })
    .await;

    match outcome {
        Ok(ViewOutcome::Recorded) => {
            state.views_recorded_total.fetch_add(1, Ordering::Relaxed);
            StatusCode::ACCEPTED
        }
        Ok(ViewOutcome::Skipped(reason)) => {
            tracing::debug!(?reason, "Page view skipped");
            state.views_skipped_total.fetch_add(1, Ordering::Relaxed);
            StatusCode::NO_CONTENT
        }
        Ok(ViewOutcome::Failed) => {
            state.record_failures_total.fetch_add(1, Ordering::Relaxed);
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            tracing::error!(error = %e, "Record task panicked");
            state.record_failures_total.fetch_add(1, Ordering::Relaxed);
            StatusCode::NO_CONTENT
        }
    }
}
