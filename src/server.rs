use crate::api::{admin, reports};
use crate::ingest::handler::{ingest_view, AppState};
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Permissive CORS for the view trigger (pages may live on any origin)
    let ingestion_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    // Restrictive CORS for report routes
    let dashboard_cors = build_dashboard_cors(state.dashboard_origin.as_deref());

    let report_routes = Router::new()
        .route("/top-pages", get(reports::get_top_pages))
        .route("/chart", get(reports::get_chart))
        .layer(dashboard_cors);

    let admin_routes = Router::new()
        .route("/admin/activate", post(admin::activate))
        .route("/admin/deactivate", post(admin::deactivate))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            admin::require_admin,
        ));

    // A view payload is a few hundred bytes; 16 KB leaves room for long URLs
    let ingestion_routes = Router::new()
        .route("/view", post(ingest_view))
        .layer(DefaultBodyLimit::max(16_384))
        .layer(ingestion_cors);

    let api_routes = Router::new()
        .merge(ingestion_routes)
        .merge(report_routes)
        .merge(admin_routes);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .route("/metrics", get(prometheus_metrics))
        .nest("/api", api_routes)
        .layer(axum::middleware::map_response(add_security_headers))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(30),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Inject OWASP-recommended security headers on every HTTP response.
async fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// Build CORS layer for report routes based on configured origin.
fn build_dashboard_cors(dashboard_origin: Option<&str>) -> CorsLayer {
    dashboard_origin.map_or_else(
        || {
            // No dashboard origin configured, allow all origins
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any)
        },
        |origin| {
            let allowed_origin = origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("*"));
            CorsLayer::new()
                .allow_origin(allowed_origin)
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE])
        },
    )
}

/// GET /health: Simple health check endpoint.
async fn health_check() -> &'static str {
    "ok"
}

/// GET /health/detailed: Health check with storage status.
async fn detailed_health_check(
    State(state): State<Arc<AppState>>,
) -> axum::Json<serde_json::Value> {
    let store = Arc::clone(&state.store);
    let table_active = match tokio::task::spawn_blocking(move || store.is_active()).await {
        Ok(Ok(active)) => Some(active),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Health check could not reach the database");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Health check task panicked");
            None
        }
    };

    axum::Json(serde_json::json!({
        "status": if table_active.is_some() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "table": state.store.table(),
        "table_active": table_active,
        "admin_configured": state.admin_token.is_some(),
    }))
}

/// GET /metrics: Prometheus-compatible metrics endpoint.
async fn prometheus_metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    use std::fmt::Write;
    use std::sync::atomic::Ordering;

    let recorded = state.views_recorded_total.load(Ordering::Relaxed);
    let skipped = state.views_skipped_total.load(Ordering::Relaxed);
    let failures = state.record_failures_total.load(Ordering::Relaxed);

    let mut out = String::with_capacity(512);
    let _ = writeln!(
        out,
        "# HELP toppages_views_recorded_total Page views counted since startup"
    );
    let _ = writeln!(out, "# TYPE toppages_views_recorded_total counter");
    let _ = writeln!(out, "toppages_views_recorded_total {recorded}");
    let _ = writeln!(
        out,
        "# HELP toppages_views_skipped_total Renders excluded from counting since startup"
    );
    let _ = writeln!(out, "# TYPE toppages_views_skipped_total counter");
    let _ = writeln!(out, "toppages_views_skipped_total {skipped}");
    let _ = writeln!(
        out,
        "# HELP toppages_record_failures_total Page views that could not be stored"
    );
    let _ = writeln!(out, "# TYPE toppages_record_failures_total counter");
    let _ = writeln!(out, "toppages_record_failures_total {failures}");

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], out)
}
