use crate::api::errors::ApiError;
use crate::ingest::handler::AppState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_KEY: &[u8] = b"top-pages-tracker-admin";

/// Configured admin token, kept only as an HMAC-SHA256 tag.
///
/// Presented tokens are checked with a constant-time tag comparison.
pub struct AdminToken {
    tag: Vec<u8>,
}

impl AdminToken {
    pub fn new(token: &str) -> Self {
        Self {
            tag: token_mac(token).finalize().into_bytes().to_vec(),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        token_mac(presented).verify_slice(&self.tag).is_ok()
    }
}

fn token_mac(token: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(TOKEN_KEY).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    mac
}

/// Extract a bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Middleware guarding the admin routes.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_ref() else {
        return Err(ApiError::Forbidden(
            "Admin routes are disabled; set admin_token to enable them".to_string(),
        ));
    };

    match bearer_token(request.headers()) {
        Some(token) if expected.verify(token) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Rejected admin request with invalid token");
            Err(ApiError::Unauthorized("Invalid admin token".to_string()))
        }
        None => Err(ApiError::Unauthorized("Missing bearer token".to_string())),
    }
}

/// POST /api/admin/activate: Create the tracker table if needed.
pub async fn activate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || store.activate())
        .await
        .map_err(|e| ApiError::Internal(format!("Activation task panicked: {e}")))??;

    tracing::info!(table = %state.store.table(), "Tracking activated");
    Ok(Json(serde_json::json!({
        "status": "active",
        "table": state.store.table(),
    })))
}

/// POST /api/admin/deactivate: Drop the tracker table and all recorded views.
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || store.deactivate())
        .await
        .map_err(|e| ApiError::Internal(format!("Deactivation task panicked: {e}")))??;

    tracing::info!(table = %state.store.table(), "Tracking deactivated, table dropped");
    Ok(Json(serde_json::json!({
        "status": "inactive",
        "table": state.store.table(),
    })))
}
