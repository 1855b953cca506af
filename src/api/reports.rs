use crate::api::errors::ApiError;
use crate::ingest::handler::AppState;
use crate::query::range_chart::{self, ChartRange};
use crate::query::top_pages;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for the top pages endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TopPagesParams {
    pub limit: Option<String>,
}

/// Query parameters for the chart endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ChartParams {
    pub page_id: Option<String>,
    pub range: Option<String>,
}

/// Parse a raw `page_id` parameter.
///
/// Empty means "not given". Trailing text after the number is ignored;
/// input without a positive leading number selects no page.
fn parse_page_id(raw: Option<&str>) -> Option<u64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    Some(
        top_pages::leading_integer(raw)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
    )
}

/// GET /api/top-pages: Most visited pages.
pub async fn get_top_pages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopPagesParams>,
) -> Result<Json<top_pages::TopPagesReport>, ApiError> {
    let limit = top_pages::parse_limit(
        params.limit.as_deref(),
        state.default_limit,
        state.max_limit,
    );

    let report = tokio::task::spawn_blocking(move || {
        top_pages::top_pages_report(state.store.as_ref(), state.resolver.as_ref(), limit)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Query task panicked: {e}")))?;

    Ok(Json(report))
}

/// GET /api/chart: Day-bucketed views of one page over a named range.
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChartParams>,
) -> Result<Json<range_chart::ChartReport>, ApiError> {
    let page_id = parse_page_id(params.page_id.as_deref());
    let range = ChartRange::parse(params.range.as_deref());

    let report = tokio::task::spawn_blocking(move || {
        let now = Utc::now().naive_utc();
        range_chart::chart_report(
            state.store.as_ref(),
            state.resolver.as_ref(),
            page_id,
            range,
            now,
        )
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Query task panicked: {e}")))?;

    Ok(Json(report))
}
