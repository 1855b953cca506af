use crate::query::resolver::PageResolver;
use crate::storage::store::{StoreError, VisitStore};
use chrono::NaiveDateTime;
use serde::Deserialize;

/// A page render reported by the host site.
///
/// Only anonymous front-end renders of a real page count as a view; the
/// flags describe why a render should be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ViewRequest {
    #[serde(default)]
    pub page_id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub feed: bool,
    #[serde(default)]
    pub not_found: bool,
    #[serde(default)]
    pub logged_in: bool,
}

/// Why a render was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Admin,
    Feed,
    NotFound,
    LoggedIn,
    MissingPageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    Recorded,
    Skipped(SkipReason),
    /// The store rejected the write; already logged.
    Failed,
}

impl ViewRequest {
    /// Returns the page to count, or the reason this render is excluded.
    pub fn qualify(&self) -> Result<u64, SkipReason> {
        if self.admin {
            return Err(SkipReason::Admin);
        }
        if self.feed {
            return Err(SkipReason::Feed);
        }
        if self.not_found {
            return Err(SkipReason::NotFound);
        }
        if self.logged_in {
            return Err(SkipReason::LoggedIn);
        }
        match self.page_id {
            Some(id) if id > 0 => Ok(id),
            _ => Err(SkipReason::MissingPageId),
        }
    }
}

/// Count one view of the requested page at `now`.
///
/// Never returns an error: write failures are logged and reported as
/// [`ViewOutcome::Failed`] so tracking cannot break page rendering.
pub fn record_view(
    store: &dyn VisitStore,
    resolver: &dyn PageResolver,
    request: &ViewRequest,
    now: NaiveDateTime,
) -> ViewOutcome {
    let page_id = match request.qualify() {
        Ok(id) => id,
        Err(reason) => return ViewOutcome::Skipped(reason),
    };

    let page_url = request
        .url
        .as_deref()
        .map(|u| sanitize_url(u, 2048))
        .filter(|u| !u.is_empty())
        .or_else(|| resolver.permalink(page_id))
        .unwrap_or_default();

    match store.record_visit(page_id, &page_url, now) {
        Ok(()) => {
            tracing::debug!(page_id, "Recorded page view");
            ViewOutcome::Recorded
        }
        Err(StoreError::MissingTable(table)) => {
            tracing::warn!(table = %table, page_id, "Table does not exist, page view not stored");
            ViewOutcome::Failed
        }
        Err(e) => {
            tracing::error!(error = %e, page_id, "Failed to record page view");
            ViewOutcome::Failed
        }
    }
}

/// Strip control characters and truncate to `max_len` characters.
fn sanitize_url(input: &str, max_len: usize) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect()
}
