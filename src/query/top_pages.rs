use crate::query::resolver::{display_link, display_title, PageResolver};
use crate::storage::store::{StoreError, VisitStore};
use serde::Serialize;

pub const MISSING_TABLE_MESSAGE: &str =
    "The page view table has not been created. Activate tracking again or check the database permissions.";
pub const NO_DATA_MESSAGE: &str =
    "No data available yet. Wait until page views have been recorded.";

/// A ranked page, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPage {
    pub page_id: u64,
    pub title: String,
    pub link: String,
    pub visit_count: u64,
}

/// Result of the top-pages report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TopPagesReport {
    Ok { limit: u64, pages: Vec<TopPage> },
    Empty { message: String },
    Unavailable { message: String },
}

/// Build the top-pages report: up to `limit` pages by visit count.
///
/// Never fails. A missing table and an empty result are reported as
/// distinct states; other storage errors are logged and reported as empty.
pub fn top_pages_report(
    store: &dyn VisitStore,
    resolver: &dyn PageResolver,
    limit: u64,
) -> TopPagesReport {
    let records = match store.top_pages(limit) {
        Ok(records) => records,
        Err(StoreError::MissingTable(table)) => {
            tracing::warn!(table = %table, "Top pages requested but table is missing");
            return TopPagesReport::Unavailable {
                message: MISSING_TABLE_MESSAGE.to_string(),
            };
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to query top pages");
            return TopPagesReport::Empty {
                message: NO_DATA_MESSAGE.to_string(),
            };
        }
    };

    if records.is_empty() {
        return TopPagesReport::Empty {
            message: NO_DATA_MESSAGE.to_string(),
        };
    }

    let pages = records
        .into_iter()
        .map(|record| TopPage {
            page_id: record.page_id,
            title: display_title(resolver, record.page_id, &record.page_url),
            link: display_link(resolver, record.page_id, &record.page_url),
            visit_count: record.visit_count,
        })
        .collect();

    TopPagesReport::Ok { limit, pages }
}

/// Parse the leading integer of a query parameter, ignoring trailing text.
///
/// `"5abc"` yields 5, `"abc"` yields `None`. Values outside `i64` saturate.
pub fn leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let sign_len = usize::from(raw.starts_with(['-', '+']));
    let digits_len = raw[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len() - sign_len);
    if digits_len == 0 {
        return None;
    }

    let number = &raw[..sign_len + digits_len];
    Some(number.parse().unwrap_or(if raw.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// Sanitize a raw `limit` parameter.
///
/// Input without a leading number falls back to `default_limit`, negative
/// values become 0, and everything is capped at `max_limit`.
pub fn parse_limit(raw: Option<&str>, default_limit: u64, max_limit: u64) -> u64 {
    let limit = match raw.and_then(leading_integer) {
        Some(n) => u64::try_from(n).unwrap_or(0),
        None => default_limit,
    };
    limit.min(max_limit)
}
