use chrono::NaiveDateTime;
use serde::Serialize;

/// Timestamp layout used for binding and reading `last_visited`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the tracker table: the cumulative view count of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageVisitRecord {
    pub id: i64,
    pub page_id: u64,
    /// Permalink captured on the first recorded view. Used for display when
    /// the page no longer resolves.
    pub page_url: String,
    pub visit_count: u64,
    pub last_visited: NaiveDateTime,
}

/// Storage capability shared by the recorder and both reporters.
///
/// Every operation reports [`StoreError::MissingTable`] when the tracker
/// table has not been created (or was dropped on deactivation).
pub trait VisitStore: Send + Sync {
    /// Name of the backing table, for log context.
    fn table(&self) -> &str;

    /// Create the backing table if it does not exist.
    fn activate(&self) -> Result<(), StoreError>;

    /// Drop the backing table and every record in it.
    fn deactivate(&self) -> Result<(), StoreError>;

    fn is_active(&self) -> Result<bool, StoreError>;

    /// Atomically insert a record with `visit_count = 1`, or increment the
    /// existing record for `page_id` and refresh `last_visited`.
    fn record_visit(
        &self,
        page_id: u64,
        page_url: &str,
        at: NaiveDateTime,
    ) -> Result<(), StoreError>;

    fn find(&self, page_id: u64) -> Result<Option<PageVisitRecord>, StoreError>;

    /// Up to `limit` records, `visit_count` descending, ties by `page_id` ascending.
    fn top_pages(&self, limit: u64) -> Result<Vec<PageVisitRecord>, StoreError>;

    /// All records in insertion order.
    fn tracked_pages(&self) -> Result<Vec<PageVisitRecord>, StoreError>;

    /// Records for `page_id` whose `last_visited` lies in `[start, end]`.
    fn visits_between(
        &self,
        page_id: u64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PageVisitRecord>, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    MissingTable(String),
    Database(duckdb::Error),
    InvalidTimestamp(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTable(table) => write!(f, "Table {table} does not exist"),
            Self::Database(e) => write!(f, "Database error: {e}"),
            Self::InvalidTimestamp(raw) => write!(f, "Invalid timestamp in table: {raw}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<duckdb::Error> for StoreError {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e)
    }
}

/// Parse a timestamp read back from the table.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| StoreError::InvalidTimestamp(raw.to_string()))
}
