use crate::query::resolver::{display_title, PageResolver};
use crate::storage::store::{PageVisitRecord, StoreError, VisitStore};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

pub const MISSING_TABLE_MESSAGE: &str =
    "The page view table was not found. Make sure page tracking is activated.";
pub const UNAVAILABLE_MESSAGE: &str = "Page view data is currently unavailable.";

/// Day label layout in chart output.
pub const LABEL_FORMAT: &str = "%d.%m.%Y";

/// Named lookback window for the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartRange {
    #[serde(rename = "7days")]
    SevenDays,
    #[serde(rename = "30days")]
    ThirtyDays,
    #[serde(rename = "90days")]
    NinetyDays,
}

impl ChartRange {
    /// Parse a range key; anything unrecognized means the last 7 days.
    pub fn parse(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            Some("30days") => Self::ThirtyDays,
            Some("90days") => Self::NinetyDays,
            _ => Self::SevenDays,
        }
    }

    pub const fn days(self) -> u32 {
        match self {
            Self::SevenDays => 7,
            Self::ThirtyDays => 30,
            Self::NinetyDays => 90,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::SevenDays => "7days",
            Self::ThirtyDays => "30days",
            Self::NinetyDays => "90days",
        }
    }

    /// `(now - days, now)`.
    pub fn window(self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (now - Days::new(u64::from(self.days())), now)
    }
}

/// Parallel label/value sequences for a time-series chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

/// A tracked page offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOption {
    pub page_id: u64,
    pub title: String,
}

/// Result of the range chart report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartReport {
    Ok {
        pages: Vec<PageOption>,
        selected_page_id: Option<u64>,
        range: ChartRange,
        chart: Option<ChartSeries>,
    },
    Unavailable {
        message: String,
    },
}

/// Spread records over `days` consecutive calendar days starting at `start`.
///
/// Each record lands on the date of its `last_visited` with its cumulative
/// `visit_count`; a later record on the same date replaces an earlier one.
/// Days without a record are 0. Records outside the window are ignored.
pub fn bucket_by_day(records: &[PageVisitRecord], start: NaiveDate, days: u32) -> ChartSeries {
    let mut counts: HashMap<NaiveDate, u64> = HashMap::new();
    for record in records {
        counts.insert(record.last_visited.date(), record.visit_count);
    }

    let (labels, data) = (0..u64::from(days))
        .map(|offset| {
            let date = start + Days::new(offset);
            (
                date.format(LABEL_FORMAT).to_string(),
                counts.get(&date).copied().unwrap_or(0),
            )
        })
        .unzip();

    ChartSeries { labels, data }
}

/// Query one page's records within the range ending at `now` and bucket them by day.
///
/// The table keeps a single row per page, so at most one day in the
/// series can be non-zero: the day of the most recent view, holding the
/// all-time count.
pub fn chart_series(
    store: &dyn VisitStore,
    page_id: u64,
    range: ChartRange,
    now: NaiveDateTime,
) -> Result<ChartSeries, StoreError> {
    let (start, end) = range.window(now);
    let records = store.visits_between(page_id, start, end)?;
    Ok(bucket_by_day(&records, start.date(), range.days()))
}

/// Every tracked page in insertion order, titled for a selector.
pub fn page_options(
    store: &dyn VisitStore,
    resolver: &dyn PageResolver,
) -> Result<Vec<PageOption>, StoreError> {
    Ok(store
        .tracked_pages()?
        .into_iter()
        .map(|record| PageOption {
            page_id: record.page_id,
            title: display_title(resolver, record.page_id, &record.page_url),
        })
        .collect())
}

/// Build the chart report for `page_id` (default: first tracked page).
///
/// `page_id = Some(0)` selects nothing and yields no chart, as does an
/// empty table.
pub fn chart_report(
    store: &dyn VisitStore,
    resolver: &dyn PageResolver,
    page_id: Option<u64>,
    range: ChartRange,
    now: NaiveDateTime,
) -> ChartReport {
    match build_chart_report(store, resolver, page_id, range, now) {
        Ok(report) => report,
        Err(StoreError::MissingTable(table)) => {
            tracing::warn!(table = %table, "Chart requested but table is missing");
            ChartReport::Unavailable {
                message: MISSING_TABLE_MESSAGE.to_string(),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build page view chart");
            ChartReport::Unavailable {
                message: UNAVAILABLE_MESSAGE.to_string(),
            }
        }
    }
}

fn build_chart_report(
    store: &dyn VisitStore,
    resolver: &dyn PageResolver,
    page_id: Option<u64>,
    range: ChartRange,
    now: NaiveDateTime,
) -> Result<ChartReport, StoreError> {
    let pages = page_options(store, resolver)?;
    let selected = page_id
        .or_else(|| pages.first().map(|p| p.page_id))
        .filter(|&id| id != 0);

    let chart = match selected {
        Some(id) => Some(chart_series(store, id, range, now)?),
        None => None,
    };

    Ok(ChartReport::Ok {
        pages,
        selected_page_id: selected,
        range,
        chart,
    })
}
