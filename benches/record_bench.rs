use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use duckdb::Connection;
use parking_lot::Mutex;
use std::sync::Arc;
use top_pages_tracker::query::range_chart::{self, ChartRange};
use top_pages_tracker::query::resolver::PageDirectory;
use top_pages_tracker::query::top_pages;
use top_pages_tracker::storage::duck::DuckDbStore;
use top_pages_tracker::storage::store::VisitStore;

fn bench_time() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn make_store() -> DuckDbStore {
    let conn = Connection::open_in_memory().unwrap();
    let store = DuckDbStore::new(Arc::new(Mutex::new(conn)), "top_pages_tracker".to_string());
    store.activate().unwrap();
    store
}

/// Steady-state upsert cost on a warm connection.
///
/// `pages` controls how many distinct rows the increments spread over, so the
/// larger inputs mostly exercise the conflict (update) path.
fn bench_record_visit(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_visit");
    let at = bench_time();

    for pages in [1u64, 100, 10_000] {
        // Setup outside b.iter(): DuckDB cold start would dominate otherwise
        let store = make_store();

        group.bench_with_input(BenchmarkId::from_parameter(pages), &pages, |b, &pages| {
            let mut i = 0u64;
            b.iter(|| {
                store
                    .record_visit(i % pages + 1, "https://bench.example.com/", at)
                    .unwrap();
                i += 1;
            });
        });
    }

    group.finish();
}

fn bench_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("reports");
    let at = bench_time();
    let resolver = PageDirectory::default();

    let store = make_store();
    for i in 0..10_000u64 {
        store
            .record_visit(i % 1_000 + 1, "https://bench.example.com/", at)
            .unwrap();
    }

    group.bench_function("top_pages_1k_pages", |b| {
        b.iter(|| top_pages::top_pages_report(&store, &resolver, 10));
    });

    group.bench_function("chart_90days", |b| {
        b.iter(|| {
            range_chart::chart_series(&store, 500, ChartRange::NinetyDays, at).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_record_visit, bench_reports);
criterion_main!(benches);
