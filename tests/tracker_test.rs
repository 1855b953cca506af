use axum::body::Body;
use axum::http::{Request, StatusCode};
use duckdb::Connection;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use std::sync::Arc;
use top_pages_tracker::config::Config;
use top_pages_tracker::ingest::handler::AppState;
use top_pages_tracker::query::resolver::{PageDirectory, PageEntry};
use top_pages_tracker::server::build_router;
use top_pages_tracker::storage::duck::DuckDbStore;
use top_pages_tracker::storage::store::VisitStore;
use tower::ServiceExt;

fn make_test_state(config: &Config) -> (Arc<AppState>, DuckDbStore) {
    let conn = Connection::open_in_memory().unwrap();
    let store = DuckDbStore::new(Arc::new(Mutex::new(conn)), config.table_name());
    store.activate().unwrap();
    let state = Arc::new(AppState::new(
        Arc::new(store.clone()),
        Arc::new(PageDirectory::new(&config.pages)),
        config,
    ));
    (state, store)
}

async fn send_view(state: &Arc<AppState>, payload: serde_json::Value) -> StatusCode {
    build_router(Arc::clone(state))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/view")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

async fn get_json(state: &Arc<AppState>, uri: &str) -> serde_json::Value {
    let response = build_router(Arc::clone(state))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_views_flow_into_top_pages() {
    let config = Config {
        table_prefix: "wp_".to_string(),
        pages: vec![
            PageEntry {
                id: 10,
                title: Some("Home".to_string()),
                url: Some("https://blog.example.com/".to_string()),
            },
            PageEntry {
                id: 20,
                title: Some("About".to_string()),
                url: Some("https://blog.example.com/about".to_string()),
            },
        ],
        ..Config::default()
    };
    let (state, store) = make_test_state(&config);
    assert_eq!(store.table(), "wp_top_pages_tracker");

    for _ in 0..3 {
        let status = send_view(&state, serde_json::json!({ "page_id": 20 })).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    send_view(&state, serde_json::json!({ "page_id": 10 })).await;
    send_view(
        &state,
        serde_json::json!({ "page_id": 30, "url": "https://blog.example.com/?p=30" }),
    )
    .await;

    // Excluded renders never reach the table
    for flag in ["admin", "feed", "not_found", "logged_in"] {
        let mut payload = serde_json::json!({ "page_id": 10 });
        payload[flag] = serde_json::Value::Bool(true);
        assert_eq!(send_view(&state, payload).await, StatusCode::NO_CONTENT);
    }

    let json = get_json(&state, "/api/top-pages").await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["limit"], 10);
    let pages = json["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 3);

    assert_eq!(pages[0]["title"], "About");
    assert_eq!(pages[0]["visit_count"], 3);
    // Tie between page 10 and page 30 goes to the lower page id
    assert_eq!(pages[1]["page_id"], 10);
    assert_eq!(pages[1]["title"], "Home");
    assert_eq!(pages[1]["visit_count"], 1);
    assert_eq!(pages[2]["page_id"], 30);
    assert_eq!(pages[2]["title"], "https://blog.example.com/?p=30");
    assert_eq!(pages[2]["link"], "https://blog.example.com/?p=30");
    assert_eq!(pages[2]["visit_count"], 1);

    // Without the tie, the higher count ranks first regardless of page id
    send_view(&state, serde_json::json!({ "page_id": 30 })).await;
    let json = get_json(&state, "/api/top-pages").await;
    let order: Vec<_> = json["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["page_id"].as_u64().unwrap())
        .collect();
    assert_eq!(order, vec![20, 30, 10]);
}

#[tokio::test]
async fn test_concurrent_views_through_router() {
    let (state, store) = make_test_state(&Config::default());

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let state = Arc::clone(&state);
            tokio::spawn(async move { send_view(&state, serde_json::json!({ "page_id": 7 })).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::ACCEPTED);
    }

    let record = store.find(7).unwrap().unwrap();
    assert_eq!(record.visit_count, 50);
    assert_eq!(store.tracked_pages().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chart_lists_pages_in_insertion_order() {
    let (state, _store) = make_test_state(&Config::default());
    send_view(&state, serde_json::json!({ "page_id": 8, "url": "/eight" })).await;
    send_view(&state, serde_json::json!({ "page_id": 2, "url": "/two" })).await;

    let json = get_json(&state, "/api/chart?range=30days").await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["range"], "30days");
    assert_eq!(json["selected_page_id"], 8);
    let pages = json["pages"].as_array().unwrap();
    assert_eq!(pages[0]["page_id"], 8);
    assert_eq!(pages[1]["page_id"], 2);
    assert_eq!(json["chart"]["labels"].as_array().unwrap().len(), 30);

    let json = get_json(&state, "/api/chart?page_id=2&range=7days").await;
    assert_eq!(json["selected_page_id"], 2);
    assert_eq!(json["chart"]["data"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_deactivated_tracking_degrades_gracefully() {
    let (state, store) = make_test_state(&Config::default());
    send_view(&state, serde_json::json!({ "page_id": 1 })).await;
    store.deactivate().unwrap();

    assert_eq!(
        send_view(&state, serde_json::json!({ "page_id": 1 })).await,
        StatusCode::NO_CONTENT
    );

    let json = get_json(&state, "/api/top-pages").await;
    assert_eq!(json["status"], "unavailable");

    let json = get_json(&state, "/api/chart").await;
    assert_eq!(json["status"], "unavailable");
    assert!(json["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("top_pages.duckdb");
    let at = chrono::Utc::now().naive_utc();

    {
        let conn = Connection::open(&path).unwrap();
        let store = DuckDbStore::new(Arc::new(Mutex::new(conn)), "top_pages_tracker".to_string());
        store.activate().unwrap();
        store.record_visit(4, "/four", at).unwrap();
        store.record_visit(4, "/four", at).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    let store = DuckDbStore::new(Arc::new(Mutex::new(conn)), "top_pages_tracker".to_string());
    store.activate().unwrap();
    store.record_visit(4, "/four", at).unwrap();
    assert_eq!(store.find(4).unwrap().unwrap().visit_count, 3);
}
