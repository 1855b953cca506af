use duckdb::Connection;
use parking_lot::Mutex;
use std::sync::Arc;
use top_pages_tracker::config::Config;
use top_pages_tracker::ingest::handler::AppState;
use top_pages_tracker::query::resolver::PageDirectory;
use top_pages_tracker::server;
use top_pages_tracker::storage::duck::DuckDbStore;
use top_pages_tracker::storage::store::VisitStore;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "top_pages_tracker=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref().map(std::path::Path::new));

    tracing::info!(
        host = %config.host,
        port = config.port,
        data_dir = %config.data_dir.display(),
        in_memory = config.in_memory,
        "Starting Top Pages Tracker"
    );

    // Initialize DuckDB
    let conn = if config.in_memory {
        Connection::open_in_memory().expect("Failed to open DuckDB")
    } else {
        std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");
        Connection::open(config.database_path()).expect("Failed to open DuckDB database file")
    };

    let store = DuckDbStore::new(Arc::new(Mutex::new(conn)), config.table_name());
    if config.auto_activate {
        match store.activate() {
            Ok(()) => tracing::info!(table = %store.table(), "Tracker table created or already present"),
            Err(e) => tracing::error!(
                error = %e,
                table = %store.table(),
                "Failed to create tracker table; views will not be recorded"
            ),
        }
    }

    let resolver = PageDirectory::new(&config.pages);
    tracing::info!(pages = resolver.len(), "Page directory loaded");
    if config.admin_token.is_none() {
        tracing::warn!("No TOPPAGES_ADMIN_TOKEN set, admin routes are disabled");
    }

    let state = Arc::new(AppState::new(Arc::new(store), Arc::new(resolver), &config));

    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
