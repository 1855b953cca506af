use crate::query::resolver::PageEntry;
use crate::storage::schema;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration loaded from environment variables or TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Keep the table in memory only (nothing survives a restart).
    #[serde(default)]
    pub in_memory: bool,
    /// Prepended to the tracker table name, e.g. `wp_`.
    #[serde(default)]
    pub table_prefix: String,
    /// Number of pages in the top list when the request gives no limit.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Upper bound on any requested top list limit.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
    /// Dashboard origin for CORS restrictions on report routes.
    /// If not set, report routes allow any origin.
    #[serde(default)]
    pub dashboard_origin: Option<String>,
    /// Bearer token for the admin lifecycle routes. Admin routes are
    /// disabled when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
    /// Create the tracker table on startup (default: true).
    #[serde(default = "default_auto_activate")]
    pub auto_activate: bool,
    /// Known pages, used for titles and permalinks.
    #[serde(default)]
    pub pages: Vec<PageEntry>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_limit() -> u64 {
    10
}

const fn default_max_limit() -> u64 {
    100
}

const fn default_auto_activate() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            in_memory: false,
            table_prefix: String::new(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            dashboard_origin: None,
            admin_token: None,
            auto_activate: default_auto_activate(),
            pages: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `TOPPAGES_HOST` → host
    /// - `TOPPAGES_PORT` → port
    /// - `TOPPAGES_DATA_DIR` → data_dir
    /// - `TOPPAGES_IN_MEMORY` → in_memory
    /// - `TOPPAGES_TABLE_PREFIX` → table_prefix
    /// - `TOPPAGES_DEFAULT_LIMIT` → default_limit
    /// - `TOPPAGES_MAX_LIMIT` → max_limit
    /// - `TOPPAGES_DASHBOARD_ORIGIN` → dashboard_origin
    /// - `TOPPAGES_ADMIN_TOKEN` → admin_token
    /// - `TOPPAGES_AUTO_ACTIVATE` → auto_activate
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        // Environment variable overrides
        if let Ok(host) = std::env::var("TOPPAGES_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("TOPPAGES_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(data_dir) = std::env::var("TOPPAGES_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(val) = std::env::var("TOPPAGES_IN_MEMORY") {
            config.in_memory = parse_flag(&val);
        }
        if let Ok(prefix) = std::env::var("TOPPAGES_TABLE_PREFIX") {
            config.table_prefix = prefix;
        }
        if let Ok(val) = std::env::var("TOPPAGES_DEFAULT_LIMIT") {
            if let Ok(l) = val.parse() {
                config.default_limit = l;
            }
        }
        if let Ok(val) = std::env::var("TOPPAGES_MAX_LIMIT") {
            if let Ok(l) = val.parse() {
                config.max_limit = l;
            }
        }
        if let Ok(origin) = std::env::var("TOPPAGES_DASHBOARD_ORIGIN") {
            config.dashboard_origin = Some(origin);
        }
        if let Ok(token) = std::env::var("TOPPAGES_ADMIN_TOKEN") {
            config.admin_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(val) = std::env::var("TOPPAGES_AUTO_ACTIVATE") {
            config.auto_activate = parse_flag(&val);
        }

        config
    }

    /// Returns the path to the DuckDB database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("top_pages.duckdb")
    }

    /// Returns the tracker table name, ignoring an unsafe prefix.
    pub fn table_name(&self) -> String {
        if schema::is_valid_prefix(&self.table_prefix) {
            schema::table_name(&self.table_prefix)
        } else {
            tracing::warn!(
                prefix = %self.table_prefix,
                "Invalid table prefix (only ASCII letters, digits and '_' allowed), using none"
            );
            schema::table_name("")
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val != "0" && val.to_lowercase() != "false"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Serializes tests that call `Config::load`, which reads environment
    /// variables that `test_env_var_overrides` mutates.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(!config.in_memory);
        assert!(config.table_prefix.is_empty());
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.max_limit, 100);
        assert!(config.dashboard_origin.is_none());
        assert!(config.admin_token.is_none());
        assert!(config.auto_activate);
        assert!(config.pages.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
host = "127.0.0.1"
port = 9000
data_dir = "/tmp/toppages"
table_prefix = "wp_"
default_limit = 5
max_limit = 50
dashboard_origin = "https://blog.example.com"
admin_token = "s3cret"
auto_activate = false

[[pages]]
id = 1
title = "Home"
url = "https://blog.example.com/"

[[pages]]
id = 42
url = "https://blog.example.com/about"
"#
        )
        .unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/toppages"));
        assert_eq!(config.table_prefix, "wp_");
        assert_eq!(config.default_limit, 5);
        assert_eq!(config.max_limit, 50);
        assert_eq!(
            config.dashboard_origin.as_deref(),
            Some("https://blog.example.com")
        );
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert!(!config.auto_activate);
        assert_eq!(config.pages.len(), 2);
        assert_eq!(config.pages[0].title.as_deref(), Some("Home"));
        assert!(config.pages[1].title.is_none());
        assert_eq!(config.table_name(), "wp_top_pages_tracker");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_load_no_path_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load(None);
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_database_path() {
        let config = Config {
            data_dir: PathBuf::from("/var/toppages"),
            ..Config::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/toppages/top_pages.duckdb")
        );
    }

    #[test]
    fn test_invalid_prefix_falls_back() {
        let config = Config {
            table_prefix: "wp-; DROP".to_string(),
            ..Config::default()
        };
        assert_eq!(config.table_name(), "top_pages_tracker");
    }

    #[test]
    fn test_env_var_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();

        // Save original values
        let orig_port = std::env::var("TOPPAGES_PORT").ok();
        let orig_prefix = std::env::var("TOPPAGES_TABLE_PREFIX").ok();

        std::env::set_var("TOPPAGES_PORT", "3000");
        std::env::set_var("TOPPAGES_TABLE_PREFIX", "blog_");
        let config = Config::load(None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.table_name(), "blog_top_pages_tracker");

        // Restore
        match orig_port {
            Some(v) => std::env::set_var("TOPPAGES_PORT", v),
            None => std::env::remove_var("TOPPAGES_PORT"),
        }
        match orig_prefix {
            Some(v) => std::env::set_var("TOPPAGES_TABLE_PREFIX", v),
            None => std::env::remove_var("TOPPAGES_TABLE_PREFIX"),
        }
    }

    #[test]
    fn test_invalid_toml_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "this is not valid toml {{{").unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("FALSE"));
    }
}
