// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub data: DataConfig,
    pub charts: ChartConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level for application events (debug, info, warn, error)
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

/// Layout of the case table
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseLayout {
    /// One row per (zipcode, date) with a `case_count` column
    Normalized,
    /// One row per date, one column per zip code
    Wide,
}

/// Backing store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub database_path: String,
    /// County name, short ("Cecil") or full ("Cecil County") form
    pub county: String,
    pub zipcode_table: String,
    pub case_table: String,
    pub layout: CaseLayout,
    /// Column name prefix for the wide layout (e.g. `z_21901`)
    pub column_prefix: String,
    /// First date offered on the search page (inclusive)
    pub date_range_start: String,
    /// Last date offered on the search page (inclusive)
    pub date_range_end: String,
}

/// Chart output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub output_dir: String,
    /// URL path under which `output_dir` is served
    pub url_prefix: String,
    pub width: u32,
    pub height: u32,
}
