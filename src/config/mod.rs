// Configuration module entry point
// Loads layered settings (defaults, config file, environment) and runtime state

mod state;
mod types;

use chrono::NaiveDate;
use config::ConfigError;
use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{CaseLayout, ChartConfig, Config, DataConfig, LoggingConfig};

/// Date format used for case table keys and the search page
pub const DATE_FORMAT: &str = "%Y-%m-%d";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("CASES").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "cecil-cases")?
            .set_default("http.max_body_size", 65_536)?
            .set_default("data.database_path", "data.db")?
            .set_default("data.county", "Cecil")?
            .set_default("data.zipcode_table", "zipcode_lookup")?
            .set_default("data.case_table", "covid_cases")?
            .set_default("data.layout", "normalized")?
            .set_default("data.column_prefix", "z_")?
            .set_default("data.date_range_start", "2022-02-01")?
            .set_default("data.date_range_end", "2022-02-28")?
            .set_default("charts.output_dir", "static/graphs")?
            .set_default("charts.url_prefix", "/static/graphs")?
            .set_default("charts.width", 1000)?
            .set_default("charts.height", 500)?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Reject settings that would be interpolated into SQL or break the date list
    pub fn validate(&self) -> Result<(), ConfigError> {
        let data = &self.data;
        for (key, value) in [
            ("data.zipcode_table", data.zipcode_table.as_str()),
            ("data.case_table", data.case_table.as_str()),
        ] {
            if !is_sql_identifier(value) {
                return Err(ConfigError::Message(format!(
                    "{key} must be a plain SQL identifier, got '{value}'"
                )));
            }
        }
        if !data.column_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Message(format!(
                "data.column_prefix may only contain letters, digits and '_', got '{}'",
                data.column_prefix
            )));
        }
        if data.county.trim().is_empty() {
            return Err(ConfigError::Message("data.county must not be empty".to_string()));
        }

        let (start, end) = self.date_range()?;
        if start > end {
            return Err(ConfigError::Message(format!(
                "data.date_range_start ({start}) is after data.date_range_end ({end})"
            )));
        }

        let url_prefix = &self.charts.url_prefix;
        if !url_prefix.starts_with('/') || url_prefix.trim_end_matches('/').is_empty() {
            return Err(ConfigError::Message(format!(
                "charts.url_prefix must be a path below '/', got '{}'",
                self.charts.url_prefix
            )));
        }
        Ok(())
    }

    /// Parsed inclusive date range offered on the search page
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), ConfigError> {
        let parse = |key: &str, value: &str| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .map_err(|e| ConfigError::Message(format!("{key} '{value}' is not a date: {e}")))
        };
        Ok((
            parse("data.date_range_start", &self.data.date_range_start)?,
            parse("data.date_range_end", &self.data.date_range_end)?,
        ))
    }
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
