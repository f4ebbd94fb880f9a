//! Logger module
//!
//! Leveled, structured event logging plus access logging. A single [`Logger`]
//! is built at process start and handed to every component that logs; there is
//! no global logger.
//!
//! Event lines look like:
//! `2022-02-14T10:00:00+00:00 [DEBUG] case_lookup.not_in_county zipcode=99999`

mod format;
pub mod writer;

pub use format::{AccessLogEntry, AccessLogFormat};

use crate::config::{Config, LoggingConfig};
use chrono::Local;
use std::fmt::{self, Display};
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use writer::LogWriter;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// Key/value pairs attached to an event
pub type Fields<'a> = &'a [(&'a str, &'a dyn Display)];

pub struct Logger {
    level: LogLevel,
    access_log: bool,
    access_format: AccessLogFormat,
    writer: LogWriter,
}

impl Logger {
    pub fn from_config(config: &LoggingConfig) -> io::Result<Self> {
        let level = config
            .level
            .parse()
            .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let writer = LogWriter::new(
            config.access_log_file.as_deref(),
            config.error_log_file.as_deref(),
        )?;

        Ok(Self {
            level,
            access_log: config.access_log,
            access_format: config.access_log_format.as_str().into(),
            writer,
        })
    }

    /// Logger that keeps every line in memory
    #[cfg(test)]
    pub fn buffered(level: LogLevel) -> Self {
        Self {
            level,
            access_log: true,
            access_format: AccessLogFormat::Common,
            writer: LogWriter::buffered(),
        }
    }

    #[cfg(test)]
    pub fn captured(&self) -> Vec<String> {
        self.writer.captured()
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    pub fn debug(&self, event: &str, fields: Fields<'_>) {
        self.event(LogLevel::Debug, event, fields);
    }

    pub fn info(&self, event: &str, fields: Fields<'_>) {
        self.event(LogLevel::Info, event, fields);
    }

    pub fn warn(&self, event: &str, fields: Fields<'_>) {
        self.event(LogLevel::Warn, event, fields);
    }

    pub fn error(&self, event: &str, fields: Fields<'_>) {
        self.event(LogLevel::Error, event, fields);
    }

    pub fn event(&self, level: LogLevel, event: &str, fields: Fields<'_>) {
        if !self.enabled(level) {
            return;
        }
        let line = format_event(&Local::now().to_rfc3339(), level, event, fields);
        if level >= LogLevel::Warn {
            self.writer.write_error(&line);
        } else {
            self.writer.write_info(&line);
        }
    }

    /// Write a formatted access log entry
    pub fn access(&self, entry: &AccessLogEntry) {
        if self.access_log {
            self.writer.write_info(&entry.render(&self.access_format));
        }
    }

    pub fn log_server_start(&self, addr: &SocketAddr, config: &Config) {
        let workers = config
            .server
            .workers
            .map_or_else(|| "default".to_string(), |w| w.to_string());
        let url = format!("http://{addr}");
        self.info(
            "server.started",
            &[
                ("url", &url),
                ("workers", &workers),
                ("database", &config.data.database_path),
                ("charts", &config.charts.output_dir),
            ],
        );
    }

    pub fn log_server_stop(&self) {
        self.info("server.stopped", &[]);
        self.writer.flush();
    }
}

fn format_event(timestamp: &str, level: LogLevel, event: &str, fields: Fields<'_>) -> String {
    let mut line = format!("{timestamp} [{level}] {event}");
    for (key, value) in fields {
        let value = value.to_string();
        if value.is_empty() || value.contains(char::is_whitespace) || value.contains('"') {
            line.push_str(&format!(" {key}={value:?}"));
        } else {
            line.push_str(&format!(" {key}={value}"));
        }
    }
    line
}
