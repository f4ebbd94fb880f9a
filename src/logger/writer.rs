//! Log writer module
//!
//! Thread-safe log writing to files or stdout/stderr.
//! One writer is created at startup and owned by the [`Logger`](super::Logger).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Log output target
enum LogTarget {
    /// Write to stdout
    Stdout,
    /// Write to stderr
    Stderr,
    /// Write to file
    File(File),
    /// Keep lines in memory
    #[cfg(test)]
    Buffer(Vec<String>),
}

/// Thread-safe log writer
pub struct LogWriter {
    /// Access and info log target
    access: Mutex<LogTarget>,
    /// Warning and error log target
    error: Mutex<LogTarget>,
}

impl LogWriter {
    /// Create a new log writer with optional file paths
    pub fn new(access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<Self> {
        let access = match access_log_file {
            Some(path) => LogTarget::File(open_log_file(path)?),
            None => LogTarget::Stdout,
        };

        let error = match error_log_file {
            Some(path) => LogTarget::File(open_log_file(path)?),
            None => LogTarget::Stderr,
        };

        Ok(Self {
            access: Mutex::new(access),
            error: Mutex::new(error),
        })
    }

    /// Writer that collects every line in memory, for tests
    #[cfg(test)]
    pub fn buffered() -> Self {
        Self {
            access: Mutex::new(LogTarget::Buffer(Vec::new())),
            error: Mutex::new(LogTarget::Buffer(Vec::new())),
        }
    }

    /// Write to access/info log
    pub fn write_info(&self, message: &str) {
        if let Ok(mut target) = self.access.lock() {
            write_to_target(&mut target, message);
        }
    }

    /// Write to error log
    pub fn write_error(&self, message: &str) {
        if let Ok(mut target) = self.error.lock() {
            write_to_target(&mut target, message);
        }
    }

    /// Flush file targets
    pub fn flush(&self) {
        for target in [&self.access, &self.error] {
            if let Ok(mut target) = target.lock() {
                if let LogTarget::File(f) = &mut *target {
                    let _ = f.flush();
                }
            }
        }
    }

    /// Lines collected by a buffered writer (info target first, then error target)
    #[cfg(test)]
    pub fn captured(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for target in [&self.access, &self.error] {
            if let Ok(target) = target.lock() {
                if let LogTarget::Buffer(buf) = &*target {
                    lines.extend(buf.iter().cloned());
                }
            }
        }
        lines
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Write message to log target
fn write_to_target(target: &mut LogTarget, message: &str) {
    match target {
        LogTarget::Stdout => {
            println!("{message}");
        }
        LogTarget::Stderr => {
            eprintln!("{message}");
        }
        LogTarget::File(f) => {
            let _ = writeln!(f, "{message}");
        }
        #[cfg(test)]
        LogTarget::Buffer(buf) => buf.push(message.to_string()),
    }
}
