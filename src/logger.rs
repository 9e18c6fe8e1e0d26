//! Per-query CSV log.
//!
//! One row per decoded query, written in the order queries finish. The file
//! is recreated at start-up so each run produces a self-contained log.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::LogWriteError;

pub const CSV_HEADER: &str = "timestamp,domain,mode,upstream_server,step,response_outcome,rtt_ms,total_time_ms,cache_status,servers_visited";

/// How a query was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Forwarding,
}

impl ResolutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionMode::Forwarding => "forwarding",
        }
    }
}

/// Furthest processing step a query reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Cache,
    Upstream,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Cache => "served from cache",
            Step::Upstream => "forwarded to upstream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Disabled,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Disabled => "disabled",
        }
    }
}

/// Result of handling a query, as recorded in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ResponseReceived,
    Cached,
    TimedOut,
    Error(String),
    ReplyFailed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ResponseReceived => f.write_str("response received"),
            Outcome::Cached => f.write_str("cached response"),
            Outcome::TimedOut => f.write_str("timed out"),
            Outcome::Error(e) => write!(f, "error: {e}"),
            Outcome::ReplyFailed(e) => write!(f, "reply failed: {e}"),
        }
    }
}

/// A single row of the query log.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub domain: String,
    pub mode: ResolutionMode,
    pub upstream: Option<SocketAddr>,
    pub step: Step,
    pub outcome: Outcome,
    pub rtt: Duration,
    pub total_time: Duration,
    pub cache_status: CacheStatus,
    pub servers_visited: u32,
}

impl LogRecord {
    /// Render as a CSV line, newline included.
    pub fn to_csv_row(&self) -> String {
        let upstream = self
            .upstream
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "{},{},{},{},{},{},{:.4},{:.4},{},{}\n",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
            csv_field(&self.domain),
            self.mode.as_str(),
            csv_field(&upstream),
            self.step.as_str(),
            csv_field(&self.outcome.to_string()),
            millis(self.rtt),
            millis(self.total_time),
            self.cache_status.as_str(),
            self.servers_visited,
        )
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Quote a field if it would otherwise break the row.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Append-only CSV sink shared by all query tasks.
pub struct QueryLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl QueryLog {
    /// Create (or truncate) the log file and write the header row.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, LogWriteError> {
        let path = path.as_ref().to_path_buf();
        let err = |source| LogWriteError {
            path: path.clone(),
            source,
        };

        let mut file = File::create(&path).await.map_err(err)?;
        file.write_all(CSV_HEADER.as_bytes()).await.map_err(err)?;
        file.write_all(b"\n").await.map_err(err)?;
        file.flush().await.map_err(err)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one record. The row is written and flushed under the lock, so
    /// concurrent appends never interleave.
    pub async fn append(&self, record: &LogRecord) -> Result<(), LogWriteError> {
        let row = record.to_csv_row();
        let mut file = self.file.lock().await;

        let result = match file.write_all(row.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        result.map_err(|source| LogWriteError {
            path: self.path.clone(),
            source,
        })
    }

    pub async fn flush(&self) -> Result<(), LogWriteError> {
        self.file
            .lock()
            .await
            .sync_all()
            .await
            .map_err(|source| LogWriteError {
                path: self.path.clone(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap an already-open file without writing a header.
    #[cfg(test)]
    pub(crate) fn from_file(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: Mutex::new(file),
        }
    }
}
