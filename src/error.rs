//! Error types for the resolver.
//!
//! Only [`ServerError`] is fatal; everything else degrades a single query.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or non-DNS datagram. Dropped silently by the handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet too short for DNS header ({0} bytes)")]
    TooShort(usize),

    #[error("label at offset {offset} runs past end of packet")]
    LabelOverflow { offset: usize },

    #[error("question name is not terminated")]
    Unterminated,

    #[error("label at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("question name is empty")]
    EmptyName,
}

/// Failure exchanging a query with the upstream resolver.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

/// The CSV sink could not be written.
#[derive(Error, Debug)]
#[error("failed to write query log {path}: {source}")]
pub struct LogWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Fatal server failures.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
