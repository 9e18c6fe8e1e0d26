//! Static resolver configuration.
//!
//! Built-in defaults, optionally overlaid by a TOML file; `main` applies
//! command-line overrides on top.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen_addr: IpAddr,
    /// Port 53 needs elevated privileges on most systems.
    pub listen_port: u16,
    pub upstream_addr: IpAddr,
    pub upstream_port: u16,
    pub forward_timeout_ms: u64,
    pub cache_enabled: bool,
    /// TTL used when an upstream response carries no answer records.
    pub cache_default_ttl_s: u64,
    pub log_path: PathBuf,
    /// Console log filter, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 53,
            upstream_addr: IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            upstream_port: 53,
            forward_timeout_ms: 2000,
            cache_enabled: false,
            cache_default_ttl_s: 60,
            log_path: PathBuf::from("dns_log.csv"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forward_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "forward_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.cache_default_ttl_s > u32::MAX as u64 {
            return Err(ConfigError::Invalid {
                field: "cache_default_ttl_s",
                reason: format!("must not exceed {} (largest DNS TTL)", u32::MAX),
            });
        }
        if self.upstream_port == 0 {
            return Err(ConfigError::Invalid {
                field: "upstream_port",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn listen_socket(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.listen_port)
    }

    pub fn upstream_socket(&self) -> SocketAddr {
        SocketAddr::new(self.upstream_addr, self.upstream_port)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_s)
    }
}
