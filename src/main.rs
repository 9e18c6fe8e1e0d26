use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use relay_dns::config::Config;
use relay_dns::error::ServerError;
use relay_dns::proxy;

#[derive(Parser)]
#[command(name = "relay-dns")]
#[command(about = "Logging DNS forwarding resolver", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Listen port (53 needs elevated privileges)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream DNS server address
    #[arg(short, long)]
    upstream: Option<IpAddr>,

    /// Upstream DNS server port
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Upstream timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Enable the response cache
    #[arg(long)]
    cache: bool,

    /// TTL in seconds for responses without answer records
    #[arg(long)]
    default_ttl: Option<u64>,

    /// CSV query log path (recreated on start)
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Console log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(bind) = self.bind {
            config.listen_addr = bind;
        }
        if let Some(port) = self.port {
            config.listen_port = port;
        }
        if let Some(upstream) = self.upstream {
            config.upstream_addr = upstream;
        }
        if let Some(port) = self.upstream_port {
            config.upstream_port = port;
        }
        if let Some(timeout) = self.timeout_ms {
            config.forward_timeout_ms = timeout;
        }
        if self.cache {
            config.cache_enabled = true;
        }
        if let Some(ttl) = self.default_ttl {
            config.cache_default_ttl_s = ttl;
        }
        if let Some(log) = self.log {
            config.log_path = log;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(config: Config) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    rt.block_on(proxy::run(config)).map_err(|e| {
        let ServerError::Bind { addr, .. } = &e;
        if addr.port() < 1024 {
            error!("binding a port below 1024 usually needs root or CAP_NET_BIND_SERVICE");
        }
        anyhow::Error::new(e)
    })
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("relay-dns: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.log_level);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
