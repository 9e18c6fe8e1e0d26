//! Resolver server orchestration.
//!
//! Binds the listening socket and hands every datagram to its own task so a
//! slow upstream exchange never delays other clients.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dns::Query;
use crate::error::ServerError;
use crate::logger::QueryLog;
use crate::resolver::Resolver;
use crate::transport::MAX_DNS_PACKET_SIZE;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Pause after a failed receive so a persistent socket error cannot spin.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// A bound resolver, ready to serve.
pub struct Server {
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    drain_timeout: Duration,
}

impl Server {
    /// Bind the listener and recreate the query log.
    ///
    /// Failing to bind is fatal. Failing to create the log is not: the
    /// server runs with console output only.
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let addr = config.listen_socket();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let log = match QueryLog::create(&config.log_path).await {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(error = %e, "query log disabled");
                None
            }
        };

        Ok(Self {
            socket: Arc::new(socket),
            resolver: Arc::new(Resolver::from_config(config, log)),
            drain_timeout: config.forward_timeout() + Duration::from_millis(500),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Serve until `shutdown` resolves, then wait for in-flight queries.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut tasks = JoinSet::new();
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (len, src) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            recv_error_backoff(&e).await;
                            continue;
                        }
                    };

                    let query = Query::new(buf[..len].to_vec(), src);
                    let socket = self.socket.clone();
                    let resolver = self.resolver.clone();
                    tasks.spawn(async move {
                        resolver.handle(query, &socket).await;
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "query task failed");
                    }
                }
                _ = &mut shutdown => break,
            }
        }

        info!(in_flight = tasks.len(), "shutting down");
        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            warn!("abandoning queries still in flight");
        }

        if let Some(log) = self.resolver.log() {
            if let Err(e) = log.flush().await {
                warn!(error = %e, "query log flush failed");
            }
        }
    }
}

async fn recv_error_backoff(e: &io::Error) {
    warn!(error = %e, "UDP recv error");
    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
}

/// Run the resolver with the given configuration until Ctrl-C.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let server = Server::bind(&config).await?;

    info!(
        listen = %config.listen_socket(),
        upstream = %config.upstream_socket(),
        timeout_ms = config.forward_timeout_ms,
        cache = config.cache_enabled,
        "DNS resolver listening"
    );
    match server.resolver.log() {
        Some(log) => info!(path = %log.path().display(), "logging queries"),
        None => debug!("no query log"),
    }

    let resolver = server.resolver.clone();
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let stats = resolver.stats().snapshot_and_reset();
            info!(
                cache = resolver.cache_len(),
                requests = stats.requests,
                forwarded = stats.forwarded,
                cached = stats.cached,
                timed_out = stats.timed_out,
                failed = stats.failed,
                avg_response_ms = stats.avg_response_ms,
                "stats"
            );
        }
    });

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    reporter.abort();
    Ok(())
}
