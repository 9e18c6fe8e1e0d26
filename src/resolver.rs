//! DNS query resolution logic.
//!
//! Handles one query from receipt to log row:
//! 1. Decode the question name (undecodable datagrams are dropped silently)
//! 2. Cache lookup, replying immediately on a hit
//! 3. Forward to upstream and relay the reply
//! 4. Cache the response and append the log record
//!
//! The server loop owns the listening socket; the resolver owns everything
//! the query touches after that.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::cache::{NoCache, ResponseCache, TtlCache};
use crate::config::Config;
use crate::dns::{self, Query};
use crate::error::ForwardError;
use crate::logger::{CacheStatus, LogRecord, Outcome, QueryLog, ResolutionMode, Step};
use crate::stats::Stats;
use crate::transport;

/// Resolver handles per-query processing.
///
/// Shared across all query tasks; the cache and log serialize their own
/// state.
pub struct Resolver {
    upstream: SocketAddr,
    timeout: Duration,
    default_ttl: Duration,
    cache: Arc<dyn ResponseCache>,
    log: Option<QueryLog>,
    stats: Stats,
}

impl Resolver {
    pub fn new(config: &Config, cache: Arc<dyn ResponseCache>, log: Option<QueryLog>) -> Self {
        Self {
            upstream: config.upstream_socket(),
            timeout: config.forward_timeout(),
            default_ttl: config.default_ttl(),
            cache,
            log,
            stats: Stats::new(),
        }
    }

    /// Build a resolver with the cache variant selected by `cache_enabled`.
    pub fn from_config(config: &Config, log: Option<QueryLog>) -> Self {
        let cache: Arc<dyn ResponseCache> = if config.cache_enabled {
            Arc::new(TtlCache::new())
        } else {
            Arc::new(NoCache)
        };
        Self::new(config, cache, log)
    }

    /// Handle one datagram, replying on `socket` when an answer is available.
    ///
    /// Returns the log record, or `None` if the datagram was not a decodable
    /// query.
    pub async fn handle(&self, query: Query, socket: &UdpSocket) -> Option<LogRecord> {
        let timestamp = Local::now();
        let Some(domain) = query.domain.clone() else {
            debug!(client = %query.client, bytes = query.raw.len(), "dropping undecodable datagram");
            return None;
        };

        let cache_status = if self.cache.is_enabled() {
            if let Some(hit) = self.cache.lookup(&domain) {
                debug!(%domain, remaining_ttl_s = hit.remaining_ttl.as_secs(), "cache hit");
                let reply = dns::with_transaction_id(&hit.response, query.id());
                let outcome = match reply_to(socket, &reply, query.client).await {
                    Ok(()) => Outcome::Cached,
                    Err(e) => Outcome::ReplyFailed(e),
                };
                let record = LogRecord {
                    timestamp,
                    domain,
                    mode: ResolutionMode::Forwarding,
                    upstream: None,
                    step: Step::Cache,
                    outcome,
                    rtt: Duration::ZERO,
                    total_time: query.received_at.elapsed(),
                    cache_status: CacheStatus::Hit,
                    servers_visited: 0,
                };
                return Some(self.finish(record).await);
            }
            CacheStatus::Miss
        } else {
            CacheStatus::Disabled
        };

        debug!(%domain, upstream = %self.upstream, "forwarding query");
        let (outcome, rtt) = match transport::forward(&query.raw, self.upstream, self.timeout).await
        {
            Ok(forwarded) => {
                let outcome = match reply_to(socket, &forwarded.response, query.client).await {
                    Ok(()) => Outcome::ResponseReceived,
                    Err(e) => Outcome::ReplyFailed(e),
                };
                if self.cache.is_enabled() {
                    let ttl = dns::answer_ttl(&forwarded.response).unwrap_or(self.default_ttl);
                    self.cache.insert(&domain, &forwarded.response, ttl);
                }
                (outcome, forwarded.rtt)
            }
            Err(ForwardError::Timeout) => (Outcome::TimedOut, Duration::ZERO),
            Err(ForwardError::Transport(e)) => (Outcome::Error(e.to_string()), Duration::ZERO),
        };

        let record = LogRecord {
            timestamp,
            domain,
            mode: ResolutionMode::Forwarding,
            upstream: Some(self.upstream),
            step: Step::Upstream,
            outcome,
            rtt,
            total_time: query.received_at.elapsed(),
            cache_status,
            servers_visited: 1,
        };
        Some(self.finish(record).await)
    }

    /// Count, print and persist a finished query.
    async fn finish(&self, record: LogRecord) -> LogRecord {
        match &record.outcome {
            Outcome::Cached => self.stats.record_cached(record.total_time),
            Outcome::ResponseReceived => self.stats.record_forwarded(record.total_time),
            Outcome::TimedOut => self.stats.record_timed_out(record.total_time),
            Outcome::Error(_) | Outcome::ReplyFailed(_) => self.stats.record_failed(record.total_time),
        }

        info!(
            domain = %record.domain,
            mode = record.mode.as_str(),
            step = record.step.as_str(),
            outcome = %record.outcome,
            rtt_ms = record.rtt.as_secs_f64() * 1000.0,
            total_ms = record.total_time.as_secs_f64() * 1000.0,
            cache = record.cache_status.as_str(),
            servers_visited = record.servers_visited,
            "query handled"
        );

        if let Some(log) = &self.log {
            if let Err(e) = log.append(&record).await {
                warn!(error = %e, "query log write failed");
            }
        }

        record
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn log(&self) -> Option<&QueryLog> {
        self.log.as_ref()
    }
}

async fn reply_to(socket: &UdpSocket, response: &[u8], client: SocketAddr) -> Result<(), String> {
    socket.send_to(response, client).await.map(|_| ()).map_err(|e| {
        warn!(%client, error = %e, "failed to send reply");
        e.to_string()
    })
}
