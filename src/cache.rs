//! DNS response cache with TTL-based expiration.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A cached upstream response and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAnswer {
    pub response: Vec<u8>,
    pub remaining_ttl: Duration,
}

/// Cache consulted by the resolver before forwarding.
///
/// Implementations serialize their own internal state; callers never hold a
/// lock across an upstream exchange.
pub trait ResponseCache: Send + Sync {
    /// Look up an unexpired answer. Expired entries are removed.
    fn lookup(&self, domain: &str) -> Option<CachedAnswer>;

    /// Store a response, replacing any existing entry for the domain.
    fn insert(&self, domain: &str, response: &[u8], ttl: Duration);

    /// Whether lookups can ever hit.
    fn is_enabled(&self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache used when caching is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn lookup(&self, _domain: &str) -> Option<CachedAnswer> {
        None
    }

    fn insert(&self, _domain: &str, _response: &[u8], _ttl: Duration) {}

    fn is_enabled(&self) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }
}

struct CacheEntry {
    response: Vec<u8>,
    expires_at: Instant,
}

/// TTL-based DNS cache keyed by lowercase domain name.
///
/// Entries are only dropped lazily when a lookup finds them expired; there
/// is no capacity bound.
pub struct TtlCache {
    entries: RwLock<FxHashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    fn lookup_at(&self, domain: &str, now: Instant) -> Option<CachedAnswer> {
        let key = domain.to_ascii_lowercase();

        {
            let Ok(entries) = self.entries.read() else {
                return None;
            };
            match entries.get(&key) {
                Some(entry) if now < entry.expires_at => {
                    return Some(CachedAnswer {
                        response: entry.response.clone(),
                        remaining_ttl: entry.expires_at - now,
                    });
                }
                Some(_) => {}
                None => return None,
            }
        }

        let Ok(mut entries) = self.entries.write() else {
            return None;
        };
        // Re-check under the write lock: another task may have refreshed it.
        if let Some(entry) = entries.get(&key) {
            if now < entry.expires_at {
                return Some(CachedAnswer {
                    response: entry.response.clone(),
                    remaining_ttl: entry.expires_at - now,
                });
            }
            entries.remove(&key);
        }
        None
    }
}

impl ResponseCache for TtlCache {
    fn lookup(&self, domain: &str) -> Option<CachedAnswer> {
        self.lookup_at(domain, Instant::now())
    }

    fn insert(&self, domain: &str, response: &[u8], ttl: Duration) {
        // A TTL past the clock's range cannot be represented; skip it.
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        entries.insert(
            domain.to_ascii_lowercase(),
            CacheEntry {
                response: response.to_vec(),
                expires_at,
            },
        );
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
