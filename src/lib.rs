//! relay-dns - a logging DNS forwarding resolver.
//!
//! Receives queries over UDP, forwards them to one upstream resolver, relays
//! the reply and writes one CSV row per query.

pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod logger;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;
