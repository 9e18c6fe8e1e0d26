//! Transport layer for talking to the upstream resolver.

pub mod udp;

pub use udp::{Forwarded, forward};

/// Largest upstream reply read over plain UDP (no EDNS).
pub const MAX_UDP_RESPONSE_SIZE: usize = 512;

/// Receive buffer size for the client-facing listener.
pub const MAX_DNS_PACKET_SIZE: usize = 4096;
