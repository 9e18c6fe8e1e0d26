//! UDP upstream forwarding.
//!
//! Every query gets its own ephemeral socket, so a late reply to an abandoned
//! query can never be read by a different one.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use super::MAX_UDP_RESPONSE_SIZE;
use crate::error::ForwardError;

/// A response obtained from the upstream resolver.
#[derive(Debug, Clone)]
pub struct Forwarded {
    pub response: Vec<u8>,
    pub rtt: Duration,
}

/// Send `query` to `upstream` and wait up to `timeout` for its reply.
///
/// The socket is dropped on every return path. Datagrams from any address
/// other than `upstream` are discarded and the wait continues.
pub async fn forward(
    query: &[u8],
    upstream: SocketAddr,
    timeout: Duration,
) -> Result<Forwarded, ForwardError> {
    let bind_addr: SocketAddr = if upstream.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr).await?;

    let start = Instant::now();
    match tokio::time::timeout(timeout, exchange(&socket, query, upstream)).await {
        Ok(Ok(response)) => {
            let rtt = start.elapsed();
            debug!(
                %upstream,
                bytes = response.len(),
                rtt_ms = rtt.as_secs_f64() * 1000.0,
                "upstream response received"
            );
            Ok(Forwarded { response, rtt })
        }
        Ok(Err(e)) => Err(ForwardError::Transport(e)),
        Err(_) => Err(ForwardError::Timeout),
    }
}

async fn exchange(socket: &UdpSocket, query: &[u8], upstream: SocketAddr) -> io::Result<Vec<u8>> {
    socket.send_to(query, upstream).await?;

    let mut buf = [0u8; MAX_UDP_RESPONSE_SIZE];
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        if from == upstream {
            return Ok(buf[..len].to_vec());
        }
        warn!(expected = %upstream, received_from = %from, "UDP response from unexpected source");
    }
}
