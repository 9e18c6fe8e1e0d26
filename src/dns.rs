//! Minimal DNS wire handling.
//!
//! The resolver never re-encodes messages. It only reads the first question
//! name of a query and the answer TTLs of a response; everything else is
//! forwarded as opaque bytes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::DecodeError;

pub const HEADER_LEN: usize = 12;

/// TTLs above this have the sign bit set and count as zero (RFC 2181 §8).
const MAX_TTL: u32 = i32::MAX as u32;

/// Top two bits set on a length byte mark a compression pointer.
const POINTER_MASK: u8 = 0xC0;

/// A received datagram and the name it asks for.
#[derive(Debug, Clone)]
pub struct Query {
    pub raw: Vec<u8>,
    pub client: SocketAddr,
    pub domain: Option<String>,
    pub received_at: Instant,
}

impl Query {
    /// Capture a datagram, decoding the question name if possible.
    pub fn new(raw: Vec<u8>, client: SocketAddr) -> Self {
        let received_at = Instant::now();
        let domain = decode_domain(&raw).ok();
        Self {
            raw,
            client,
            domain,
            received_at,
        }
    }

    pub fn id(&self) -> u16 {
        transaction_id(&self.raw)
    }
}

/// Decode the first question name of a query into dotted form.
///
/// Labels are read as length-prefixed UTF-8 runs after the 12 byte header
/// until the zero-length root label.
pub fn decode_domain(data: &[u8]) -> Result<String, DecodeError> {
    if data.len() < HEADER_LEN {
        return Err(DecodeError::TooShort(data.len()));
    }

    let mut pos = HEADER_LEN;
    let mut labels: Vec<&str> = Vec::new();

    loop {
        let Some(&len) = data.get(pos) else {
            return Err(DecodeError::Unterminated);
        };
        let label_len = len as usize;
        if label_len == 0 {
            break;
        }

        let start = pos + 1;
        let end = start + label_len;
        if end > data.len() {
            return Err(DecodeError::LabelOverflow { offset: pos });
        }
        let label = std::str::from_utf8(&data[start..end])
            .map_err(|_| DecodeError::InvalidUtf8 { offset: pos })?;
        labels.push(label);
        pos = end;
    }

    if labels.is_empty() {
        return Err(DecodeError::EmptyName);
    }

    Ok(labels.join("."))
}

/// Transaction ID of a message, or 0 if the buffer is too short.
pub fn transaction_id(data: &[u8]) -> u16 {
    match data {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    }
}

/// Copy of `response` carrying transaction ID `id`.
pub fn with_transaction_id(response: &[u8], id: u16) -> Vec<u8> {
    let mut out = response.to_vec();
    if out.len() >= 2 {
        out[..2].copy_from_slice(&id.to_be_bytes());
    }
    out
}

/// Minimum TTL across the answer section of a response.
///
/// Returns `None` when there are no answers or the message is malformed.
pub fn answer_ttl(response: &[u8]) -> Option<Duration> {
    if response.len() < HEADER_LEN {
        return None;
    }

    let qdcount = u16::from_be_bytes([response[4], response[5]]) as usize;
    let ancount = u16::from_be_bytes([response[6], response[7]]) as usize;
    if ancount == 0 {
        return None;
    }

    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        pos = skip_name(response, pos)?;
        pos += 4; // QTYPE + QCLASS
    }

    let mut min_ttl = u32::MAX;
    for _ in 0..ancount {
        pos = skip_name(response, pos)?;
        let fixed = response.get(pos..pos + 10)?;
        let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let ttl = if ttl > MAX_TTL { 0 } else { ttl };
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;
        min_ttl = min_ttl.min(ttl);
        pos += 10 + rdlength;
        if pos > response.len() {
            return None;
        }
    }

    Some(Duration::from_secs(min_ttl as u64))
}

/// Offset just past the name starting at `pos`.
fn skip_name(data: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let b = *data.get(pos)?;
        if b == 0 {
            return Some(pos + 1);
        }
        if b & POINTER_MASK == POINTER_MASK {
            return Some(pos + 2);
        }
        pos += 1 + b as usize;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn build_query(id: u16, domain: &str) -> Vec<u8> {
        let mut packet = Vec::with_capacity(512);
        packet.extend_from_slice(&id.to_be_bytes());
        packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query, RD
        packet.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
        packet.extend_from_slice(&[0x00; 6]); // AN/NS/AR counts
        for label in domain.split('.') {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label.as_bytes());
        }
        packet.push(0x00);
        packet.extend_from_slice(&[0x00, 0x01]); // Type: A
        packet.extend_from_slice(&[0x00, 0x01]); // Class: IN
        packet
    }

    /// Response to `build_query` with one A record per TTL.
    pub(crate) fn build_response(id: u16, domain: &str, ttls: &[u32]) -> Vec<u8> {
        let mut response = build_query(id, domain);
        response[2] = 0x81;
        response[3] = 0x80;
        response[6..8].copy_from_slice(&(ttls.len() as u16).to_be_bytes());
        for (i, ttl) in ttls.iter().enumerate() {
            response.extend_from_slice(&[0xC0, 0x0C]); // Pointer to question name
            response.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
            response.extend_from_slice(&ttl.to_be_bytes());
            response.extend_from_slice(&[0x00, 0x04]);
            response.extend_from_slice(&[93, 184, 216, i as u8]);
        }
        response
    }

    #[test]
    fn decode_domain_example_com() {
        let query = build_query(0x1234, "example.com");

        assert_eq!(decode_domain(&query).unwrap(), "example.com");
    }

    #[test]
    fn decode_domain_recovers_encoded_names() {
        let long_label = "a".repeat(63);
        let names = [
            "com",
            "www.example.com",
            "Mixed.Case.Example",
            "deep.sub.domain.of.example.org",
            long_label.as_str(),
        ];

        for name in names {
            let query = build_query(1, name);
            assert_eq!(decode_domain(&query).unwrap(), name);
        }
    }

    #[test]
    fn decode_domain_ignores_trailing_question_fields() {
        let mut query = build_query(7, "example.com");
        query.truncate(query.len() - 4);

        assert_eq!(decode_domain(&query).unwrap(), "example.com");
    }

    #[test]
    fn decode_domain_rejects_empty_buffer() {
        assert_eq!(decode_domain(&[]), Err(DecodeError::TooShort(0)));
    }

    #[test]
    fn decode_domain_rejects_short_header() {
        assert_eq!(decode_domain(&[0u8; 11]), Err(DecodeError::TooShort(11)));
    }

    #[test]
    fn decode_domain_rejects_label_past_end() {
        let mut query = vec![0u8; HEADER_LEN];
        query.push(10);
        query.extend_from_slice(b"short");

        assert_eq!(
            decode_domain(&query),
            Err(DecodeError::LabelOverflow { offset: HEADER_LEN })
        );
    }

    #[test]
    fn decode_domain_rejects_missing_terminator() {
        let mut query = vec![0u8; HEADER_LEN];
        query.push(3);
        query.extend_from_slice(b"com");

        assert_eq!(decode_domain(&query), Err(DecodeError::Unterminated));
    }

    #[test]
    fn decode_domain_rejects_invalid_utf8() {
        let mut query = vec![0u8; HEADER_LEN];
        query.extend_from_slice(&[2, 0xFF, 0xFE, 0]);

        assert_eq!(
            decode_domain(&query),
            Err(DecodeError::InvalidUtf8 { offset: HEADER_LEN })
        );
    }

    #[test]
    fn decode_domain_rejects_root_only_name() {
        let mut query = vec![0u8; HEADER_LEN];
        query.push(0);

        assert_eq!(decode_domain(&query), Err(DecodeError::EmptyName));
    }

    #[test]
    fn query_new_keeps_raw_bytes() {
        let raw = build_query(0xBEEF, "example.com");
        let client: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let query = Query::new(raw.clone(), client);

        assert_eq!(query.raw, raw);
        assert_eq!(query.id(), 0xBEEF);
        assert_eq!(query.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn query_new_tolerates_garbage() {
        let client: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let query = Query::new(b"hello".to_vec(), client);

        assert!(query.domain.is_none());
    }

    #[test]
    fn with_transaction_id_rewrites_only_id() {
        let response = build_response(0x1111, "example.com", &[30]);
        let rewritten = with_transaction_id(&response, 0x2222);

        assert_eq!(transaction_id(&rewritten), 0x2222);
        assert_eq!(rewritten[2..], response[2..]);
    }

    #[test]
    fn answer_ttl_takes_minimum() {
        let response = build_response(1, "example.com", &[300, 30, 120]);

        assert_eq!(answer_ttl(&response), Some(Duration::from_secs(30)));
    }

    #[test]
    fn answer_ttl_treats_sign_bit_as_zero() {
        let response = build_response(1, "example.com", &[0x8000_0000, 300]);

        assert_eq!(answer_ttl(&response), Some(Duration::ZERO));
    }

    #[test]
    fn answer_ttl_keeps_largest_valid_ttl() {
        let response = build_response(1, "example.com", &[i32::MAX as u32]);

        assert_eq!(answer_ttl(&response), Some(Duration::from_secs(i32::MAX as u64)));
    }

    #[test]
    fn answer_ttl_none_without_answers() {
        let response = build_response(1, "example.com", &[]);

        assert_eq!(answer_ttl(&response), None);
    }

    #[test]
    fn answer_ttl_none_when_truncated() {
        let mut response = build_response(1, "example.com", &[60]);
        response.truncate(response.len() - 3);

        assert_eq!(answer_ttl(&response), None);
    }

    #[test]
    fn answer_ttl_none_for_short_buffer() {
        assert_eq!(answer_ttl(&[0u8; 20][..5]), None);
    }
}
