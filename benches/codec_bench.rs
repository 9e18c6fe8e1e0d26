//! Benchmarks for query decoding and the response cache.
//!
//! Run with: cargo bench --bench codec_bench

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;

use relay_dns::cache::{ResponseCache, TtlCache};
use relay_dns::dns::{answer_ttl, decode_domain, with_transaction_id};

fn create_dns_query(query_id: u16, domain: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(512);

    // Header (12 bytes)
    packet.extend_from_slice(&query_id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
    packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    packet.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0

    // Question section
    for label in domain.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0x00); // Root label

    packet.extend_from_slice(&[0x00, 0x01]); // Type: A
    packet.extend_from_slice(&[0x00, 0x01]); // Class: IN

    packet
}

fn create_dns_response(query_id: u16, domain: &str, answers: usize) -> Vec<u8> {
    let mut response = create_dns_query(query_id, domain);
    response[2] = 0x81;
    response[3] = 0x80;
    response[6..8].copy_from_slice(&(answers as u16).to_be_bytes());
    for i in 0..answers {
        response.extend_from_slice(&[0xc0, 0x0c]); // Name pointer
        response.extend_from_slice(&[0x00, 0x01]); // Type: A
        response.extend_from_slice(&[0x00, 0x01]); // Class: IN
        response.extend_from_slice(&(300 - i as u32).to_be_bytes()); // TTL
        response.extend_from_slice(&[0x00, 0x04]); // Data length: 4
        response.extend_from_slice(&[93, 184, 216, i as u8]);
    }
    response
}

fn bench_decode_domain(c: &mut Criterion) {
    let short = create_dns_query(0x1234, "example.com");
    let long = create_dns_query(0x1234, "subdomain.example.domain.com");

    c.bench_function("decode_domain_short", |b| {
        b.iter(|| decode_domain(black_box(&short)))
    });

    c.bench_function("decode_domain_long", |b| {
        b.iter(|| decode_domain(black_box(&long)))
    });

    c.bench_function("decode_domain_malformed", |b| {
        b.iter(|| decode_domain(black_box(&short[..14])))
    });
}

fn bench_answer_ttl(c: &mut Criterion) {
    let one = create_dns_response(0x1234, "example.com", 1);
    let eight = create_dns_response(0x1234, "example.com", 8);

    c.bench_function("answer_ttl_1_record", |b| {
        b.iter(|| answer_ttl(black_box(&one)))
    });

    c.bench_function("answer_ttl_8_records", |b| {
        b.iter(|| answer_ttl(black_box(&eight)))
    });
}

fn bench_cache(c: &mut Criterion) {
    let response = create_dns_response(0x1234, "example.com", 1);
    let cache = TtlCache::new();
    for i in 0..1000 {
        cache.insert(&format!("host{i}.example.com"), &response, Duration::from_secs(300));
    }

    c.bench_function("cache_lookup_hit", |b| {
        b.iter(|| cache.lookup(black_box("host500.example.com")))
    });

    c.bench_function("cache_lookup_miss", |b| {
        b.iter(|| cache.lookup(black_box("absent.example.com")))
    });

    c.bench_function("cache_insert", |b| {
        b.iter(|| cache.insert(black_box("example.com"), &response, Duration::from_secs(300)))
    });

    c.bench_function("cache_hit_rewrite_id", |b| {
        b.iter(|| {
            cache
                .lookup(black_box("host500.example.com"))
                .map(|hit| with_transaction_id(&hit.response, 0x4321))
        })
    });
}

fn bench_throughput(c: &mut Criterion) {
    let queries: Vec<Vec<u8>> = (0..1000u16)
        .map(|id| create_dns_query(id, &format!("host{}.example.com", id % 100)))
        .collect();
    let response = create_dns_response(0, "example.com", 1);

    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("decode_and_cache_1000_queries", |b| {
        b.iter(|| {
            let cache = TtlCache::new();
            for query in &queries {
                if let Ok(domain) = decode_domain(query) {
                    if cache.lookup(&domain).is_none() {
                        cache.insert(&domain, &response, Duration::from_secs(60));
                    }
                }
            }
            cache.len()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_domain,
    bench_answer_ttl,
    bench_cache,
    bench_throughput,
);

criterion_main!(benches);
