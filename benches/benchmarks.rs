//! Performance benchmarks for the wscore codec primitives.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use wscore::protocol::{FrameHead, MAX_HEAD_LEN};
use wscore::{apply_mask, compute_accept_key, OpCode};

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");
    let key = [0x37, 0xfa, 0x21, 0x3d];

    for size in [16usize, 128, 1024, 65536] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("apply_mask/{size}"), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask(black_box(&mut data), black_box(key), 0));
        });
    }

    group.bench_function("apply_mask/unaligned_offset", |b| {
        let mut data = vec![0xAB; 1024];
        b.iter(|| apply_mask(black_box(&mut data), black_box(key), 3));
    });

    group.finish();
}

fn bench_accept_key(c: &mut Criterion) {
    c.bench_function("handshake/compute_accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")));
    });
}

fn bench_head_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_head");

    for (name, len) in [("short", 64u64), ("extended16", 4096), ("extended64", 1 << 20)] {
        let head = FrameHead {
            fin: true,
            opcode: OpCode::Binary,
            payload_len: len,
            mask: Some([0x37, 0xfa, 0x21, 0x3d]),
        };
        group.bench_function(format!("encode/{name}"), |b| {
            let mut buf = [0u8; MAX_HEAD_LEN];
            b.iter(|| black_box(&head).encode(&mut buf));
        });

        let mut buf = [0u8; MAX_HEAD_LEN];
        let encoded = head.encode(&mut buf);
        group.bench_function(format!("decode/{name}"), |b| {
            b.iter(|| {
                FrameHead::decode(
                    [black_box(buf[0]), buf[1]],
                    black_box(&buf[2..encoded]),
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_masking, bench_accept_key, bench_head_codec);
criterion_main!(benches);
