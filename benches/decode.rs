//! Frame decoder benchmarks
//!
//! Run with: cargo bench

use agentdesk_core::{FrameDecoder, Transcript};
use criterion::{criterion_group, criterion_main, Criterion};

fn stream_body(frames: usize) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"data: {\"type\":\"start\",\"agent\":\"bench\"}\n\n");
    for i in 0..frames {
        body.extend_from_slice(
            format!("data: {{\"type\":\"chunk\",\"content\":\"token {i} \"}}\n\n").as_bytes(),
        );
    }
    body.extend_from_slice(b"data: [DONE]\n\n");
    body
}

fn bench_decode_one_shot(c: &mut Criterion) {
    let body = stream_body(500);

    c.bench_function("decode 500 frames, one fragment", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut events = decoder.push(&body);
            events.extend(decoder.finish());
            events
        });
    });
}

fn bench_decode_fragmented(c: &mut Criterion) {
    let body = stream_body(500);
    let fragments: Vec<&[u8]> = body.chunks(17).collect();

    c.bench_function("decode 500 frames, 17-byte fragments", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut events = Vec::new();
            for fragment in &fragments {
                events.extend(decoder.push(fragment));
            }
            events.extend(decoder.finish());
            events
        });
    });
}

fn bench_decode_and_reduce(c: &mut Criterion) {
    let body = stream_body(500);

    c.bench_function("decode + reduce 500 frames", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            let mut transcript = Transcript::new().with_max_messages(0);
            transcript.begin_exchange("bench", "question");
            for event in decoder.push(&body) {
                transcript.apply(&event);
            }
            transcript
        });
    });
}

criterion_group!(
    benches,
    bench_decode_one_shot,
    bench_decode_fragmented,
    bench_decode_and_reduce
);
criterion_main!(benches);
