use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use chatrelay::protocol::bridge::response_decoder::decode_bridge_line;
use chatrelay::protocol::canonical::FinishReason;
use chatrelay::protocol::openai_chat::decoder::{
    decode_openai_chat_request, parse_openai_chat_request_wire,
};
use chatrelay::protocol::openai_chat::response_encoder::encode_openai_chunk_frame;
use chatrelay::stream::{IncrementalDiffer, LineSplitter, ResponseNormalizer};

fn growing_snapshots(words: usize) -> Vec<String> {
    let mut text = String::new();
    (0..words)
        .map(|idx| {
            text.push_str("word");
            text.push_str(&idx.to_string());
            text.push(' ');
            text.clone()
        })
        .collect()
}

fn chat_request_body(messages: usize) -> Vec<u8> {
    let messages: Vec<serde_json::Value> = (0..messages)
        .map(|idx| {
            serde_json::json!({
                "role": if idx % 2 == 0 { "user" } else { "assistant" },
                "content": format!("message {idx} with some ordinary conversational text"),
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "model": "gpt-4",
        "stream": true,
        "messages": messages,
    }))
    .expect("serialize request")
}

fn bench_differ(c: &mut Criterion) {
    let snapshots = growing_snapshots(256);
    c.bench_function("differ_advance_256_snapshots", |b| {
        b.iter(|| {
            let mut differ = IncrementalDiffer::new();
            for snapshot in &snapshots {
                black_box(differ.advance(black_box(snapshot.clone())));
            }
        });
    });
}

fn bench_chunk_encoding(c: &mut Criterion) {
    let mut normalizer =
        ResponseNormalizer::new(Arc::from("chatcmpl-000000000000002a"), Arc::from("gpt-4"), 1);
    let delta = normalizer.delta("Hello \"world\"\n".to_string());
    let terminal = normalizer.terminal(FinishReason::Done);

    c.bench_function("encode_chunk_frame_delta", |b| {
        b.iter(|| black_box(encode_openai_chunk_frame(black_box(&delta))));
    });
    c.bench_function("encode_chunk_frame_terminal", |b| {
        b.iter(|| black_box(encode_openai_chunk_frame(black_box(&terminal))));
    });
}

fn bench_request_decode(c: &mut Criterion) {
    let body = chat_request_body(16);
    c.bench_function("decode_chat_request_16_messages", |b| {
        b.iter(|| {
            let wire = parse_openai_chat_request_wire(black_box(&body)).expect("parse");
            black_box(decode_openai_chat_request(wire, uuid::Uuid::nil()).expect("decode"))
        });
    });
}

fn bench_bridge_lines(c: &mut Criterion) {
    let mut body = String::new();
    for snapshot in growing_snapshots(64) {
        body.push_str("data: ");
        body.push_str(
            &serde_json::json!({"message": {"content": {"parts": [snapshot]}}}).to_string(),
        );
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");

    c.bench_function("split_and_decode_bridge_body_64", |b| {
        b.iter(|| {
            let mut splitter = LineSplitter::new();
            for line in splitter.feed(black_box(&body)) {
                black_box(decode_bridge_line(&line));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_differ,
    bench_chunk_encoding,
    bench_request_decode,
    bench_bridge_lines
);
criterion_main!(benches);
