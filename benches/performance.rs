use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rag_finance_agent::token_budget::{estimate_history_tokens, estimate_text_tokens};

fn sample_text(chars: usize) -> String {
    "The quarterly reconciliation report flags three transactions pending review. "
        .chars()
        .cycle()
        .take(chars)
        .collect()
}

fn sample_history(turns: usize) -> Vec<(String, String)> {
    (0..turns)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            (role.to_string(), sample_text(200))
        })
        .collect()
}

fn bench_estimate_text_tokens_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_text_tokens_by_size");
    for size in [16, 256, 4096, 65536] {
        let text = sample_text(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| estimate_text_tokens(black_box(text)));
        });
    }
    group.finish();
}

fn bench_estimate_history_tokens_by_turn_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_history_tokens_by_turn_count");
    for turns in [1, 10, 50, 200] {
        let history = sample_history(turns);
        group.bench_with_input(BenchmarkId::from_parameter(turns), &history, |b, history| {
            b.iter(|| estimate_history_tokens(black_box(history)));
        });
    }
    group.finish();
}

fn bench_empty_history(c: &mut Criterion) {
    c.bench_function("estimate_history_tokens_empty", |b| {
        b.iter(|| estimate_history_tokens(black_box(&[])));
    });
}

fn bench_realistic_conversation_window(c: &mut Criterion) {
    // A 20-turn session approaching the default message_cap (§4.10) is the
    // common case the sliding window re-estimates on every chat turn.
    let history = sample_history(20);
    c.bench_function("estimate_history_tokens_realistic_window", |b| {
        b.iter(|| estimate_history_tokens(black_box(&history)));
    });
}

criterion_group!(
    benches,
    bench_estimate_text_tokens_by_size,
    bench_estimate_history_tokens_by_turn_count,
    bench_empty_history,
    bench_realistic_conversation_window,
);
criterion_main!(benches);
