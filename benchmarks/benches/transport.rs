//! Benchmarks for large-message fragmentation and reassembly

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use runtime_core::{HintDigests, HintTask, Task};
use search::sha256_hex;
use std::sync::Arc;
use tokio::sync::mpsc;
use transport::{fragment, LargeMessageProxy, Reassembler, Transmitter};

fn hint_task(digests: usize) -> Task {
    let hint_digests: HintDigests = (0..digests)
        .map(|i| (sha256_hex(&i.to_string()), vec![i as u32]))
        .collect();
    Task::Hint(HintTask::new("ABCDEFGHIJK", 'K', Arc::new(hint_digests)))
}

fn bench_fragment_reassemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragment_reassemble");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let payload = Bytes::from(vec![7u8; size]);
        group.throughput(Throughput::Bytes(size as u64));

        for fragment_size in [128usize, 4096] {
            group.bench_with_input(
                BenchmarkId::new(format!("{}B", size), fragment_size),
                &payload,
                |b, payload| {
                    b.iter(|| {
                        let mut reassembler = Reassembler::new();
                        for piece in fragment(payload.clone(), fragment_size).unwrap() {
                            reassembler.push("bench".to_string(), 0, piece);
                        }
                        reassembler.finish("bench", 0)
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_task_delivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("task_delivery");

    for digests in [10usize, 1000] {
        let task = hint_task(digests);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (proxy_ref, _proxy_task) = {
            let _guard = rt.enter();
            LargeMessageProxy::<Task>::spawn("bench-worker", tx)
        };
        let mut transmitter = Transmitter::new("bench-master", 128).unwrap();

        group.bench_with_input(BenchmarkId::new("hint_digests", digests), &task, |b, task| {
            b.iter(|| {
                transmitter.send(task, &proxy_ref).unwrap();
                rx.blocking_recv().unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fragment_reassemble, bench_task_delivery);
criterion_main!(benches);
