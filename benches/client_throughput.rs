//! Client benchmark suite.
//!
//! - Backoff schedule computation
//! - Queue-to-socket throughput against a local echo server
//!
//! Run with: cargo bench --bench client_throughput
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::{SinkExt, StreamExt};
use resocket::{Backoff, Client, Config};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::Notify;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[100, 1_000];
const PAYLOAD: &str = "benchmark payload with a realistic length of around sixty bytes";

// ============================================================================
// Helpers
// ============================================================================

/// Starts an echo server and returns its URL.
async fn spawn_echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if (msg.is_text() || msg.is_binary()) && ws.send(msg).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    format!("ws://{addr}")
}

// ============================================================================
// Benchmark: Backoff
// ============================================================================

fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");

    group.bench_function("schedule_to_cap", |b| {
        b.iter(|| {
            let mut backoff = Backoff::default();
            let mut total = Duration::ZERO;
            for _ in 0..16 {
                total += backoff.next_delay();
            }
            total
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let (client, received, notify) = rt.block_on(async {
        let url = spawn_echo_server().await;
        let client = Client::new(url);
        client
            .set_config(Config::new().with_queue_capacity(BATCH_SIZES[BATCH_SIZES.len() - 1]))
            .unwrap();

        let received = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let (counter, waker) = (Arc::clone(&received), Arc::clone(&notify));
        client.on_text_message_received(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            waker.notify_one();
        });

        client.connect().await.unwrap();
        (client, received, notify)
    });

    let mut group = c.benchmark_group("round_trip");
    group.sample_size(20);

    for &batch in BATCH_SIZES {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("text", batch), &batch, |b, &batch| {
            b.to_async(&rt).iter(|| async {
                let target = received.load(Ordering::SeqCst) + batch;
                for _ in 0..batch {
                    client.send_text(PAYLOAD).unwrap();
                }
                while received.load(Ordering::SeqCst) < target {
                    notify.notified().await;
                }
            });
        });
    }

    group.finish();
    rt.block_on(client.close());
}

criterion_group!(benches, bench_backoff, bench_round_trip);
criterion_main!(benches);
