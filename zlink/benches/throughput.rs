//! Throughput benchmarks: messages per second.
//!
//! Measures how many ZMP messages PAIR and DEALER/ROUTER sockets can push
//! per second at a range of payload sizes.
//!
//! FAIR BENCHMARKING:
//! - Setup overhead (connection, handshake) IS included in measurement
//! - With MESSAGE_COUNT=10,000, setup is <1% of total time

use bytes::Bytes;
use compio::net::TcpListener;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use zlink::zmq::{DealerSocket, PairSocket, RouterSocket};

const MESSAGE_SIZES: &[usize] = &[64, 256, 1024, 4096, 16384];
const MESSAGE_COUNT: usize = 10_000;

/// Benchmark PAIR/PAIR round-trip throughput.
///
/// Setup overhead included but amortized over 10k messages (<1% of total time).
fn pair_throughput(c: &mut Criterion) {
    zlink::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("throughput/zlink/pair");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(10);

    // Creating/dropping many io_uring runtimes can exhaust kernel resources.
    // Reuse a single runtime for all iterations of this benchmark.
    let rt = compio::runtime::Runtime::new().unwrap();

    for &size in MESSAGE_SIZES {
        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let payload = Bytes::from(vec![0u8; size]);

            b.iter(|| {
                rt.block_on(async {
                    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                    let server_addr = listener.local_addr().unwrap();

                    let server_task = compio::runtime::spawn(async move {
                        let (stream, _) = listener.accept().await.unwrap();
                        let mut left = PairSocket::from_tcp(stream).await.unwrap();
                        for _ in 0..MESSAGE_COUNT {
                            let msg = left.recv().await.unwrap().unwrap();
                            left.send(msg).await.ok();
                        }
                    });

                    let mut right = PairSocket::connect(server_addr).await.unwrap();

                    for _ in 0..MESSAGE_COUNT {
                        right.send(vec![black_box(payload.clone())]).await.unwrap();
                        let _ = right.recv().await.unwrap();
                    }

                    server_task.await;
                });
            });
        });
    }
    group.finish();
}

/// Benchmark DEALER/ROUTER throughput (public API).
fn dealer_router_throughput(c: &mut Criterion) {
    zlink::dev_tracing::init_tracing();
    let mut group = c.benchmark_group("throughput/zlink/dealer_router");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(10);

    let rt = compio::runtime::Runtime::new().unwrap();

    for &size in MESSAGE_SIZES {
        let payload = Bytes::from(vec![0u8; size]);

        group.throughput(Throughput::Bytes((size * MESSAGE_COUNT) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                    let server_addr = listener.local_addr().unwrap();

                    let router_task = compio::runtime::spawn(async move {
                        let (stream, _) = listener.accept().await.unwrap();
                        let mut router = RouterSocket::from_tcp(stream).await.unwrap();
                        for _ in 0..MESSAGE_COUNT {
                            let msg = router.recv().await.unwrap();
                            router.send(msg).await.ok();
                        }
                    });

                    let mut dealer = DealerSocket::connect(&server_addr.to_string()).await.unwrap();

                    for _ in 0..MESSAGE_COUNT {
                        dealer.send(vec![black_box(payload.clone())]).await.unwrap();
                        if let Some(_) = dealer.recv().await {
                            // Message received
                        }
                    }

                    router_task.await;
                });
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(60))
        .warm_up_time(Duration::from_secs(5))
        .sample_size(10);
    targets = pair_throughput, dealer_router_throughput
);
criterion_main!(benches);
