//! Dispatch benchmark suite.
//!
//! Measures the facade's per-event overhead over a no-op transport:
//! - Message fan-out to 1, 8 and 64 listeners
//! - `send` through the transport seam
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use websocket_compat::{
    Completion, Data, Dispatcher, EventKind, Notifier, SubProtocols, Transport, WebSocket,
    listener,
};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const LISTENER_COUNTS: &[usize] = &[1, 8, 64];
const BATCH: usize = 256;

// ============================================================================
// Null Transport
// ============================================================================

/// Completes every send immediately.
struct NullTransport;

impl Transport for NullTransport {
    fn transmit(&self, _data: Data, completion: Completion) {
        completion(Ok(()));
    }

    fn request_close(&self) {}
}

fn socket() -> (WebSocket, Dispatcher, Notifier) {
    let mut injected = None;
    let (ws, dispatcher) =
        WebSocket::with_transport("ws://127.0.0.1:9001/bench", SubProtocols::none(), |n| {
            injected = Some(n);
            NullTransport
        })
        .expect("valid url");
    let notifier = injected.expect("factory ran");
    notifier.open();
    (ws, dispatcher, notifier)
}

// ============================================================================
// Benchmark: Message Fan-out
// ============================================================================

fn bench_message_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_fanout");
    group.throughput(Throughput::Elements(BATCH as u64));

    for &count in LISTENER_COUNTS {
        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, &n| {
            let (ws, mut dispatcher, notifier) = socket();
            for _ in 0..n {
                ws.add_event_listener(
                    EventKind::Message,
                    listener(|event| {
                        black_box(event.as_message());
                    }),
                );
            }
            dispatcher.dispatch_pending();

            b.iter(|| {
                for _ in 0..BATCH {
                    notifier.message("payload");
                }
                black_box(dispatcher.dispatch_pending())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Send
// ============================================================================

fn bench_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("send");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("text", |b| {
        let (ws, _dispatcher, _notifier) = socket();
        b.iter(|| {
            for _ in 0..BATCH {
                ws.send(black_box("payload"));
            }
        });
    });

    group.bench_function("json", |b| {
        let (ws, _dispatcher, _notifier) = socket();
        let value = serde_json::json!({ "op": "update", "seq": 42 });
        b.iter(|| {
            for _ in 0..BATCH {
                ws.send_json(black_box(&value)).expect("serializable");
            }
        });
    });

    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(benches, bench_message_fanout, bench_send);
criterion_main!(benches);
