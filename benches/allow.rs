use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::future::Ready;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceBuilder};
use turnstile::rate_limit::{AdmissionLayer, Config, Limiter, RateLimiter};

// A simple service that just returns its input.
#[derive(Clone)]
struct EchoService;

impl Service<&'static str> for EchoService {
    type Response = &'static str;
    type Error = std::io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: &'static str) -> Self::Future {
        futures::future::ready(Ok(req))
    }
}

fn allow_single_client(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let shutdown = CancellationToken::new();
    let limiter = rt.block_on(async { RateLimiter::new(Config::per_second(u32::MAX), &shutdown).unwrap() });

    c.bench_function("allow_single_client", |b| {
        b.iter(|| black_box(limiter.allow(black_box("10.0.0.1"))));
    });
    shutdown.cancel();
}

fn allow_many_clients(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let shutdown = CancellationToken::new();
    let limiter = rt.block_on(async { RateLimiter::new(Config::per_second(u32::MAX), &shutdown).unwrap() });
    let clients: Vec<String> = (0..10_000).map(|i| format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256)).collect();

    let mut next = 0;
    c.bench_function("allow_10k_clients", |b| {
        b.iter(|| {
            next = (next + 1) % clients.len();
            black_box(limiter.allow(black_box(&clients[next])))
        });
    });
    shutdown.cancel();
}

fn admission_layer_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let shutdown = CancellationToken::new();
    let limiter = rt.block_on(async { RateLimiter::new(Config::per_second(u32::MAX), &shutdown).unwrap() });
    let layer = AdmissionLayer::by_remote_addr(limiter, |req: &&'static str| *req);
    let svc = ServiceBuilder::new().layer(layer).service(EchoService);

    c.bench_function("admission_layer_admitted", |b| {
        b.to_async(&rt).iter(|| async {
            let mut local_svc = svc.clone();
            let _ = black_box(local_svc.call(black_box("192.168.0.1:4000"))).await;
        });
    });
    shutdown.cancel();
}

criterion_group!(benches, allow_single_client, allow_many_clients, admission_layer_throughput);
criterion_main!(benches);
