use backtester::indicators::{ema::Ema, rsi::Rsi, sma};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Synthetic close series: a gentle upward drift with a repeating
/// oscillation, long enough to amortize per-call overhead.
fn synthetic_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64) * 0.01 + (i as f64 * 0.1).sin() * 2.0)
        .collect()
}

pub fn sma_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("sma_batch");
    for &n in &[1_000usize, 10_000, 100_000] {
        let closes = synthetic_closes(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &closes, |b, closes| {
            b.iter(|| sma::sma(closes, 20).unwrap())
        });
    }
    group.finish();
}

pub fn ema_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("ema_incremental");
    for &n in &[1_000usize, 10_000, 100_000] {
        let closes = synthetic_closes(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &closes, |b, closes| {
            b.iter(|| {
                let mut ema = Ema::new(20).unwrap();
                for &c in closes {
                    ema.update(c);
                }
            })
        });
    }
    group.finish();
}

pub fn rsi_incremental(c: &mut Criterion) {
    let mut group = c.benchmark_group("rsi_incremental");
    for &n in &[1_000usize, 10_000, 100_000] {
        let closes = synthetic_closes(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &closes, |b, closes| {
            b.iter(|| {
                let mut rsi = Rsi::new(14).unwrap();
                for &c in closes {
                    rsi.update(c);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, sma_batch, ema_incremental, rsi_incremental);
criterion_main!(benches);
