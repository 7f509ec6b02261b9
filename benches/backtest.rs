use backtester::backtest::config::BacktestConfig;
use backtester::backtest::engine::Backtester;
use backtester::backtest::risk::RiskConfig;
use backtester::backtest::config::StopTarget;
use backtester::strategy::sma_crossover::{SmaCrossoverConfig, SmaCrossoverStrategy};
use backtester::strategy::Strategy;
use backtester::types::BarTable;
use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn synthetic_bars(n: usize) -> BarTable {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + (i as f64) * 0.02 + (i as f64 * 0.05).sin() * 3.0)
        .collect();
    BarTable {
        timestamp: (0..n as i64).map(|i| Utc.timestamp_opt(i * 3600, 0).unwrap()).collect(),
        open: closes.clone(),
        high: closes.iter().map(|c| c + 0.5).collect(),
        low: closes.iter().map(|c| c - 0.5).collect(),
        close: closes,
        volume: vec![1_000.0; n],
        columns: Default::default(),
    }
}

pub fn full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_run");

    let strategy = SmaCrossoverStrategy::new(SmaCrossoverConfig {
        fast_window: 10,
        slow_window: 30,
        allow_short: true,
    })
    .unwrap();
    let backtest_config = BacktestConfig::new(
        10_000.0,
        StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 },
        0.001,
        0.0005,
        true,
    )
    .unwrap();
    let risk_config = RiskConfig::new(0.01, 1.0).unwrap();
    let backtester = Backtester::new(backtest_config, risk_config);

    for &n in &[1_000usize, 10_000, 50_000] {
        let bars = synthetic_bars(n);
        let signaled = strategy.generate_signals(&bars).unwrap();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &signaled, |b, signaled| {
            b.iter(|| backtester.run(signaled).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, full_run);
criterion_main!(benches);
