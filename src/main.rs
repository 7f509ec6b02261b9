use std::collections::HashMap;
use std::process;

use backtester::backtest::config::BacktestConfig;
use backtester::backtest::engine::Backtester;
use backtester::backtest::{RiskConfig, StopTarget};
use backtester::optimizer::{Optimizer, OptimizerConfig};
use backtester::params::{ParamGrid, ParamSet};
use backtester::strategy::StrategyKind;
use backtester::types::BarTable;
use backtester::util::config::Config;
use backtester::util::csv_reader;
use log::{error, info};

fn main() {
    env_logger::init();
    let config = Config::new();
    info!("{:?}", config);

    let bars = match csv_reader::read_bar_table(&config.data_path) {
        Ok(bars) => bars,
        Err(e) => {
            error!("failed to read {}: {e}", config.data_path);
            process::exit(1);
        }
    };
    if let Err(e) = bars.validate() {
        error!("invalid bar table: {e}");
        process::exit(1);
    }

    let strategy_kind = match StrategyKind::from_name(&config.strategy) {
        Some(k) => k,
        None => {
            error!("unknown strategy: {}", config.strategy);
            process::exit(1);
        }
    };

    let risk = RiskConfig::new(0.01, 1.0).expect("default risk config is valid");
    let base_backtest = BacktestConfig::new(
        10_000.0,
        StopTarget::Pct { sl_pct: 0.02, tp_rr: 2.0 },
        0.001,
        0.0005,
        true,
    )
    .expect("default backtest config is valid");

    std::fs::create_dir_all(&config.output_dir).expect("failed to create output directory");

    if config.optimize {
        run_optimize(&bars, strategy_kind, &base_backtest, risk, &config.output_dir);
    } else {
        run_single(&bars, strategy_kind, &base_backtest, risk, &config.output_dir);
    }
}

fn run_single(
    bars: &BarTable,
    strategy_kind: StrategyKind,
    base_backtest: &BacktestConfig,
    risk: RiskConfig,
    output_dir: &str,
) {
    let params: ParamSet = HashMap::new();
    let strategy = match strategy_kind.build(&params) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to build {}: {e}", strategy_kind.name());
            process::exit(1);
        }
    };

    let signaled = match strategy.generate_signals(bars) {
        Ok(b) => b,
        Err(e) => {
            error!("failed to generate signals: {e}");
            process::exit(1);
        }
    };

    let backtester = Backtester::new(*base_backtest, risk);
    let result = match backtester.run(&signaled) {
        Ok(r) => r,
        Err(e) => {
            error!("backtest failed: {e}");
            process::exit(1);
        }
    };

    info!(
        "{}: {} trades, {:.2}% return, sharpe {:.2}",
        strategy_kind.name(),
        result.metrics.num_trades,
        result.metrics.total_return_pct,
        result.metrics.sharpe_ratio
    );

    let trades_path = format!("{output_dir}/trades.csv");
    let equity_path = format!("{output_dir}/equity.csv");
    let metrics_path = format!("{output_dir}/metrics.json");

    csv_reader::write_trades_csv(&trades_path, &result.trades).expect("failed to write trades csv");
    csv_reader::write_equity_csv(&equity_path, &result.equity_curve).expect("failed to write equity csv");
    csv_reader::write_metrics_json(&metrics_path, &result.metrics).expect("failed to write metrics json");
}

fn run_optimize(
    bars: &BarTable,
    strategy_kind: StrategyKind,
    base_backtest: &BacktestConfig,
    risk: RiskConfig,
    output_dir: &str,
) {
    let opt_config = OptimizerConfig::default();
    let optimizer = Optimizer::new(opt_config, risk);

    let mut grid: ParamGrid = HashMap::new();
    grid.insert("fast_window".to_string(), vec![5i64.into(), 10i64.into(), 20i64.into()]);
    grid.insert("slow_window".to_string(), vec![30i64.into(), 50i64.into(), 100i64.into()]);

    let filter = |p: &ParamSet| {
        let fast = p.get("fast_window").and_then(|v| v.as_usize()).unwrap_or(0);
        let slow = p.get("slow_window").and_then(|v| v.as_usize()).unwrap_or(0);
        fast < slow
    };

    let result = match optimizer.optimize(bars, strategy_kind, base_backtest, &grid, None, Some(&filter)) {
        Ok(r) => r,
        Err(e) => {
            error!("optimization failed: {e}");
            process::exit(1);
        }
    };

    info!(
        "best {}: {:?} -> {:.2}% return over {} combinations",
        strategy_kind.name(),
        result.best_params,
        result.best_metrics.total_return_pct,
        result.combinations_tried
    );

    let optimization_path = format!("{output_dir}/optimization.csv");
    csv_reader::write_optimization_csv(&optimization_path, &result.all_results)
        .expect("failed to write optimization csv");
}
