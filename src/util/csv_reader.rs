//! CSV ingestion for the bar-table schema (spec.md §6) and the three
//! CSV result artifacts a `BacktestResult`/`OptimizationResult` can be
//! serialized to: trades, equity, and the optimization table.
//!
//! Generalizes the teacher's `CsvReader` (a generic
//! `HashMap<String, String>`-per-row reader) into a reader that builds
//! a typed [`BarTable`] directly, since the backbone here is a
//! fixed-schema struct-of-arrays rather than the teacher's open-ended
//! record map.
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_derive::Serialize;

use crate::optimizer::OptimizationRow;
use crate::types::{BarTable, EquityPoint, MetricsBundle, Trade};

#[derive(Debug)]
pub enum CsvError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(&'static str),
    BadTimestamp(String),
    BadNumber { column: &'static str, value: String },
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvError::Io(e) => write!(f, "io error: {e}"),
            CsvError::Csv(e) => write!(f, "csv error: {e}"),
            CsvError::MissingColumn(name) => write!(f, "missing column: {name}"),
            CsvError::BadTimestamp(s) => write!(f, "unparseable timestamp: {s}"),
            CsvError::BadNumber { column, value } => write!(f, "unparseable {column}: {value}"),
        }
    }
}

impl std::error::Error for CsvError {}

impl From<std::io::Error> for CsvError {
    fn from(e: std::io::Error) -> Self {
        CsvError::Io(e)
    }
}

impl From<csv::Error> for CsvError {
    fn from(e: csv::Error) -> Self {
        CsvError::Csv(e)
    }
}

/// Parses a bar timestamp, trying RFC 3339, the common
/// `%Y-%m-%d %H:%M:%S` form, and a bare Unix-epoch-seconds integer, in
/// that order.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CsvError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        if let Some(dt) = Utc.timestamp_opt(epoch, 0).single() {
            return Ok(dt);
        }
    }
    Err(CsvError::BadTimestamp(raw.to_string()))
}

fn parse_f64(column: &'static str, raw: &str) -> Result<f64, CsvError> {
    raw.trim().parse::<f64>().map_err(|_| CsvError::BadNumber { column, value: raw.to_string() })
}

/// Reads a bar table from a CSV file with a header row containing at
/// least `timestamp, open, high, low, close, volume`. Does not
/// validate the table's invariants; call [`BarTable::validate`]
/// before handing it to a strategy or the backtester.
pub fn read_bar_table(path: impl AsRef<Path>) -> Result<BarTable, CsvError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();

    let index_of = |name: &'static str| -> Result<usize, CsvError> {
        headers.iter().position(|h| h == name).ok_or(CsvError::MissingColumn(name))
    };
    let (ts_i, o_i, h_i, l_i, c_i, v_i) = (
        index_of("timestamp")?,
        index_of("open")?,
        index_of("high")?,
        index_of("low")?,
        index_of("close")?,
        index_of("volume")?,
    );

    let mut table = BarTable::default();
    for record in reader.records() {
        let record = record?;
        table.timestamp.push(parse_timestamp(&record[ts_i])?);
        table.open.push(parse_f64("open", &record[o_i])?);
        table.high.push(parse_f64("high", &record[h_i])?);
        table.low.push(parse_f64("low", &record[l_i])?);
        table.close.push(parse_f64("close", &record[c_i])?);
        table.volume.push(parse_f64("volume", &record[v_i])?);
    }

    Ok(table)
}

#[derive(Serialize)]
struct TradeRow<'a> {
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    side: String,
    entry_price: f64,
    exit_price: f64,
    position_size: f64,
    stop_loss_price: f64,
    take_profit_price: f64,
    pnl: f64,
    pnl_pct: f64,
    duration_candles: usize,
    exit_reason: &'a str,
}

/// Writes the trades CSV artifact from spec.md §6: one row per trade.
pub fn write_trades_csv(path: impl AsRef<Path>, trades: &[Trade]) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_path(path)?;
    for t in trades {
        writer.serialize(TradeRow {
            entry_time: t.entry_time,
            exit_time: t.exit_time,
            side: t.side.to_string(),
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            position_size: t.size,
            stop_loss_price: t.stop_loss,
            take_profit_price: t.take_profit,
            pnl: t.pnl,
            pnl_pct: t.pnl_pct,
            duration_candles: t.duration_bars,
            exit_reason: &t.exit_reason.to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct EquityRow {
    timestamp: DateTime<Utc>,
    equity: f64,
}

/// Writes the equity CSV artifact from spec.md §6: (timestamp, equity)
/// rows, one per input bar.
pub fn write_equity_csv(path: impl AsRef<Path>, equity_curve: &[EquityPoint]) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_path(path)?;
    for p in equity_curve {
        writer.serialize(EquityRow { timestamp: p.timestamp, equity: p.equity })?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the metrics JSON artifact from spec.md §6: a flat mapping of
/// metric name to scalar.
pub fn write_metrics_json(path: impl AsRef<Path>, metrics: &MetricsBundle) -> Result<(), CsvError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, metrics).map_err(|e| CsvError::Csv(csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, e))))
}

/// Writes the optimization CSV artifact from spec.md §6: one row per
/// evaluated combination, every varied parameter followed by every
/// metric from §3. Rows with no metrics (filtered or errored
/// combinations) still appear, with their metric columns blank.
pub fn write_optimization_csv(path: impl AsRef<Path>, rows: &[OptimizationRow]) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut param_names: Vec<&String> = Vec::new();
    for row in rows {
        for key in row.params.keys() {
            if !param_names.contains(&key) {
                param_names.push(key);
            }
        }
    }
    param_names.sort();

    let metric_names = [
        "total_return_pct",
        "num_trades",
        "winning_trades",
        "losing_trades",
        "winrate_pct",
        "gross_profit",
        "gross_loss",
        "profit_factor",
        "max_drawdown_pct",
        "max_drawdown_duration_bars",
        "sharpe_ratio",
        "sortino_ratio",
        "calmar_ratio",
        "expectancy",
        "recovery_factor",
        "avg_trade_duration",
        "max_consecutive_wins",
        "max_consecutive_losses",
    ];

    let mut header: Vec<String> = param_names.iter().map(|s| s.to_string()).collect();
    header.extend(metric_names.iter().map(|s| s.to_string()));
    header.push("error".to_string());
    writer.write_record(&header)?;

    for row in rows {
        let mut fields: Vec<String> = param_names
            .iter()
            .map(|name| row.params.get(*name).map(|v| v.to_string()).unwrap_or_default())
            .collect();

        match &row.metrics {
            Some(m) => {
                fields.extend([
                    m.total_return_pct.to_string(),
                    m.num_trades.to_string(),
                    m.winning_trades.to_string(),
                    m.losing_trades.to_string(),
                    m.winrate_pct.to_string(),
                    m.gross_profit.to_string(),
                    m.gross_loss.to_string(),
                    m.profit_factor.to_string(),
                    m.max_drawdown_pct.to_string(),
                    m.max_drawdown_duration_bars.to_string(),
                    m.sharpe_ratio.to_string(),
                    m.sortino_ratio.to_string(),
                    m.calmar_ratio.to_string(),
                    m.expectancy.to_string(),
                    m.recovery_factor.to_string(),
                    m.avg_trade_duration.to_string(),
                    m.max_consecutive_wins.to_string(),
                    m.max_consecutive_losses.to_string(),
                ]);
            }
            None => fields.extend(std::iter::repeat(String::new()).take(metric_names.len())),
        }
        fields.push(row.error.clone().unwrap_or_default());

        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a CSV into a generic `HashMap<String, String>` per row,
/// preserved from the teacher's original reader for ad hoc tables that
/// don't fit the bar-table schema (e.g. a parameter-override file).
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<HashMap<String, String>>, CsvError> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = HashMap::new();
        for (i, field) in record.iter().enumerate() {
            row.insert(headers[i].to_string(), field.to_string());
        }
        records.push(row);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_bar_table_from_csv() {
        let mut file = tempfile_with_contents(
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 00:00:00,100,101,99,100.5,1000\n\
             2024-01-01 01:00:00,100.5,102,100,101.5,1200\n",
        );
        let table = read_bar_table(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.close[1], 101.5);
        file.flush().unwrap();
    }

    #[test]
    fn rejects_missing_column() {
        let file = tempfile_with_contents("timestamp,open,high,low,close\n2024-01-01 00:00:00,1,2,0,1\n");
        assert!(read_bar_table(file.path()).is_err());
    }

    fn tempfile_with_contents(contents: &str) -> tempfile_shim::NamedTempFile {
        tempfile_shim::NamedTempFile::new(contents)
    }

    /// A tiny stand-in for a temp-file crate: write `contents` to a
    /// uniquely named file under `std::env::temp_dir()` and remove it
    /// on drop, avoiding a new dev-dependency for two tests.
    mod tempfile_shim {
        use std::fs;
        use std::path::{Path, PathBuf};
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct NamedTempFile {
            path: PathBuf,
        }

        impl NamedTempFile {
            pub fn new(contents: &str) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let path = std::env::temp_dir().join(format!("backtester_csv_test_{}_{n}.csv", std::process::id()));
                fs::write(&path, contents).expect("write temp csv");
                Self { path }
            }

            pub fn path(&self) -> &Path {
                &self.path
            }
        }

        impl Drop for NamedTempFile {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.path);
            }
        }
    }
}
