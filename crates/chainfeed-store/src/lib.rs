//! Durable storage for chainfeed: Parquet datasets on disk plus a
//! DuckDB run log.
//!
//! Raw per-provider pulls land under `raw/`, consolidated datasets
//! under `processed/`; run summaries and per-target outcomes go into
//! the `run_log` / `collection_log` tables for later inspection.

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::params;
use ::duckdb::params_from_iter;
use ::duckdb::types::Value as DuckValue;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use chainfeed_core::{Frame, UtcDateTime};

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("export rejected: {0}")]
    Export(String),
}

/// Filesystem and database layout for one store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub home: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl StoreConfig {
    /// Layout rooted at an explicit home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            raw_dir: home.join("data").join("raw"),
            processed_dir: home.join("data").join("processed"),
            db_path: home.join("chainfeed.duckdb"),
            home,
            max_pool_size: 4,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_home(resolve_chainfeed_home())
    }
}

/// One run-summary row as written by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub state: String,
    pub success_count: u32,
    pub failure_count: u32,
    pub total_rows: u64,
}

/// One per-target outcome row within a run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRecord {
    pub run_id: String,
    pub provider: String,
    pub dataset: String,
    pub fetched_at: String,
    pub latency_ms: u64,
    pub rows: u64,
    pub success: bool,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub raw_file: Option<String>,
}

/// Per-provider aggregate over the collection log.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    pub provider: String,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_rows: u64,
    pub last_success: Option<String>,
}

/// Handle to the on-disk store.
#[derive(Clone)]
pub struct Store {
    config: StoreConfig,
    manager: DuckDbConnectionManager,
}

impl Store {
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    /// Opens the store, creating the directory layout and applying
    /// pending migrations.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.raw_dir)?;
        fs::create_dir_all(&config.processed_dir)?;
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let store = Self { config, manager };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn raw_dir(&self) -> &Path {
        self.config.raw_dir.as_path()
    }

    pub fn processed_dir(&self) -> &Path {
        self.config.processed_dir.as_path()
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Writes one provider pull as `raw/{source}_{dataset}_{stamp}.parquet`.
    ///
    /// Raw files are write-once: an existing target path is an error,
    /// never an append or overwrite.
    pub fn write_raw(
        &self,
        frame: &Frame,
        source: &str,
        dataset: &str,
        at: UtcDateTime,
    ) -> Result<PathBuf, StoreError> {
        let file_name = format!("{source}_{dataset}_{}.parquet", datetime_stamp(at));
        let path = self.config.raw_dir.join(file_name);
        if path.exists() {
            return Err(StoreError::Export(format!(
                "raw file already exists: {}",
                path.display()
            )));
        }

        self.export_frame(frame, path.as_path())?;
        info!(path = %path.display(), rows = frame.row_count(), "wrote raw dataset");
        Ok(path)
    }

    /// Writes a consolidated dataset as
    /// `processed/{feature_type}_{timeframe}_{YYYYMMDD}.parquet`.
    ///
    /// The date-granular name can collide when several cycles close on
    /// the same day; collisions fall back to a time-suffixed name so
    /// earlier output is never overwritten.
    pub fn write_processed(
        &self,
        frame: &Frame,
        feature_type: &str,
        timeframe: &str,
        at: UtcDateTime,
    ) -> Result<PathBuf, StoreError> {
        let file_name = format!("{feature_type}_{timeframe}_{}.parquet", date_stamp(at));
        let mut path = self.config.processed_dir.join(file_name);
        if path.exists() {
            let file_name =
                format!("{feature_type}_{timeframe}_{}.parquet", datetime_stamp(at));
            path = self.config.processed_dir.join(file_name);
        }
        if path.exists() {
            return Err(StoreError::Export(format!(
                "processed file already exists: {}",
                path.display()
            )));
        }

        self.export_frame(frame, path.as_path())?;
        info!(path = %path.display(), rows = frame.row_count(), "wrote processed dataset");
        Ok(path)
    }

    /// Appends a run summary and its per-target rows in one
    /// transaction.
    pub fn append_run(
        &self,
        run: &RunRecord,
        results: &[CollectionRecord],
    ) -> Result<(), StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let outcome = (|| -> Result<(), StoreError> {
            connection.execute(
                r#"
INSERT INTO run_log (run_id, started_at, finished_at, state, success_count, failure_count, total_rows)
VALUES (?, TRY_CAST(? AS TIMESTAMP), TRY_CAST(? AS TIMESTAMP), ?, ?, ?, ?)
"#,
                params![
                    run.run_id,
                    run.started_at,
                    run.finished_at,
                    run.state,
                    run.success_count,
                    run.failure_count,
                    run.total_rows as i64,
                ],
            )?;

            for result in results {
                connection.execute(
                    r#"
INSERT INTO collection_log (run_id, provider, dataset, fetched_at, latency_ms, row_count, success, error_kind, error, raw_file)
VALUES (?, ?, ?, TRY_CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?)
"#,
                    params![
                        result.run_id,
                        result.provider,
                        result.dataset,
                        result.fetched_at,
                        result.latency_ms as i64,
                        result.rows as i64,
                        result.success,
                        result.error_kind,
                        result.error,
                        result.raw_file,
                    ],
                )?;
            }
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                connection.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(error) => {
                let _ = connection.execute_batch("ROLLBACK");
                Err(error)
            }
        }
    }

    /// Most recent runs, newest first.
    pub fn run_history(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            r#"
SELECT run_id, CAST(started_at AS VARCHAR), CAST(finished_at AS VARCHAR),
       state, success_count, failure_count, total_rows
FROM run_log
ORDER BY started_at DESC
LIMIT ?
"#,
        )?;

        let rows = statement.query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                state: row.get(3)?,
                success_count: row.get::<_, i64>(4)? as u32,
                failure_count: row.get::<_, i64>(5)? as u32,
                total_rows: row.get::<_, i64>(6)? as u64,
            })
        })?;

        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }

    /// Per-target rows for one run, in insertion order.
    pub fn run_results(&self, run_id: &str) -> Result<Vec<CollectionRecord>, StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            r#"
SELECT run_id, provider, dataset, CAST(fetched_at AS VARCHAR),
       latency_ms, row_count, success, error_kind, error, raw_file
FROM collection_log
WHERE run_id = ?
ORDER BY created_at
"#,
        )?;

        let rows = statement.query_map(params![run_id], |row| {
            Ok(CollectionRecord {
                run_id: row.get(0)?,
                provider: row.get(1)?,
                dataset: row.get(2)?,
                fetched_at: row.get(3)?,
                latency_ms: row.get::<_, i64>(4)? as u64,
                rows: row.get::<_, i64>(5)? as u64,
                success: row.get(6)?,
                error_kind: row.get(7)?,
                error: row.get(8)?,
                raw_file: row.get(9)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Aggregate outcomes per provider across every recorded run.
    pub fn collection_stats(&self) -> Result<Vec<ProviderStats>, StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            r#"
SELECT provider,
       CAST(COUNT(*) AS BIGINT),
       CAST(SUM(CASE WHEN success THEN 1 ELSE 0 END) AS BIGINT),
       CAST(SUM(CASE WHEN success THEN 0 ELSE 1 END) AS BIGINT),
       CAST(SUM(row_count) AS BIGINT),
       CAST(MAX(CASE WHEN success THEN fetched_at END) AS VARCHAR)
FROM collection_log
GROUP BY provider
ORDER BY provider
"#,
        )?;

        let rows = statement.query_map([], |row| {
            Ok(ProviderStats {
                provider: row.get(0)?,
                attempts: row.get::<_, i64>(1)? as u64,
                successes: row.get::<_, i64>(2)? as u64,
                failures: row.get::<_, i64>(3)? as u64,
                total_rows: row.get::<_, Option<i64>>(4)?.unwrap_or_default() as u64,
                last_success: row.get(5)?,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }

    /// Stages a frame into a temp table and copies it out as Parquet.
    fn export_frame(&self, frame: &Frame, path: &Path) -> Result<(), StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;

        let columns_sql = frame
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                format!("{} {}", quote_identifier(name), infer_column_type(frame, index))
            })
            .collect::<Vec<_>>()
            .join(", ");
        connection.execute_batch(&format!(
            "CREATE OR REPLACE TEMP TABLE export_stage ({columns_sql});"
        ))?;

        let placeholders = vec!["?"; frame.columns().len()].join(", ");
        let mut statement =
            connection.prepare(&format!("INSERT INTO export_stage VALUES ({placeholders})"))?;
        for row in frame.rows() {
            let cells = row.iter().map(json_to_duck).collect::<Vec<_>>();
            statement.execute(params_from_iter(cells))?;
        }

        connection.execute_batch(&format!(
            "COPY export_stage TO '{}' (FORMAT PARQUET);",
            escape_sql_string(&path.display().to_string())
        ))?;
        connection.execute_batch("DROP TABLE export_stage;")?;
        Ok(())
    }
}

/// Column type from the first pass over the cells: all-integer columns
/// stay BIGINT, any float makes it DOUBLE, booleans map to BOOLEAN,
/// everything else (including mixed types) lands in VARCHAR.
fn infer_column_type(frame: &Frame, index: usize) -> &'static str {
    let mut seen_integer = false;
    for row in frame.rows() {
        match &row[index] {
            Value::Null => {}
            Value::Number(number) => {
                if number.is_i64() || number.is_u64() {
                    seen_integer = true;
                } else {
                    return "DOUBLE";
                }
            }
            Value::Bool(_) => return "BOOLEAN",
            _ => return "VARCHAR",
        }
    }
    if seen_integer {
        "BIGINT"
    } else {
        "VARCHAR"
    }
}

fn json_to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(flag) => DuckValue::Boolean(*flag),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                DuckValue::BigInt(integer)
            } else {
                DuckValue::Double(number.as_f64().unwrap_or_default())
            }
        }
        Value::String(text) => DuckValue::Text(text.clone()),
        other => DuckValue::Text(other.to_string()),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// `YYYYMMDD_HHMMSS` in UTC.
fn datetime_stamp(at: UtcDateTime) -> String {
    let datetime = at.into_inner();
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        datetime.year(),
        u8::from(datetime.month()),
        datetime.day(),
        datetime.hour(),
        datetime.minute(),
        datetime.second()
    )
}

/// `YYYYMMDD` in UTC.
fn date_stamp(at: UtcDateTime) -> String {
    let datetime = at.into_inner();
    format!(
        "{:04}{:02}{:02}",
        datetime.year(),
        u8::from(datetime.month()),
        datetime.day()
    )
}

fn resolve_chainfeed_home() -> PathBuf {
    if let Some(path) = env::var_os("CHAINFEED_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".chainfeed");
    }

    PathBuf::from(".chainfeed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Store::open(StoreConfig::with_home(dir.path())).expect("store opens");
        (dir, store)
    }

    fn candle_frame() -> Frame {
        Frame::new(
            ["timestamp", "open", "close"]
                .iter()
                .map(|c| (*c).to_owned())
                .collect(),
            vec![
                vec![json!(1714560000000_i64), json!(3000.5), json!(3020.25)],
                vec![json!(1714563600000_i64), json!(3020.25), json!(2995.0)],
            ],
        )
        .expect("valid frame")
    }

    fn run(run_id: &str) -> RunRecord {
        RunRecord {
            run_id: run_id.to_owned(),
            started_at: String::from("2024-05-01T12:00:00Z"),
            finished_at: String::from("2024-05-01T12:00:09Z"),
            state: String::from("closed"),
            success_count: 2,
            failure_count: 1,
            total_rows: 40,
        }
    }

    fn result(run_id: &str, provider: &str, success: bool) -> CollectionRecord {
        CollectionRecord {
            run_id: run_id.to_owned(),
            provider: provider.to_owned(),
            dataset: String::from("eth_ohlcv"),
            fetched_at: String::from("2024-05-01T12:00:03Z"),
            latency_ms: 120,
            rows: if success { 20 } else { 0 },
            success,
            error_kind: (!success).then(|| String::from("upstream")),
            error: (!success).then(|| String::from("status 503")),
            raw_file: success.then(|| String::from("raw/x.parquet")),
        }
    }

    #[test]
    fn open_creates_layout_and_tables() {
        let (_dir, store) = temp_store();
        assert!(store.raw_dir().is_dir());
        assert!(store.processed_dir().is_dir());
        assert!(store.run_history(10).expect("empty history").is_empty());
    }

    #[test]
    fn raw_files_follow_the_naming_scheme() {
        let (_dir, store) = temp_store();
        let at = UtcDateTime::parse("2024-05-01T12:34:56Z").expect("valid time");

        let path = store
            .write_raw(&candle_frame(), "hyperliquid", "eth_ohlcv", at)
            .expect("export succeeds");

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("hyperliquid_eth_ohlcv_20240501_123456.parquet")
        );
        assert!(path.exists());
    }

    #[test]
    fn raw_files_are_write_once() {
        let (_dir, store) = temp_store();
        let at = UtcDateTime::parse("2024-05-01T12:34:56Z").expect("valid time");

        store
            .write_raw(&candle_frame(), "dune", "bot_volume", at)
            .expect("first write");
        let err = store
            .write_raw(&candle_frame(), "dune", "bot_volume", at)
            .expect_err("same path rejected");
        assert!(matches!(err, StoreError::Export(_)));
    }

    #[test]
    fn processed_collision_falls_back_to_time_suffix() {
        let (_dir, store) = temp_store();
        let at = UtcDateTime::parse("2024-05-01T12:34:56Z").expect("valid time");

        let first = store
            .write_processed(&candle_frame(), "consolidated", "1h", at)
            .expect("first write");
        let second = store
            .write_processed(&candle_frame(), "consolidated", "1h", at)
            .expect("second write");

        assert_eq!(
            first.file_name().and_then(|n| n.to_str()),
            Some("consolidated_1h_20240501.parquet")
        );
        assert_eq!(
            second.file_name().and_then(|n| n.to_str()),
            Some("consolidated_1h_20240501_123456.parquet")
        );
    }

    #[test]
    fn exported_parquet_reads_back() {
        let (_dir, store) = temp_store();
        let at = UtcDateTime::parse("2024-05-01T00:00:00Z").expect("valid time");
        let path = store
            .write_raw(&candle_frame(), "hyperliquid", "eth_ohlcv", at)
            .expect("export succeeds");

        let connection = store
            .manager
            .acquire(AccessMode::ReadOnly)
            .expect("connection");
        let count: i64 = connection
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM read_parquet('{}')",
                    escape_sql_string(&path.display().to_string())
                ),
                [],
                |row| row.get(0),
            )
            .expect("parquet readable");
        assert_eq!(count, 2);
    }

    #[test]
    fn append_run_round_trips_through_history() {
        let (_dir, store) = temp_store();
        store
            .append_run(
                &run("run-1"),
                &[result("run-1", "dune", true), result("run-1", "hyperliquid", false)],
            )
            .expect("append succeeds");

        let history = store.run_history(10).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].run_id, "run-1");
        assert_eq!(history[0].success_count, 2);
        assert_eq!(history[0].failure_count, 1);

        let results = store.run_results("run-1").expect("results");
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].error_kind.as_deref(), Some("upstream"));
    }

    #[test]
    fn collection_stats_aggregate_per_provider() {
        let (_dir, store) = temp_store();
        store
            .append_run(
                &run("run-1"),
                &[result("run-1", "dune", true), result("run-1", "dune", false)],
            )
            .expect("append succeeds");

        let stats = store.collection_stats().expect("stats");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].provider, "dune");
        assert_eq!(stats[0].attempts, 2);
        assert_eq!(stats[0].successes, 1);
        assert_eq!(stats[0].failures, 1);
        assert_eq!(stats[0].total_rows, 20);
        assert!(stats[0].last_success.is_some());
    }
}
