use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

use crate::model::{InstrumentClass, Timeframe};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    /// No realized price has been matched yet; retried on every reconcile.
    Pending,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub ticker: String,
    pub market_type: InstrumentClass,
    pub prediction_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
    pub predicted_price: f64,
    pub actual_price: Option<f64>,
    pub error_percentage: Option<f64>,
    pub timeframe: Timeframe,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn status(&self) -> ReconciliationStatus {
        match (self.actual_price, self.error_percentage) {
            (Some(_), Some(_)) => ReconciliationStatus::Resolved,
            _ => ReconciliationStatus::Pending,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status() == ReconciliationStatus::Pending && self.target_time <= now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub ticker: String,
    pub market_type: InstrumentClass,
    pub prediction_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
    pub predicted_price: f64,
    pub timeframe: Timeframe,
}

/// SQLite-backed prediction log. Each call opens its own connection, so the
/// store can be shared freely across threads and processes.
#[derive(Debug, Clone)]
pub struct PredictionStore {
    path: PathBuf,
}

impl PredictionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store.connect()?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .context("failed to enable WAL journal")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                market_type TEXT NOT NULL,
                prediction_time_ms INTEGER NOT NULL,
                target_time_ms INTEGER NOT NULL,
                predicted_price REAL NOT NULL,
                actual_price REAL,
                error_percentage REAL,
                timeframe TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                CHECK ((actual_price IS NULL) = (error_percentage IS NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_lookup
                ON predictions (ticker, market_type, timeframe, prediction_time_ms);
            "#,
        )
        .context("failed to initialise predictions schema")?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Inserts all rows in one transaction and returns their ids in order.
    pub fn insert_batch(
        &self,
        rows: &[NewPrediction],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO predictions (
                    ticker, market_type, prediction_time_ms, target_time_ms,
                    predicted_price, actual_price, error_percentage, timeframe, created_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7)
                "#,
            )?;
            for row in rows {
                stmt.execute(params![
                    row.ticker,
                    row.market_type.as_str(),
                    row.prediction_time.timestamp_millis(),
                    row.target_time.timestamp_millis(),
                    row.predicted_price,
                    row.timeframe.as_str(),
                    created_at.timestamp_millis(),
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Records for one (ticker, market, timeframe) key issued after `cutoff`,
    /// newest prediction first.
    pub fn load_window(
        &self,
        ticker: &str,
        market_type: InstrumentClass,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, ticker, market_type, prediction_time_ms, target_time_ms,
                   predicted_price, actual_price, error_percentage, timeframe, created_at_ms
            FROM predictions
            WHERE ticker = ?1 AND market_type = ?2 AND timeframe = ?3
              AND prediction_time_ms > ?4
            ORDER BY prediction_time_ms DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map(
            params![
                ticker,
                market_type.as_str(),
                timeframe.as_str(),
                cutoff.timestamp_millis()
            ],
            record_from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn get(&self, id: i64) -> Result<Option<PredictionRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                r#"
                SELECT id, ticker, market_type, prediction_time_ms, target_time_ms,
                       predicted_price, actual_price, error_percentage, timeframe, created_at_ms
                FROM predictions
                WHERE id = ?1
                "#,
                [id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Writes the realized price for a pending record. Returns false when the
    /// record is missing or was already resolved by another caller.
    pub fn resolve(&self, id: i64, actual_price: f64, error_percentage: f64) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            r#"
            UPDATE predictions
            SET actual_price = ?1, error_percentage = ?2
            WHERE id = ?3 AND actual_price IS NULL
            "#,
            params![actual_price, error_percentage, id],
        )?;
        tx.commit()?;
        Ok(changed == 1)
    }

    /// Deletes every record. Returns the number of rows removed.
    pub fn clear(&self) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM predictions", [])?;
        Ok(removed)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PredictionRecord> {
    let market: String = row.get(2)?;
    let timeframe: String = row.get(8)?;
    Ok(PredictionRecord {
        id: row.get(0)?,
        ticker: row.get(1)?,
        market_type: market
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        prediction_time: datetime_from_ms(row, 3)?,
        target_time: datetime_from_ms(row, 4)?,
        predicted_price: row.get(5)?,
        actual_price: row.get(6)?,
        error_percentage: row.get(7)?,
        timeframe: timeframe
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?,
        created_at: datetime_from_ms(row, 9)?,
    })
}

fn datetime_from_ms(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}
