// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::{
    record::{GPSD_SOURCE, LogRecord},
    settings::LogSettings,
};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info};

/// Default time a unit of work waits for a lock held by another process.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS gps_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp_utc TEXT NOT NULL,
        lat REAL,
        lon REAL,
        alt_m REAL,
        speed_mps REAL,
        course_deg REAL,
        hdop REAL,
        satellites INTEGER,
        fix_mode INTEGER,
        source TEXT DEFAULT 'gpsd'
    );
    CREATE INDEX IF NOT EXISTS idx_gps_log_timestamp ON gps_log(timestamp_utc);
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    );";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store task failed: {0}")]
    Task(String),
}

/// Location and locking behavior of a [`SampleStore`].
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// How long a unit of work waits for a busy database before it fails.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// A row of the settings table.
#[derive(Clone, Debug, PartialEq)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: Option<String>,
}

/// The SQLite database with the append-only sample log and the settings table.
///
/// The database file is shared with other processes (the web API and the log
/// rotation), so the store keeps no connection open between calls. Every operation
/// opens a connection in WAL mode with `synchronous=NORMAL`, runs as one transaction
/// and commits on success. On any error the transaction is rolled back when it is
/// dropped. Readers never block the writer and a killed process never leaves the
/// database corrupted.
#[derive(Clone, Debug)]
pub struct SampleStore {
    config: StoreConfig,
}

impl SampleStore {
    pub fn new(config: StoreConfig) -> Self {
        SampleStore { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// The directory that holds the database file.
    pub fn data_dir(&self) -> PathBuf {
        match self.config.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Creates the tables and the timestamp index if they are missing and seeds the
    /// settings with `defaults`. Existing settings are never overwritten, so calling
    /// this on an initialized database changes nothing.
    pub fn init(&self, defaults: &LogSettings) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute_batch(SCHEMA)?;
            for (key, value) in defaults.entries() {
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO settings(key, value, updated_at)
                     VALUES(?1, ?2, CURRENT_TIMESTAMP)",
                    params![key, value],
                )?;
                if inserted > 0 {
                    debug!("Seeded setting {key} with default {value}");
                }
            }
            Ok(())
        })?;
        info!("Using sample database {}", self.config.path.display());
        Ok(())
    }

    /// Inserts or replaces the setting `key`.
    pub fn upsert_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO settings(key, value, updated_at)
                 VALUES(?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn setting(&self, key: &str) -> Result<Option<Setting>, StoreError> {
        self.read(|tx| {
            let setting = tx
                .query_row(
                    "SELECT key, value, updated_at FROM settings WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok(Setting {
                            key: row.get(0)?,
                            value: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(setting)
        })
    }

    /// Reads the setting `key` parsed as `T`.
    ///
    /// Returns `default` if the setting is absent or its value does not parse.
    /// Only database failures are reported as error.
    pub fn read_setting<T: FromStr>(&self, key: &str, default: T) -> Result<T, StoreError> {
        let Some(setting) = self.setting(key)? else {
            return Ok(default);
        };
        match setting.value.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => {
                debug!("Setting {key} has unparsable value {:?}", setting.value);
                Ok(default)
            }
        }
    }

    /// Appends one sample and returns its row id.
    pub fn append_sample(&self, record: &LogRecord) -> Result<i64, StoreError> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO gps_log(
                    timestamp_utc, lat, lon, alt_m, speed_mps, course_deg,
                    hdop, satellites, fix_mode, source
                 ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.timestamp_utc,
                    record.lat,
                    record.lon,
                    record.alt_m,
                    record.speed_mps,
                    record.course_deg,
                    record.hdop,
                    record.satellites,
                    record.fix_mode,
                    record.source,
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Returns the samples with `start <= timestamp_utc <= end` in ascending time order.
    ///
    /// The bounds are compared with the stored ISO-8601 strings. Samples without a
    /// position are left out.
    pub fn samples_between(&self, start: &str, end: &str) -> Result<Vec<LogRecord>, StoreError> {
        self.read(|tx| {
            let mut statement = tx.prepare(
                "SELECT timestamp_utc, lat, lon, alt_m, speed_mps, course_deg,
                        hdop, satellites, fix_mode, source
                 FROM gps_log
                 WHERE timestamp_utc >= ?1 AND timestamp_utc <= ?2
                   AND lat IS NOT NULL AND lon IS NOT NULL
                 ORDER BY timestamp_utc ASC, id ASC",
            )?;
            let records = statement
                .query_map(params![start, end], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    pub fn sample_count(&self) -> Result<u64, StoreError> {
        self.read(|tx| {
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM gps_log", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir)?;
        }
        let connection = Connection::open(&self.config.path)?;
        connection.busy_timeout(self.config.busy_timeout)?;
        connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        connection.pragma_update(None, "synchronous", "NORMAL")?;
        connection.pragma_update(None, "foreign_keys", "ON")?;
        Ok(connection)
    }

    fn read<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.unit_of_work(TransactionBehavior::Deferred, work)
    }

    /// Writes take the write lock up front, so the busy timeout applies to it.
    fn write<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.unit_of_work(TransactionBehavior::Immediate, work)
    }

    fn unit_of_work<T>(
        &self,
        behavior: TransactionBehavior,
        work: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut connection = self.open()?;
        let tx = connection.transaction_with_behavior(behavior)?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    Ok(LogRecord {
        timestamp_utc: row.get(0)?,
        lat: row.get(1)?,
        lon: row.get(2)?,
        alt_m: row.get(3)?,
        speed_mps: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        course_deg: row.get(5)?,
        hdop: row.get(6)?,
        satellites: row.get::<_, Option<u32>>(7)?.unwrap_or(0),
        fix_mode: row.get::<_, Option<u8>>(8)?.unwrap_or(0),
        source: row
            .get::<_, Option<String>>(9)?
            .unwrap_or_else(|| GPSD_SOURCE.to_owned()),
    })
}
