// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::policy::should_write;
use common::{
    clock::WallClock,
    position::PositionState,
    record::LogRecord,
    settings::{LOG_INTERVAL_SEC, LogSettings, MAX_HDOP_FOR_LOG, MIN_SPEED_WRITE_MPS},
    status::StatusSnapshot,
};
use std::{path::PathBuf, sync::Arc};
use storage::{SampleStore, StoreError, disk::available_bytes, publish::publish_json};
use tracing::{debug, error, warn};

/// What one tick of the [`LogPolicyEngine`] did.
#[derive(Clone, Debug, PartialEq)]
pub struct TickOutcome {
    /// The clamped settings the tick was evaluated with.
    pub settings: LogSettings,
    /// The appended record, `None` if the state did not qualify or the append failed.
    pub written: Option<LogRecord>,
    /// The published snapshot, `None` if publishing failed.
    pub snapshot: Option<StatusSnapshot>,
}

/// Applies the logging policy to the [`PositionState`] once per tick.
///
/// The settings are re-read from the store on every tick, so an operator can
/// retune the logger through the settings table while it runs. Every tick
/// publishes a status snapshot, whether a sample was written or not.
pub struct LogPolicyEngine {
    store: SampleStore,
    status_path: PathBuf,
    defaults: LogSettings,
    clock: Arc<dyn WallClock>,
}

impl LogPolicyEngine {
    pub fn new(
        store: SampleStore,
        status_path: impl Into<PathBuf>,
        defaults: LogSettings,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        LogPolicyEngine {
            store,
            status_path: status_path.into(),
            defaults,
            clock,
        }
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Creates the schema and seeds the default settings.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let store = self.store.clone();
        let defaults = self.defaults;
        run_blocking(move || store.init(&defaults)).await
    }

    /// Reads the current settings and applies the safety floors.
    ///
    /// Falls back to the defaults if the store can not be read.
    pub async fn resolve_settings(&self) -> LogSettings {
        let store = self.store.clone();
        let defaults = self.defaults;
        match run_blocking(move || read_settings(&store, &defaults)).await {
            Ok(settings) => settings.clamped(),
            Err(e) => {
                warn!("Failed to read settings, using defaults. Error: {e}");
                defaults.clamped()
            }
        }
    }

    pub async fn tick(&self, state: &PositionState) -> TickOutcome {
        let settings = self.resolve_settings().await;
        let now = self.clock.now();

        let written = if should_write(state, &settings) {
            let record = LogRecord::from_state(state, &now);
            let store = self.store.clone();
            let pending = record.clone();
            match run_blocking(move || store.append_sample(&pending)).await {
                Ok(id) => {
                    debug!("Logged sample {id} at {}", record.timestamp_utc);
                    Some(record)
                }
                Err(e) => {
                    error!("Failed to append sample. Error: {e}");
                    None
                }
            }
        } else {
            None
        };

        let disk_free_bytes = match available_bytes(&self.store.data_dir()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to read free disk space. Error: {e}");
                None
            }
        };
        let snapshot = StatusSnapshot::from_state(state, disk_free_bytes, &now);
        let snapshot = match publish_json(&self.status_path, &snapshot).await {
            Ok(()) => Some(snapshot),
            Err(e) => {
                error!(
                    "Failed to publish status to {}. Error: {e}",
                    self.status_path.display()
                );
                None
            }
        };

        TickOutcome {
            settings,
            written,
            snapshot,
        }
    }
}

fn read_settings(store: &SampleStore, defaults: &LogSettings) -> Result<LogSettings, StoreError> {
    Ok(LogSettings {
        interval_sec: read_finite(store, LOG_INTERVAL_SEC, defaults.interval_sec)?,
        min_speed_mps: read_finite(store, MIN_SPEED_WRITE_MPS, defaults.min_speed_mps)?,
        max_hdop: read_finite(store, MAX_HDOP_FOR_LOG, defaults.max_hdop)?,
    })
}

/// `NaN` and infinities parse as `f64` but would break the clamping.
fn read_finite(store: &SampleStore, key: &str, default: f64) -> Result<f64, StoreError> {
    let value = store.read_setting(key, default)?;
    if value.is_finite() {
        Ok(value)
    } else {
        debug!("Setting {key} is not finite, using default {default}");
        Ok(default)
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
