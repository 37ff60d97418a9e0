// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{clock::format_utc, position::PositionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which clock the `timestamp_utc` of a [`StatusSnapshot`] comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// The receiver reported a time, it is authoritative.
    Gps,
    /// No receiver time known yet, the local clock is used.
    System,
}

/// The latest known state of the logger, published for external readers.
///
/// The snapshot is never stored in the database. It is rewritten on every tick of
/// the logging daemon, independent of whether a sample was persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub timestamp_utc: String,
    pub timestamp_source: TimestampSource,
    pub system_timestamp_utc: String,
    pub fix_mode: u8,
    pub satellites: u32,
    pub hdop: Option<f64>,
    pub speed_mps: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_m: Option<f64>,
    pub course_deg: Option<f64>,
    /// Free bytes on the file system of the database, `None` if the check failed.
    pub disk_free_bytes: Option<u64>,
    pub last_seen_utc: Option<String>,
}

impl StatusSnapshot {
    pub fn from_state(state: &PositionState, disk_free_bytes: Option<u64>, now: &DateTime<Utc>) -> Self {
        let system_timestamp_utc = format_utc(now);
        let (timestamp_utc, timestamp_source) = match state.source_timestamp() {
            Some(time) => (time.to_owned(), TimestampSource::Gps),
            None => (system_timestamp_utc.clone(), TimestampSource::System),
        };
        StatusSnapshot {
            timestamp_utc,
            timestamp_source,
            system_timestamp_utc,
            fix_mode: state.fix_mode(),
            satellites: state.satellites_used(),
            hdop: state.hdop(),
            speed_mps: state.speed(),
            lat: state.latitude(),
            lon: state.longitude(),
            alt_m: state.altitude(),
            course_deg: state.course(),
            disk_free_bytes,
            last_seen_utc: state.last_seen_at().as_ref().map(format_utc),
        }
    }
}

/// The published state of the time sync daemon.
///
/// Serialized as one flat JSON object, e.g.
/// `{"ok":true,"state":"in_sync","gps_time_utc":"...","drift_sec":0.4}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSyncStatus {
    pub ok: bool,
    #[serde(flatten)]
    pub detail: TimeSyncDetail,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimeSyncDetail {
    GpsdConnectFailed {
        error: String,
    },
    GpsdReadFailed {
        error: String,
    },
    SetTime {
        gps_time_utc: String,
        drift_sec_before_set: f64,
        message: String,
    },
    InSync {
        gps_time_utc: String,
        drift_sec: f64,
    },
}

impl TimeSyncStatus {
    pub fn connect_failed(error: &std::io::Error) -> Self {
        TimeSyncStatus {
            ok: false,
            detail: TimeSyncDetail::GpsdConnectFailed {
                error: error.to_string(),
            },
        }
    }

    pub fn read_failed(error: &std::io::Error) -> Self {
        TimeSyncStatus {
            ok: false,
            detail: TimeSyncDetail::GpsdReadFailed {
                error: error.to_string(),
            },
        }
    }

    pub fn set_time(ok: bool, gps_time: &DateTime<Utc>, drift_sec: f64, message: String) -> Self {
        TimeSyncStatus {
            ok,
            detail: TimeSyncDetail::SetTime {
                gps_time_utc: format_utc(gps_time),
                drift_sec_before_set: drift_sec,
                message,
            },
        }
    }

    pub fn in_sync(gps_time: &DateTime<Utc>, drift_sec: f64) -> Self {
        TimeSyncStatus {
            ok: true,
            detail: TimeSyncDetail::InSync {
                gps_time_utc: format_utc(gps_time),
                drift_sec,
            },
        }
    }
}
