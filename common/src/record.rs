// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{clock::format_utc, position::PositionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag of samples written by the logging daemon.
pub const GPSD_SOURCE: &str = "gpsd";

/// One persisted sample of the GPS log.
///
/// Records are append-only. The timestamp is kept as an ISO-8601 UTC string,
/// so it stays sortable and human readable for the export and rotation tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp_utc: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_m: Option<f64>,
    pub speed_mps: f64,
    pub course_deg: Option<f64>,
    pub hdop: Option<f64>,
    pub satellites: u32,
    pub fix_mode: u8,
    pub source: String,
}

impl LogRecord {
    /// Captures the current [`PositionState`] as a record.
    ///
    /// The receiver's time is used as timestamp if the state has one, `now` otherwise.
    pub fn from_state(state: &PositionState, now: &DateTime<Utc>) -> Self {
        let timestamp_utc = state
            .source_timestamp()
            .map(str::to_owned)
            .unwrap_or_else(|| format_utc(now));
        LogRecord {
            timestamp_utc,
            lat: state.latitude(),
            lon: state.longitude(),
            alt_m: state.altitude(),
            speed_mps: state.speed(),
            course_deg: state.course(),
            hdop: state.hdop(),
            satellites: state.satellites_used(),
            fix_mode: state.fix_mode(),
            source: GPSD_SOURCE.to_owned(),
        }
    }
}
