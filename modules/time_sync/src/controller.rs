// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{DateTime, Datelike, Utc};
use common::{clock::parse_utc, report::PositionFix};
use tracing::{debug, info};

/// Drift in seconds above which the system clock is corrected.
pub const DEFAULT_CORRECTION_THRESHOLD_SEC: f64 = 2.0;
/// Receiver times before this year are treated as a broken receiver clock.
pub const DEFAULT_MIN_VALID_YEAR: i32 = 2020;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    AwaitingFix,
    Synced,
}

/// What to do about an accepted fix.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncDecision {
    /// Set the system clock to `epoch_sec`, the fix time truncated to the second.
    Correct {
        gps_time: DateTime<Utc>,
        drift_sec: f64,
        epoch_sec: i64,
    },
    /// The drift is within the threshold, nothing to do.
    InSync {
        gps_time: DateTime<Utc>,
        drift_sec: f64,
    },
}

/// Decides when the system clock has to follow the receiver's time.
///
/// ```text
/// Disconnected --connected--> AwaitingFix --accepted fix--> Synced
///       ^                          |                          |
///       +--------socket error------+--------------------------+
/// ```
///
/// A failed correction leaves the state as it is, the next accepted fix retries it.
#[derive(Debug)]
pub struct SyncController {
    state: SyncState,
    correction_threshold_sec: f64,
    min_valid_year: i32,
}

impl SyncController {
    pub fn new(correction_threshold_sec: f64, min_valid_year: i32) -> Self {
        SyncController {
            state: SyncState::Disconnected,
            correction_threshold_sec,
            min_valid_year,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn on_connected(&mut self) {
        if self.state == SyncState::Disconnected {
            self.set_state(SyncState::AwaitingFix);
        }
    }

    pub fn on_disconnected(&mut self) {
        self.set_state(SyncState::Disconnected);
    }

    /// Compares the time of `fix` with the local wall clock `now`.
    ///
    /// Returns `None` for fixes that can not be trusted: mode below 2D, no or an
    /// unparsable time, or a year before the minimum valid year.
    pub fn evaluate(&self, fix: &PositionFix, now: DateTime<Utc>) -> Option<SyncDecision> {
        if fix.fix_mode() < 2 {
            return None;
        }
        let gps_time = fix.timestamp().and_then(parse_utc)?;
        if gps_time.year() < self.min_valid_year {
            debug!("Ignoring fix with implausible time {gps_time}");
            return None;
        }

        let drift_sec = (gps_time - now).num_milliseconds().abs() as f64 / 1000.0;
        if drift_sec > self.correction_threshold_sec {
            Some(SyncDecision::Correct {
                gps_time,
                drift_sec,
                epoch_sec: gps_time.timestamp(),
            })
        } else {
            Some(SyncDecision::InSync {
                gps_time,
                drift_sec,
            })
        }
    }

    pub fn record_correction(&mut self, ok: bool) {
        if ok {
            self.set_state(SyncState::Synced);
        }
    }

    pub fn record_in_sync(&mut self) {
        self.set_state(SyncState::Synced);
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state != state {
            info!("Time sync state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new(DEFAULT_CORRECTION_THRESHOLD_SEC, DEFAULT_MIN_VALID_YEAR)
    }
}
