// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use std::time::Duration;

/// Settings key of the logging cadence in seconds.
pub const LOG_INTERVAL_SEC: &str = "log_interval_sec";
/// Settings key of the minimum speed in m/s a sample needs to be written.
pub const MIN_SPEED_WRITE_MPS: &str = "min_speed_write_mps";
/// Settings key of the maximum HDOP a sample may have to be written.
pub const MAX_HDOP_FOR_LOG: &str = "max_hdop_for_log";

/// Lowest accepted logging interval in seconds.
pub const INTERVAL_FLOOR_SEC: f64 = 0.5;
/// Lowest accepted minimum speed in m/s.
pub const MIN_SPEED_FLOOR_MPS: f64 = 0.0;
/// Lowest accepted HDOP limit.
pub const MAX_HDOP_FLOOR: f64 = 0.5;

/// The tunable logging policy.
///
/// Values come from the settings table and are re-read on every tick.
/// [`LogSettings::clamped`] applies the safety floors so a bad value can neither
/// turn the loop into a busy loop nor disable the quality filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogSettings {
    pub interval_sec: f64,
    pub min_speed_mps: f64,
    pub max_hdop: f64,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            interval_sec: 1.0,
            min_speed_mps: 0.8,
            max_hdop: 3.0,
        }
    }
}

impl LogSettings {
    pub fn clamped(&self) -> Self {
        LogSettings {
            interval_sec: self.interval_sec.max(INTERVAL_FLOOR_SEC),
            min_speed_mps: self.min_speed_mps.max(MIN_SPEED_FLOOR_MPS),
            max_hdop: self.max_hdop.max(MAX_HDOP_FLOOR),
        }
    }

    /// The interval as [`Duration`], never shorter than the floor.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_sec.max(INTERVAL_FLOOR_SEC))
            .unwrap_or(Duration::from_secs_f64(INTERVAL_FLOOR_SEC))
    }

    /// The settings as key/value pairs in their stored string form.
    pub fn entries(&self) -> [(&'static str, String); 3] {
        [
            (LOG_INTERVAL_SEC, self.interval_sec.to_string()),
            (MIN_SPEED_WRITE_MPS, self.min_speed_mps.to_string()),
            (MAX_HDOP_FOR_LOG, self.max_hdop.to_string()),
        ]
    }
}
