// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::report::{PositionFix, SkyView};
use chrono::{DateTime, Utc};

/// The rolling view of the most recently observed fix data.
///
/// One instance lives for the whole process and is owned by the ingestion loop.
/// It is only changed through [`PositionState::apply_position_fix`] and
/// [`PositionState::apply_sky_view`]. Both merge the fields their report kind
/// carries into the state and leave everything else untouched, so a fix is never
/// cleared because the connection to gpsd dropped, only superseded by a newer report.
///
/// # Fields
///
/// - `latitude`, `longitude` – decimal degrees, absent until the first fix that carries them.
/// - `altitude` – meters, absent until reported.
/// - `speed` – meters per second, defaults to `0.0`.
/// - `course` – degrees.
/// - `fix_mode` – `0`/`1` no fix, `2` 2D fix, `3` 3D fix.
/// - `hdop` – horizontal dilution of precision, lower is better.
/// - `satellites_used` – satellites used in the solution.
/// - `last_seen_at` – local time of the last decoded report.
/// - `source_timestamp` – the receiver's time string of the last `TPV` report that had one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionState {
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    speed: f64,
    course: Option<f64>,
    fix_mode: u8,
    hdop: Option<f64>,
    satellites_used: u32,
    last_seen_at: Option<DateTime<Utc>>,
    source_timestamp: Option<String>,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a `TPV` report into the state.
    ///
    /// Fix mode and speed are always taken from the report (defaulting to `0`).
    /// Position, altitude, course and time only replace the stored values if the
    /// report carries them.
    pub fn apply_position_fix(&mut self, fix: &PositionFix, seen_at: DateTime<Utc>) {
        self.fix_mode = fix.fix_mode();
        self.speed = fix.speed_mps();
        if let Some(lat) = fix.lat {
            self.latitude = Some(lat);
        }
        if let Some(lon) = fix.lon {
            self.longitude = Some(lon);
        }
        if let Some(alt) = fix.alt {
            self.altitude = Some(alt);
        }
        if let Some(track) = fix.track {
            self.course = Some(track);
        }
        if let Some(time) = fix.timestamp() {
            self.source_timestamp = Some(time.to_owned());
        }
        self.last_seen_at = Some(seen_at);
    }

    /// Merges a `SKY` report into the state.
    pub fn apply_sky_view(&mut self, sky: &SkyView, seen_at: DateTime<Utc>) {
        if let Some(hdop) = sky.hdop {
            self.hdop = Some(hdop);
        }
        if let Some(used) = sky.used_satellites() {
            self.satellites_used = used;
        }
        self.last_seen_at = Some(seen_at);
    }

    /// Whether the receiver reports a 2D or 3D fix.
    pub fn has_usable_fix(&self) -> bool {
        self.fix_mode >= 2
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn course(&self) -> Option<f64> {
        self.course
    }

    pub fn fix_mode(&self) -> u8 {
        self.fix_mode
    }

    pub fn hdop(&self) -> Option<f64> {
        self.hdop
    }

    pub fn satellites_used(&self) -> u32 {
        self.satellites_used
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }

    pub fn source_timestamp(&self) -> Option<&str> {
        self.source_timestamp.as_deref()
    }
}
