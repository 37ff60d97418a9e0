// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use serde::Deserialize;

/// A decoded gpsd report of a kind the daemons understand.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    /// A `TPV` (time-position-velocity) report.
    PositionFix(PositionFix),
    /// A `SKY` report with dilution and satellite information.
    SkyView(SkyView),
}

/// Payload of a gpsd `TPV` report.
///
/// Every numeric field is optional on the wire. An absent field stays `None`
/// here; the defaults for mode and speed are applied by the accessors.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PositionFix {
    pub mode: Option<u8>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    /// Speed over ground in meters per second.
    pub speed: Option<f64>,
    /// Course over ground in degrees.
    pub track: Option<f64>,
    pub time: Option<String>,
}

impl PositionFix {
    /// Fix mode, `0` if the report carries none.
    pub fn fix_mode(&self) -> u8 {
        self.mode.unwrap_or(0)
    }

    /// Speed in meters per second, `0.0` if the report carries none.
    pub fn speed_mps(&self) -> f64 {
        self.speed.unwrap_or(0.0)
    }

    /// The reported time string, if present and not empty.
    pub fn timestamp(&self) -> Option<&str> {
        self.time.as_deref().filter(|t| !t.is_empty())
    }
}

/// Payload of a gpsd `SKY` report.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SkyView {
    pub hdop: Option<f64>,
    pub satellites: Option<Vec<Satellite>>,
}

impl SkyView {
    /// Number of satellites flagged as used in the solution.
    ///
    /// Returns `None` if the report has no satellite list at all.
    pub fn used_satellites(&self) -> Option<u32> {
        self.satellites
            .as_ref()
            .map(|sats| sats.iter().filter(|s| s.used.unwrap_or(false)).count() as u32)
    }
}

/// A tracked satellite of a `SKY` report. Only the `used` flag is of interest.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Satellite {
    pub used: Option<bool>,
}
