// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::{position::PositionState, settings::LogSettings};

/// Decides whether the current [`PositionState`] is written as a sample.
///
/// See [`qualifies`] for the rule.
pub fn should_write(state: &PositionState, settings: &LogSettings) -> bool {
    qualifies(
        state.fix_mode(),
        state.latitude(),
        state.longitude(),
        state.hdop(),
        state.speed(),
        settings,
    )
}

/// The write-qualification predicate.
///
/// A sample qualifies only with a 2D or 3D fix, a known latitude and longitude,
/// a known HDOP not above `settings.max_hdop` and a speed of at least
/// `settings.min_speed_mps`. Failing any condition suppresses the write.
pub fn qualifies(
    fix_mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    hdop: Option<f64>,
    speed_mps: f64,
    settings: &LogSettings,
) -> bool {
    fix_mode >= 2
        && lat.is_some()
        && lon.is_some()
        && hdop.is_some_and(|hdop| hdop <= settings.max_hdop)
        && speed_mps >= settings.min_speed_mps
}
