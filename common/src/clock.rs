// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{DateTime, SecondsFormat, Utc};

/// A source of the current wall-clock time in UTC.
///
/// The daemons never call [`Utc::now`] directly. Every component that needs
/// the wall clock gets a [`WallClock`] at construction, so tests can pin the
/// local time and the time sync decision logic can be checked without
/// touching the real system clock.
pub trait WallClock: Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// A [`WallClock`] implementation that reads the system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Formats a timestamp the way gpsd reports time: `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Locally generated timestamps use the same shape as the receiver's ones so that
/// both sort lexically in the sample table.
pub fn format_utc(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an ISO-8601 / RFC 3339 timestamp as reported by gpsd.
///
/// Returns `None` for empty or malformed input.
pub fn parse_utc(time: &str) -> Option<DateTime<Utc>> {
    if time.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(time)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
