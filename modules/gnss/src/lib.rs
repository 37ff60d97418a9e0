// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! GNSS Modul for the GPS logger
//!
//! Provides the connection to the gpsd daemon and the decoding of its JSON reports.

pub mod codec;
pub mod gpsd_client;

pub use codec::ReportCodec;
pub use gpsd_client::{GpsdClient, StreamConfig, StreamEvent};
