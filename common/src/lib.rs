// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Common Modul for the GPS logger
//!
//! Provides the common data types that are shared by the logging and the time sync daemon.

pub mod clock;
pub mod position;
pub mod record;
pub mod report;
pub mod settings;
pub mod status;
pub mod test_helper;
