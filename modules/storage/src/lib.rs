// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Storage Modul for the GPS logger
//!
//! Provides the SQLite backed sample log and settings table, the free space check of
//! the data directory and the atomic publishing of status files.

pub mod disk;
pub mod publish;
pub mod store;

pub use store::{SampleStore, Setting, StoreConfig, StoreError};
