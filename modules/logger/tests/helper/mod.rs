// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use common::{settings::LogSettings, test_helper::manual_clock::ManualClock};
use gnss::{GpsdClient, StreamConfig};
use logger::LogPolicyEngine;
use std::{path::Path, sync::Arc, time::Duration};
use storage::{SampleStore, StoreConfig};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

/// A gpsd stand-in that accepts one client and sends it raw report lines.
pub struct FakeGpsd {
    listener: TcpListener,
    client: Option<TcpStream>,
}

impl FakeGpsd {
    pub async fn bind() -> FakeGpsd {
        FakeGpsd {
            listener: TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind fake gpsd"),
            client: None,
        }
    }

    pub fn address(&self) -> String {
        self.listener.local_addr().unwrap().to_string()
    }

    pub async fn accept_client(&mut self) {
        let (client, _) = tokio::time::timeout(Duration::from_secs(2), self.listener.accept())
            .await
            .expect("No client connected to fake gpsd")
            .expect("Accepting client failed");
        self.client = Some(client);
    }

    pub async fn send_line(&mut self, line: &str) {
        let client = self.client.as_mut().expect("No client connected");
        client.write_all(line.as_bytes()).await.unwrap();
        client.write_all(b"\n").await.unwrap();
    }
}

/// An address nothing listens on.
pub async fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 2).unwrap()
}

pub fn create_store(dir: &Path) -> SampleStore {
    SampleStore::new(StoreConfig::new(dir.join("data/gps_logs.db")))
}

pub fn create_engine(dir: &Path, clock: &ManualClock) -> LogPolicyEngine {
    LogPolicyEngine::new(
        create_store(dir),
        dir.join("run/status.json"),
        LogSettings::default(),
        Arc::new(clock.clone()),
    )
}

pub fn create_client(address: &str) -> GpsdClient {
    GpsdClient::new(StreamConfig {
        read_timeout: Duration::from_millis(100),
        connect_backoff: Duration::from_millis(50),
        read_backoff: Duration::from_millis(50),
        ..StreamConfig::new(address)
    })
}
