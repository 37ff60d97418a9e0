// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use time_sync::{ClockSetter, CorrectionOutcome};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

/// A gpsd stand-in that accepts clients and sends them raw report lines.
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

    pub fn drop_client(&mut self) {
        self.client = None;
    }
}

/// A [`ClockSetter`] that records the requested times instead of touching the clock.
#[derive(Clone)]
pub struct RecordingSetter {
    requests: Arc<Mutex<Vec<i64>>>,
    ok: bool,
}

impl RecordingSetter {
    pub fn new(ok: bool) -> Self {
        RecordingSetter {
            requests: Arc::new(Mutex::new(Vec::new())),
            ok,
        }
    }

    pub fn requests(&self) -> Vec<i64> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClockSetter for RecordingSetter {
    async fn set_time(&mut self, epoch_sec: i64) -> CorrectionOutcome {
        self.requests.lock().unwrap().push(epoch_sec);
        CorrectionOutcome {
            ok: self.ok,
            message: if self.ok {
                "Mon Jan  1 00:00:05 UTC 2024".to_owned()
            } else {
                "date: cannot set date: Operation not permitted".to_owned()
            },
        }
    }
}
