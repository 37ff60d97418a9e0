// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use serde::Serialize;
use storage::publish::{publish_json, write_atomic};

#[derive(Serialize)]
struct Status {
    ok: bool,
    speed_mps: f64,
}

#[test_log::test(tokio::test)]
async fn publish_creates_directory_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run/gps/status.json");
    publish_json(&path, &Status { ok: true, speed_mps: 1.5 })
        .await
        .expect("Failed to publish status");

    let content = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["speed_mps"], 1.5);
    assert!(!dir.path().join("run/gps/status.json.tmp").exists());
}

#[test_log::test(tokio::test)]
async fn publish_replaces_previous_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");
    write_atomic(&path, b"a much longer previous document").await.unwrap();
    publish_json(&path, &Status { ok: false, speed_mps: 0.0 })
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        r#"{"ok":false,"speed_mps":0.0}"#
    );
}

#[test_log::test(tokio::test)]
async fn failed_publish_keeps_previous_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");
    write_atomic(&path, b"{}").await.unwrap();
    // a directory in place of the temporary file makes the write fail
    std::fs::create_dir(dir.path().join("status.json.tmp")).unwrap();

    assert!(write_atomic(&path, b"{\"ok\":true}").await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
}
