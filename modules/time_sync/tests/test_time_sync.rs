// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{DateTime, TimeZone, Utc};
use common::{
    status::{TimeSyncDetail, TimeSyncStatus},
    test_helper::manual_clock::ManualClock,
};
use gnss::{GpsdClient, StreamConfig};
use module_core::{
    EventBus, EventKind, EventKindType, Module, payload_ref,
    test_helper::{collect_events, stop_module, wait_for_event},
};
use std::{path::Path, sync::Arc, time::Duration};
use time_sync::{TimeSync, TimeSyncConfig};
use tokio::net::TcpListener;

mod helper;
use helper::{FakeGpsd, RecordingSetter};

const FIX: &str = r#"{"class":"TPV","mode":3,"lat":52.5,"lon":13.4,"time":"2024-01-01T00:00:05.000Z"}"#;

fn local_time(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap()
}

fn start_time_sync(
    eb: &EventBus,
    address: &str,
    dir: &Path,
    setter: &RecordingSetter,
    clock: &ManualClock,
    hold_off: Duration,
) -> tokio::task::JoinHandle<Result<(), ()>> {
    let client = GpsdClient::new(StreamConfig {
        read_timeout: Duration::from_millis(100),
        connect_backoff: Duration::from_millis(50),
        read_backoff: Duration::from_millis(50),
        ..StreamConfig::new(address)
    });
    let config = TimeSyncConfig {
        hold_off,
        ..TimeSyncConfig::new(dir.join("time-sync-status.json"))
    };
    let mut module = TimeSync::new(
        eb.context(),
        client,
        config,
        Box::new(setter.clone()),
        Arc::new(clock.clone()),
    );
    tokio::spawn(async move { module.run().await })
}

fn read_status(dir: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(dir.join("time-sync-status.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

async fn next_status(rx: &mut tokio::sync::broadcast::Receiver<module_core::Event>) -> TimeSyncStatus {
    let event = wait_for_event(rx, Duration::from_secs(2), EventKindType::TimeSyncStatusEvent).await;
    let status = payload_ref!(event.kind, EventKind::TimeSyncStatusEvent).unwrap();
    TimeSyncStatus::clone(status)
}

#[test_log::test(tokio::test)]
async fn correct_clock_with_drift() {
    let dir = tempfile::tempdir().unwrap();
    let setter = RecordingSetter::new(true);
    let clock = ManualClock::new(local_time(2));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut gpsd = FakeGpsd::bind().await;
    let mut handle = start_time_sync(
        &eb,
        &gpsd.address(),
        dir.path(),
        &setter,
        &clock,
        Duration::from_secs(30),
    );
    gpsd.accept_client().await;
    gpsd.send_line(FIX).await;

    let status = next_status(&mut rx).await;
    assert!(status.ok);
    assert_eq!(
        status.detail,
        TimeSyncDetail::SetTime {
            gps_time_utc: "2024-01-01T00:00:05.000Z".to_owned(),
            drift_sec_before_set: 3.0,
            message: "Mon Jan  1 00:00:05 UTC 2024".to_owned(),
        }
    );
    assert_eq!(setter.requests(), vec![1704067205]);
    stop_module(&eb, &mut handle).await;

    let json = read_status(dir.path());
    assert_eq!(json["ok"], true);
    assert_eq!(json["state"], "set_time");
    assert_eq!(json["drift_sec_before_set"], 3.0);
}

#[test_log::test(tokio::test)]
async fn small_drift_is_reported_in_sync() {
    let dir = tempfile::tempdir().unwrap();
    let setter = RecordingSetter::new(true);
    let clock = ManualClock::new(local_time(4));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut gpsd = FakeGpsd::bind().await;
    let mut handle = start_time_sync(
        &eb,
        &gpsd.address(),
        dir.path(),
        &setter,
        &clock,
        Duration::from_secs(30),
    );
    gpsd.accept_client().await;
    gpsd.send_line(FIX).await;

    let status = next_status(&mut rx).await;
    assert!(status.ok);
    assert!(matches!(status.detail, TimeSyncDetail::InSync { drift_sec, .. } if drift_sec == 1.0));
    assert!(setter.requests().is_empty());
    stop_module(&eb, &mut handle).await;
    assert_eq!(read_status(dir.path())["state"], "in_sync");
}

#[test_log::test(tokio::test)]
async fn untrusted_fixes_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let setter = RecordingSetter::new(true);
    let clock = ManualClock::new(local_time(2));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut gpsd = FakeGpsd::bind().await;
    let mut handle = start_time_sync(
        &eb,
        &gpsd.address(),
        dir.path(),
        &setter,
        &clock,
        Duration::from_secs(30),
    );
    gpsd.accept_client().await;
    gpsd.send_line(r#"{"class":"TPV","mode":1,"time":"2024-01-01T00:00:05.000Z"}"#).await;
    gpsd.send_line(r#"{"class":"TPV","mode":3,"time":"2019-06-01T00:00:05.000Z"}"#).await;
    gpsd.send_line(r#"{"class":"TPV","mode":3}"#).await;
    gpsd.send_line(r#"{"class":"SKY","hdop":1.0}"#).await;
    gpsd.send_line("garbage").await;

    let events = collect_events(
        &mut rx,
        Duration::from_millis(300),
        EventKindType::TimeSyncStatusEvent,
    )
    .await;
    assert!(events.is_empty());
    assert!(setter.requests().is_empty());
    stop_module(&eb, &mut handle).await;
}

#[test_log::test(tokio::test)]
async fn fixes_during_hold_off_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let setter = RecordingSetter::new(true);
    let clock = ManualClock::new(local_time(2));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut gpsd = FakeGpsd::bind().await;
    let mut handle = start_time_sync(
        &eb,
        &gpsd.address(),
        dir.path(),
        &setter,
        &clock,
        Duration::from_millis(400),
    );
    gpsd.accept_client().await;
    gpsd.send_line(FIX).await;
    next_status(&mut rx).await;

    gpsd.send_line(FIX).await;
    gpsd.send_line(FIX).await;
    let events = collect_events(
        &mut rx,
        Duration::from_millis(200),
        EventKindType::TimeSyncStatusEvent,
    )
    .await;
    assert!(events.is_empty());
    assert_eq!(setter.requests().len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    gpsd.send_line(FIX).await;
    next_status(&mut rx).await;
    assert_eq!(setter.requests().len(), 2);
    stop_module(&eb, &mut handle).await;
}

#[test_log::test(tokio::test)]
async fn failed_correction_is_retried_on_next_fix() {
    let dir = tempfile::tempdir().unwrap();
    let setter = RecordingSetter::new(false);
    let clock = ManualClock::new(local_time(2));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut gpsd = FakeGpsd::bind().await;
    let mut handle = start_time_sync(
        &eb,
        &gpsd.address(),
        dir.path(),
        &setter,
        &clock,
        Duration::from_secs(30),
    );
    gpsd.accept_client().await;
    gpsd.send_line(FIX).await;
    let status = next_status(&mut rx).await;
    assert!(!status.ok);
    assert!(matches!(
        status.detail,
        TimeSyncDetail::SetTime { ref message, .. } if message.contains("not permitted")
    ));

    gpsd.send_line(FIX).await;
    let status = next_status(&mut rx).await;
    assert!(!status.ok);
    assert_eq!(setter.requests(), vec![1704067205, 1704067205]);
    stop_module(&eb, &mut handle).await;
    assert_eq!(read_status(dir.path())["ok"], false);
}

#[test_log::test(tokio::test)]
async fn unreachable_gpsd_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let setter = RecordingSetter::new(true);
    let clock = ManualClock::new(local_time(2));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut handle = start_time_sync(
        &eb,
        &address,
        dir.path(),
        &setter,
        &clock,
        Duration::from_secs(30),
    );

    let status = next_status(&mut rx).await;
    assert!(!status.ok);
    assert!(matches!(status.detail, TimeSyncDetail::GpsdConnectFailed { .. }));
    // connecting is retried
    next_status(&mut rx).await;
    stop_module(&eb, &mut handle).await;
    assert_eq!(read_status(dir.path())["state"], "gpsd_connect_failed");
}

#[test_log::test(tokio::test)]
async fn closed_stream_is_reported_and_reconnected() {
    let dir = tempfile::tempdir().unwrap();
    let setter = RecordingSetter::new(true);
    let clock = ManualClock::new(local_time(2));
    let eb = EventBus::default();
    let mut rx = eb.subscribe();
    let mut gpsd = FakeGpsd::bind().await;
    let mut handle = start_time_sync(
        &eb,
        &gpsd.address(),
        dir.path(),
        &setter,
        &clock,
        Duration::from_secs(30),
    );
    gpsd.accept_client().await;
    wait_for_event(&mut rx, Duration::from_secs(1), EventKindType::GpsdConnectedEvent).await;
    gpsd.drop_client();

    let status = next_status(&mut rx).await;
    assert!(!status.ok);
    assert!(matches!(status.detail, TimeSyncDetail::GpsdReadFailed { .. }));

    gpsd.accept_client().await;
    gpsd.send_line(FIX).await;
    let status = next_status(&mut rx).await;
    assert!(matches!(status.detail, TimeSyncDetail::SetTime { .. }));
    stop_module(&eb, &mut handle).await;
}
