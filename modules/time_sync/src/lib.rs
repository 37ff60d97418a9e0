// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Time sync daemon of the GPS logger
//!
//! Keeps the system clock within a few seconds of the receiver's time. Devices
//! without a real time clock boot with a wrong time, the logged samples carry the
//! receiver's time but everything else on the device relies on the system clock.

pub mod clock_setter;
pub mod controller;

pub use clock_setter::{ClockSetter, CorrectionOutcome, DateCommand};
pub use controller::{SyncController, SyncDecision, SyncState};

use async_trait::async_trait;
use common::{
    clock::{WallClock, format_utc},
    report::{PositionFix, Report},
    status::TimeSyncStatus,
};
use controller::{DEFAULT_CORRECTION_THRESHOLD_SEC, DEFAULT_MIN_VALID_YEAR};
use gnss::{GpsdClient, StreamEvent};
use module_core::{EventKind, Module, ModuleCtx};
use std::{path::PathBuf, sync::Arc, time::Duration};
use storage::publish::publish_json;
use tokio::{sync::broadcast::error::RecvError, time::Instant};
use tracing::{error, info, trace, warn};

#[derive(Clone, Debug)]
pub struct TimeSyncConfig {
    pub status_path: PathBuf,
    pub correction_threshold_sec: f64,
    pub min_valid_year: i32,
    /// After an in-sync result or a successful correction, fixes are read but not
    /// evaluated for this long.
    ///
    /// The daemon keeps draining the gpsd stream instead of sleeping. Fixes that
    /// arrive in the window are decoded and dropped, so no backlog of stale fixes
    /// is queued on the socket to be evaluated once the window ends. A stale fix
    /// would otherwise set the clock back.
    pub hold_off: Duration,
}

impl TimeSyncConfig {
    pub fn new(status_path: impl Into<PathBuf>) -> Self {
        TimeSyncConfig {
            status_path: status_path.into(),
            correction_threshold_sec: DEFAULT_CORRECTION_THRESHOLD_SEC,
            min_valid_year: DEFAULT_MIN_VALID_YEAR,
            hold_off: Duration::from_secs(30),
        }
    }
}

pub struct TimeSync {
    ctx: ModuleCtx,
    client: GpsdClient,
    controller: SyncController,
    clock_setter: Box<dyn ClockSetter>,
    clock: Arc<dyn WallClock>,
    status_path: PathBuf,
    hold_off: Duration,
    hold_until: Option<Instant>,
}

impl TimeSync {
    pub fn new(
        ctx: ModuleCtx,
        client: GpsdClient,
        config: TimeSyncConfig,
        clock_setter: Box<dyn ClockSetter>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        TimeSync {
            ctx,
            client,
            controller: SyncController::new(config.correction_threshold_sec, config.min_valid_year),
            clock_setter,
            clock,
            status_path: config.status_path,
            hold_off: config.hold_off,
            hold_until: None,
        }
    }

    async fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Connected => {
                self.controller.on_connected();
                self.hold_until = None;
                self.ctx.publish_event(EventKind::GpsdConnectedEvent);
            }
            StreamEvent::ConnectFailed(e) => {
                self.controller.on_disconnected();
                self.ctx.publish_event(EventKind::GpsdDisconnectedEvent);
                self.publish_status(TimeSyncStatus::connect_failed(&e)).await;
            }
            StreamEvent::ConnectionLost(e) => {
                self.controller.on_disconnected();
                self.ctx.publish_event(EventKind::GpsdDisconnectedEvent);
                self.publish_status(TimeSyncStatus::read_failed(&e)).await;
            }
            StreamEvent::Report(Report::PositionFix(fix)) => self.on_position_fix(&fix).await,
            StreamEvent::Report(Report::SkyView(_)) | StreamEvent::Idle => (),
        }
    }

    async fn on_position_fix(&mut self, fix: &PositionFix) {
        if let Some(hold_until) = self.hold_until {
            if Instant::now() < hold_until {
                trace!("Skipping fix during hold-off");
                return;
            }
            self.hold_until = None;
        }
        let Some(decision) = self.controller.evaluate(fix, self.clock.now()) else {
            return;
        };

        let status = match decision {
            SyncDecision::Correct {
                gps_time,
                drift_sec,
                epoch_sec,
            } => {
                info!(
                    "System clock is {drift_sec:.3}s off, setting it to {}",
                    format_utc(&gps_time)
                );
                let outcome = self.clock_setter.set_time(epoch_sec).await;
                self.controller.record_correction(outcome.ok);
                TimeSyncStatus::set_time(outcome.ok, &gps_time, drift_sec, outcome.message)
            }
            SyncDecision::InSync {
                gps_time,
                drift_sec,
            } => {
                self.controller.record_in_sync();
                TimeSyncStatus::in_sync(&gps_time, drift_sec)
            }
        };
        if status.ok {
            self.hold_until = Some(Instant::now() + self.hold_off);
        }
        self.publish_status(status).await;
    }

    async fn publish_status(&self, status: TimeSyncStatus) {
        if let Err(e) = publish_json(&self.status_path, &status).await {
            error!(
                "Failed to publish time sync status to {}. Error: {e}",
                self.status_path.display()
            );
        }
        self.ctx
            .publish_event(EventKind::TimeSyncStatusEvent(Arc::new(status)));
    }
}

#[async_trait]
impl Module for TimeSync {
    async fn run(&mut self) -> Result<(), ()> {
        info!("Time sync started");
        loop {
            tokio::select! {
                event = self.ctx.receiver.recv() => match event {
                    Ok(event) if matches!(event.kind, EventKind::QuitEvent) => break,
                    Ok(_) => (),
                    Err(RecvError::Lagged(count)) => warn!("Time sync missed {count} events"),
                    Err(RecvError::Closed) => break,
                },
                event = self.client.poll(None) => self.on_stream_event(event).await,
            }
        }
        info!("Time sync stopped");
        Ok(())
    }
}
