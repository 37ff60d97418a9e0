// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Logging daemon of the GPS logger
//!
//! Follows the gpsd report stream, keeps the [`PositionState`] current and runs the
//! [`LogPolicyEngine`] on a fixed cadence.

pub mod engine;
pub mod policy;

pub use engine::{LogPolicyEngine, TickOutcome};

use async_trait::async_trait;
use common::{clock::WallClock, position::PositionState, report::Report};
use gnss::{GpsdClient, StreamEvent};
use module_core::{EventKind, Module, ModuleCtx};
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast::error::RecvError, time::Instant};
use tracing::{error, info, warn};

pub struct GpsLogger {
    ctx: ModuleCtx,
    client: GpsdClient,
    engine: LogPolicyEngine,
    state: PositionState,
    clock: Arc<dyn WallClock>,
}

impl GpsLogger {
    pub fn new(
        ctx: ModuleCtx,
        client: GpsdClient,
        engine: LogPolicyEngine,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        GpsLogger {
            ctx,
            client,
            engine,
            state: PositionState::new(),
            clock,
        }
    }

    fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Connected => self.ctx.publish_event(EventKind::GpsdConnectedEvent),
            StreamEvent::ConnectFailed(_) | StreamEvent::ConnectionLost(_) => {
                self.ctx.publish_event(EventKind::GpsdDisconnectedEvent)
            }
            StreamEvent::Report(Report::PositionFix(fix)) => {
                self.state.apply_position_fix(&fix, self.clock.now())
            }
            StreamEvent::Report(Report::SkyView(sky)) => {
                self.state.apply_sky_view(&sky, self.clock.now())
            }
            StreamEvent::Idle => (),
        }
    }

    /// Runs one policy tick and returns the interval until the next one.
    async fn on_tick(&mut self) -> Duration {
        let outcome = self.engine.tick(&self.state).await;
        if let Some(record) = outcome.written {
            self.ctx
                .publish_event(EventKind::SampleLoggedEvent(Arc::new(record)));
        }
        if let Some(snapshot) = outcome.snapshot {
            self.ctx
                .publish_event(EventKind::StatusPublishedEvent(Arc::new(snapshot)));
        }
        outcome.settings.interval()
    }
}

#[async_trait]
impl Module for GpsLogger {
    async fn run(&mut self) -> Result<(), ()> {
        if let Err(e) = self.engine.initialize().await {
            error!(
                "Failed to initialize sample store {}. Error: {e}",
                self.engine.store().path().display()
            );
            return Err(());
        }
        info!("GPS logger started");

        let mut next_tick = Instant::now();
        loop {
            tokio::select! {
                event = self.ctx.receiver.recv() => match event {
                    Ok(event) if matches!(event.kind, EventKind::QuitEvent) => break,
                    Ok(_) => (),
                    Err(RecvError::Lagged(count)) => warn!("GPS logger missed {count} events"),
                    Err(RecvError::Closed) => break,
                },
                event = self.client.poll(Some(next_tick)) => self.on_stream_event(event),
            }

            if Instant::now() >= next_tick {
                let interval = self.on_tick().await;
                next_tick = schedule_next_tick(next_tick, interval, Instant::now());
            }
        }
        info!("GPS logger stopped");
        Ok(())
    }
}

/// Ticks stay anchored to the schedule instead of drifting with the time a tick
/// takes. A tick that overruns its interval makes the next one fire at once.
fn schedule_next_tick(scheduled: Instant, interval: Duration, now: Instant) -> Instant {
    (scheduled + interval).max(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_tick_is_anchored_to_schedule() {
        let scheduled = Instant::now();
        let interval = Duration::from_millis(500);
        let now = scheduled + Duration::from_millis(120);

        assert_eq!(
            schedule_next_tick(scheduled, interval, now),
            scheduled + interval
        );
    }

    #[test]
    fn slow_tick_fires_next_one_at_once() {
        let scheduled = Instant::now();
        let interval = Duration::from_millis(500);
        let now = scheduled + Duration::from_millis(1300);

        assert_eq!(schedule_next_tick(scheduled, interval, now), now);
    }

    #[test]
    fn tick_finishing_on_schedule_keeps_cadence() {
        let scheduled = Instant::now();
        let interval = Duration::from_secs(1);

        assert_eq!(
            schedule_next_tick(scheduled, interval, scheduled + interval),
            scheduled + interval
        );
    }
}
