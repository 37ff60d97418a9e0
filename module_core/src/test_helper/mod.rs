// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{Event, EventBus, EventKind, EventKindType};
use tokio::{sync::broadcast::error::RecvError, time::timeout};

/// Sends a quit signal to a running module and waits for it to stop gracefully.
///
/// This function publishes a [`QuitEvent`](EventKind::QuitEvent) through the given [`EventBus`],
/// signaling the target module to terminate. It then waits for the module's task
/// to complete within a fixed timeout.
///
/// # Panics
/// This function panics if:
/// - The module does not stop within the timeout.
/// - The task returns an error (`Err(())`).
pub async fn stop_module(
    event_bus: &EventBus,
    handle: &mut tokio::task::JoinHandle<Result<(), ()>>,
) {
    event_bus.publish(&Event {
        kind: EventKind::QuitEvent,
    });
    timeout(std::time::Duration::from_millis(500), handle)
        .await
        .expect("Module doesn't handle quit event in timeout")
        .expect("Module task panicked")
        .expect("Module returned an error");
}

/// Waits asynchronously for a specific type of [`Event`] to be received on a
/// [`tokio::sync::broadcast::Receiver`] within a given duration.
///
/// The total waiting time is divided into small polling steps (each one-tenth
/// of the total duration). Events of other types are skipped.
///
/// # Panics
///
/// This function panics if no matching event is received within `duration`.
///
/// # Returns
///
/// Returns the first [`Event`] whose [`EventKind`] discriminant matches `exp_event`.
pub async fn wait_for_event(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    duration: std::time::Duration,
    exp_event: EventKindType,
) -> Event {
    let step_duration = duration / 10;
    for _ in 0..10 {
        let deadline = tokio::time::Instant::now() + step_duration;
        while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            if event.event_type() == exp_event {
                return event;
            }
        }
    }
    panic!("Failed to receive event of type {:?}", exp_event);
}

/// Collects every event of type `exp_event` that arrives within `duration`.
pub async fn collect_events(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    duration: std::time::Duration,
    exp_event: EventKindType,
) -> Vec<Event> {
    let deadline = tokio::time::Instant::now() + duration;
    let mut events = Vec::new();
    while let Ok(received) = tokio::time::timeout_at(deadline, rx.recv()).await {
        match received {
            Ok(event) if event.event_type() == exp_event => events.push(event),
            Ok(_) | Err(RecvError::Lagged(_)) => (),
            Err(RecvError::Closed) => break,
        }
    }
    events
}
