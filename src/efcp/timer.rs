// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Cancellable, resettable timers for DTP/DTCP's A, R, tr and rendezvous
//! timers. Each is a `tokio::time::sleep` behind a generation counter:
//! arming bumps the generation and spawns a task that sleeps, then fires
//! only if its captured generation is still current. Cancelling (or
//! re-arming) just bumps the generation again, so a stale wakeup finds
//! itself superseded and exits without side effects — the async
//! equivalent of "stopping an inactive timer is a no-op".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

/// One generation-guarded timer. `fire` events are delivered over an
/// mpsc channel rather than an arbitrary callback, so the owner decides
/// how (and on what executor) to react.
#[derive(Debug)]
pub struct Timer {
    generation: Arc<AtomicU64>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Arms the timer for `duration`. Any previously armed sleep is
    /// implicitly cancelled (its generation is now stale). When the
    /// duration elapses without a further `arm`/`cancel`, `on_fire` is
    /// sent through `fired`.
    pub fn arm(&self, duration: Duration, fired: mpsc::Sender<()>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = Arc::clone(&self.generation);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if guard.load(Ordering::SeqCst) == generation {
                let _ = fired.send(()).await;
            }
        });
    }

    /// Cancels any in-flight sleep. A no-op if nothing was armed.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_duration_elapses() {
        let timer = Timer::new();
        let (tx, mut rx) = mpsc::channel(1);
        timer.arm(Duration::from_millis(5), tx);
        rx.recv().await.expect("timer should fire");
    }

    #[tokio::test]
    async fn cancel_suppresses_a_pending_fire() {
        let timer = Timer::new();
        let (tx, mut rx) = mpsc::channel(1);
        timer.arm(Duration::from_millis(20), tx);
        timer.cancel();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn re_arming_supersedes_the_previous_sleep() {
        let timer = Timer::new();
        let (tx, mut rx) = mpsc::channel(2);
        timer.arm(Duration::from_millis(50), tx.clone());
        timer.arm(Duration::from_millis(5), tx);
        rx.recv().await.expect("second arm should fire first");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err(), "first arm's sleep must not fire after being superseded");
    }
}
