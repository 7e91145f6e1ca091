//! Cancellable timers driving the round: the mole spawn chain and the round expiry
//!
//! Both timers run as detached tokio tasks and report back through a callback,
//! which in the server pushes a generation-tagged message into the event loop.
//! Cancellation is signalled over a `watch` channel that the task checks before
//! sleeping again and before every emission.

use crate::config::Cadence;
use log::debug;
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Handle to one running timer task
struct Cancellation {
    signal: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Cancellation {
    fn cancel(self) {
        let _ = self.signal.send(true);
        self.handle.abort();
    }
}

/// Waits for `delay` unless cancelled first. Returns true when the caller may proceed.
async fn wait_or_cancel(delay: Duration, cancelled: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        // An error here means the scheduler itself was dropped
        _ = cancelled.changed() => false,
        _ = sleep(delay) => !*cancelled.borrow(),
    }
}

/// Draws a fresh delay uniformly from `[cadence.min, cadence.max]`
pub fn random_delay(cadence: Cadence) -> Duration {
    let min = cadence.min.as_millis() as u64;
    let max = cadence.max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min..=max.max(min)))
}

/// Self-rescheduling spawn ticker with a jittered interval
///
/// Every tick re-draws its delay from the cadence, so this is a chain of
/// one-shot sleeps rather than a fixed-rate interval.
#[derive(Default)]
pub struct SpawnScheduler {
    running: Option<Cancellation>,
}

impl SpawnScheduler {
    pub fn new() -> Self {
        Self { running: None }
    }

    /// Starts ticking, replacing any chain that was already running
    pub fn start<F>(&mut self, cadence: Cadence, mut on_spawn: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();

        let (signal, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                let delay = random_delay(cadence);
                if !wait_or_cancel(delay, &mut cancelled).await {
                    break;
                }
                on_spawn();
            }
            debug!("Spawn chain finished");
        });

        self.running = Some(Cancellation { signal, handle });
    }

    /// Stops the chain; no tick is emitted by this chain once this returns
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for SpawnScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One-shot deferred action used for the round and overtime expiry
#[derive(Default)]
pub struct RoundTimer {
    armed: Option<Cancellation>,
}

impl RoundTimer {
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Fires `on_expire` once after `after`, replacing any pending expiry
    pub fn arm<F>(&mut self, after: Duration, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let (signal, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            if wait_or_cancel(after, &mut cancelled).await {
                on_expire();
            }
        });

        self.armed = Some(Cancellation { signal, handle });
    }

    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.as_ref().map_or(false, |armed| !armed.handle.is_finished())
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
