/// Exponential backoff state and the shared cancellation flag
use std::fmt::Display;
use std::sync::Arc;

use log::warn;
use tokio::sync::watch;
use tokio::time::Duration;

/// Shared "reconnect enabled" switch
///
/// Checked before every connection attempt. Clearing it also wakes anyone
/// waiting in [`ReconnectFlag::cleared`], which is how a pending backoff wait
/// gets cut short.
#[derive(Debug, Clone)]
pub struct ReconnectFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl ReconnectFlag {
    pub fn new(enabled: bool) -> Self {
        let (tx, _rx) = watch::channel(enabled);
        ReconnectFlag { tx: Arc::new(tx) }
    }

    pub fn is_enabled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn enable(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves once the flag is (or already was) cleared
    pub async fn cleared(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(|enabled| !*enabled).await;
    }
}

/// Retry schedule: `max_retries` retries after the first attempt, delays doubling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        BackoffPolicy {
            max_retries,
            initial_delay,
        }
    }

    /// Fresh retry state for one connection cycle
    pub fn start(&self) -> Backoff {
        Backoff {
            retries_left: self.max_retries,
            delay: self.initial_delay,
        }
    }
}

/// Progress through one retry cycle
///
/// The caller owns the timer: after a failed attempt it asks
/// [`Backoff::on_failure`] how long to wait and schedules the next attempt
/// itself. Cycles never share state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    retries_left: u32,
    delay: Duration,
}

impl Backoff {
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Record a failed attempt
    ///
    /// Returns the delay before the next attempt, or `None` when no retries
    /// are left. The delay doubles after every scheduled retry, without a cap.
    pub fn on_failure(&mut self, error: &impl Display) -> Option<Duration> {
        if self.retries_left == 0 {
            return None;
        }

        let delay = self.delay;
        warn!(
            "Retrying in {}s... ({} tries left) error: {}",
            delay.as_secs_f64(),
            self.retries_left,
            error
        );

        self.retries_left -= 1;
        self.delay = self.delay.saturating_mul(2);
        Some(delay)
    }
}
