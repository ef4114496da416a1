//! Rotating status messages shown while a scene is being generated.
//!
//! Purely cosmetic: the ticker advances on a timer and knows nothing about
//! the request it decorates.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Messages cycled through while waiting, in display order.
pub const LOADING_MESSAGES: [&str; 6] = [
    "Warming up the generator...",
    "Studying the character's art style...",
    "Figuring out how to hold the product...",
    "Sketching the scene...",
    "Blending everything together...",
    "Adding the finishing touches...",
];

/// Default time between messages.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2500);

/// Cycles an index through [`LOADING_MESSAGES`] on a timer.
///
/// The task stops when the ticker is stopped or dropped.
#[derive(Debug)]
pub struct StatusTicker {
    receiver: watch::Receiver<&'static str>,
    handle: JoinHandle<()>,
}

impl StatusTicker {
    /// Returns the message for a tick index, wrapping around.
    pub fn message(index: usize) -> &'static str {
        LOADING_MESSAGES[index % LOADING_MESSAGES.len()]
    }

    /// Starts ticking on the current tokio runtime.
    pub fn spawn(period: Duration) -> Self {
        let (sender, receiver) = watch::channel(Self::message(0));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately and message 0 is already published.
            interval.tick().await;
            let mut index = 0;
            loop {
                interval.tick().await;
                index += 1;
                if sender.send(Self::message(index)).is_err() {
                    break;
                }
            }
        });
        Self { receiver, handle }
    }

    /// Returns the message currently on display.
    pub fn current(&self) -> &'static str {
        *self.receiver.borrow()
    }

    /// Returns a receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<&'static str> {
        self.receiver.clone()
    }

    /// Stops the ticker.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for StatusTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
