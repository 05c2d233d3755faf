//! Per-subscriber debounce stage.

use crate::Subscription;
use std::time::Duration;
use tokio::time::timeout;
use tracing::trace;

/// Debounce window used when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

/// A subscription that only yields once the bus has been quiet for `window`.
///
/// A burst of values arriving less than `window` apart yields exactly one
/// value: the last of the burst. Other subscriptions on the same bus still
/// observe every value of the burst.
#[derive(Debug)]
pub struct Debounced<T> {
    inner: Subscription<T>,
    window: Duration,
}

impl<T: Clone + Send + 'static> Debounced<T> {
    pub fn new(inner: Subscription<T>, window: Duration) -> Self {
        Self { inner, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits for the end of the next burst and returns its last value.
    /// Returns `None` when the bus is closed and nothing is pending.
    pub async fn recv(&mut self) -> Option<T> {
        let mut latest = self.inner.recv().await?;
        let mut collapsed = 0usize;
        loop {
            match timeout(self.window, self.inner.recv()).await {
                Ok(Some(value)) => {
                    latest = value;
                    collapsed += 1;
                }
                // Window elapsed with no newer value, or the bus closed
                // mid-burst: either way the pending value is due.
                Err(_) | Ok(None) => {
                    if collapsed > 0 {
                        trace!(collapsed, "debounce collapsed burst");
                    }
                    return Some(latest);
                }
            }
        }
    }
}
