//! In-flight counter for busy/idle indicators.
//!
//! Not an admission mechanism: any number of guards may be alive at once.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared counter of operations currently running.
#[derive(Debug, Clone)]
pub struct InFlight {
    count: Arc<watch::Sender<usize>>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlight {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Increments the counter. The returned guard decrements it when
    /// dropped, whatever the outcome of the guarded operation.
    #[must_use = "dropping the guard immediately ends the operation"]
    pub fn begin(&self) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Current number of running operations.
    pub fn current(&self) -> usize {
        *self.count.borrow()
    }

    /// True when nothing is running.
    pub fn is_idle(&self) -> bool {
        self.current() == 0
    }

    /// Watches the counter.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

/// Marks one running operation; see [`InFlight::begin`].
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
