//! Multicast bus over a tokio broadcast channel.

use crate::Debounced;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Channel capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A named multicast channel.
///
/// Publishing never blocks and never fails: with no subscriber the value is
/// simply dropped. Cloning a bus yields another handle on the same channel.
#[derive(Debug)]
pub struct Bus<T> {
    name: &'static str,
    sender: broadcast::Sender<T>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Bus<T> {
    /// Creates a bus with the default capacity.
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    /// Creates a bus holding at most `capacity` unread values per subscriber.
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { name, sender }
    }

    /// Name given at construction, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publishes a value to every current subscriber.
    /// Returns the number of subscribers that will observe it.
    pub fn publish(&self, value: T) -> usize {
        match self.sender.send(value) {
            Ok(n) => n,
            Err(_) => {
                trace!(bus = self.name, "published with no subscriber");
                0
            }
        }
    }

    /// Subscribes to every value published from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            bus: self.name,
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribes through a debounce stage of the given window.
    pub fn subscribe_debounced(&self, window: Duration) -> Debounced<T> {
        Debounced::new(self.subscribe(), window)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One subscriber's view of a [`Bus`].
#[derive(Debug)]
pub struct Subscription<T> {
    bus: &'static str,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Waits for the next value. Returns `None` once every bus handle has
    /// been dropped and the backlog is drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(bus = self.bus, skipped, "subscriber lagged behind bus");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Some(value),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(bus = self.bus, skipped, "subscriber lagged behind bus");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drains every queued value.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
