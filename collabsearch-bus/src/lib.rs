//! Event plumbing for collaborative search.
//!
//! - [`Bus`]: a multicast channel where every live subscriber observes every
//!   published value in emission order.
//! - [`Debounced`]: a per-subscriber stage that collapses a burst of values
//!   into the last one, once the bus has been quiet for a whole window.
//! - [`InFlight`]: a busy/idle counter whose decrement is tied to a guard's
//!   drop, so it runs on success, failure and cancellation alike.

mod bus;
mod debounce;
mod inflight;

pub use bus::{Bus, Subscription, DEFAULT_CAPACITY};
pub use debounce::{Debounced, DEFAULT_DEBOUNCE};
pub use inflight::{InFlight, InFlightGuard};
