//! A cheaply cloneable cancellation signal shared between a task and
//! whatever holds the handle that can stop it.
//!
//! Grounded on the shutdown-channel pattern in the agnostic-mdns-style
//! `Processor` (a `select!` between the socket and a shutdown receiver), but
//! expressed as a flag plus a condvar instead of a channel: every blocking
//! wait in Beacon already has a deadline (§4.2, §6.2), so cancellation only
//! needs to wake that wait up early, not deliver a message.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

struct Inner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// Handle used to request cancellation. Cloning shares the same underlying
/// signal; cancelling through any clone cancels all of them.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleeps for up to `timeout`, returning early if cancelled. Returns
    /// `true` if the wait was cut short by cancellation.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        if *cancelled {
            return true;
        }
        let result = self.inner.condvar.wait_for(&mut cancelled, timeout);
        !result.timed_out() || *cancelled
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}
