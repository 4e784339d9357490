//! Cooperative cancellation for in-flight calls.
//!
//! A [`CancellationToken`] is a one-shot signal the caller holds while the
//! executor runs. It is checked before the first attempt, before every
//! retry, and during the inter-attempt sleep; the transport surfaces its own
//! cancellation/deadline condition separately. Once fired the token stays
//! fired.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Why a token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled the call.
    Cancelled,
    /// A caller-imposed deadline passed.
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<Option<CancelReason>>,
    signal: Condvar,
}

/// One-shot cancellation signal, cheaply cloneable; all clones observe the
/// same state.
///
/// The default token never fires.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Creates an unfired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token with [`CancelReason::Cancelled`].
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Cancelled);
    }

    /// Fires the token with an explicit reason. Later calls are no-ops; the
    /// first reason wins.
    pub fn cancel_with(&self, reason: CancelReason) {
        let mut state = self.inner.state.lock().unwrap();
        if state.is_none() {
            *state = Some(reason);
            self.inner.signal.notify_all();
        }
    }

    /// Whether the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().unwrap().is_some()
    }

    /// The cause, if the token has fired.
    pub fn reason(&self) -> Option<CancelReason> {
        *self.inner.state.lock().unwrap()
    }

    /// Sleeps for `duration`, waking early if the token fires.
    ///
    /// Returns `Ok(())` after a full sleep and `Err(reason)` if the token
    /// fired before or during it.
    pub fn sleep(&self, duration: Duration) -> Result<(), CancelReason> {
        let deadline = Instant::now() + duration;
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(reason) = *state {
                return Err(reason);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (next, _timeout) = self
                .inner
                .signal
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = next;
        }
    }
}
