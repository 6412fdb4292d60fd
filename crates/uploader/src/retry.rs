//! Reconnect scheduling.
//!
//! [`RetryScheduler`] is the session-side bookkeeping: at most one timer is
//! armed at a time and only the armed timer's expiry is honoured.
//! [`spawn_retry_timer`] is the runtime side used by the driver.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::session::Input;
use crate::types::RetryToken;

#[derive(Debug, Default)]
pub struct RetryScheduler {
    armed: Option<RetryToken>,
    next: u64,
}

impl RetryScheduler {
    /// Arms a new timer, replacing any armed one.
    ///
    /// Returns the new token and the token it replaced, which the caller
    /// must cancel.
    pub fn arm(&mut self) -> (RetryToken, Option<RetryToken>) {
        let replaced = self.armed.take();
        self.next += 1;
        let token = RetryToken(self.next);
        self.armed = Some(token);
        (token, replaced)
    }

    /// Disarms the pending timer, if any, and returns its token.
    pub fn disarm(&mut self) -> Option<RetryToken> {
        self.armed.take()
    }

    /// Consumes a timer expiry. Returns `true` only for the armed token.
    pub fn fire(&mut self, token: RetryToken) -> bool {
        if self.armed == Some(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

/// Spawns a timer that feeds [`Input::RetryElapsed`] back to the session
/// after `delay`, unless the returned token is cancelled first.
pub(crate) fn spawn_retry_timer(
    token: RetryToken,
    delay: Duration,
    inputs: mpsc::Sender<Input>,
) -> CancellationToken {
    let cancel = CancellationToken::new();
    let c = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = c.cancelled() => {
                trace!(token = token.0, "retry timer disarmed");
            }
            _ = tokio::time::sleep(delay) => {
                let _ = inputs.send(Input::RetryElapsed(token)).await;
            }
        }
    });
    cancel
}
