//! Caller notifications.
//!
//! Every notification is delivered synchronously from within event
//! handling, never buffered or batched.

use crate::types::SessionSnapshot;

/// Receives session notifications. All methods default to no-ops.
pub trait UploadObserver: Send {
    fn on_progress(&mut self, _snapshot: &SessionSnapshot) {}
    fn on_finished(&mut self, _snapshot: &SessionSnapshot) {}
    fn on_cancelled(&mut self, _snapshot: &SessionSnapshot) {}
    fn on_error(&mut self, _snapshot: &SessionSnapshot) {}
}

impl UploadObserver for () {}

/// Callback type for a single notification.
pub type SnapshotCallback = Box<dyn FnMut(&SessionSnapshot) + Send>;

/// Closure-based observer; unset callbacks are skipped.
#[derive(Default)]
pub struct Callbacks {
    on_progress: Option<SnapshotCallback>,
    on_finished: Option<SnapshotCallback>,
    on_cancelled: Option<SnapshotCallback>,
    on_error: Option<SnapshotCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, cb: impl FnMut(&SessionSnapshot) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn with_finished(mut self, cb: impl FnMut(&SessionSnapshot) + Send + 'static) -> Self {
        self.on_finished = Some(Box::new(cb));
        self
    }

    pub fn with_cancelled(mut self, cb: impl FnMut(&SessionSnapshot) + Send + 'static) -> Self {
        self.on_cancelled = Some(Box::new(cb));
        self
    }

    pub fn with_error(mut self, cb: impl FnMut(&SessionSnapshot) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(cb));
        self
    }
}

impl UploadObserver for Callbacks {
    fn on_progress(&mut self, snapshot: &SessionSnapshot) {
        if let Some(cb) = self.on_progress.as_mut() {
            cb(snapshot);
        }
    }

    fn on_finished(&mut self, snapshot: &SessionSnapshot) {
        if let Some(cb) = self.on_finished.as_mut() {
            cb(snapshot);
        }
    }

    fn on_cancelled(&mut self, snapshot: &SessionSnapshot) {
        if let Some(cb) = self.on_cancelled.as_mut() {
            cb(snapshot);
        }
    }

    fn on_error(&mut self, snapshot: &SessionSnapshot) {
        if let Some(cb) = self.on_error.as_mut() {
            cb(snapshot);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_finished", &self.on_finished.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
