//! Public types for the upload session.

use std::fmt;
use std::str::FromStr;

/// Error code for a chunk source read failure.
pub const ERROR_CODE_READ: i32 = -1;
/// Error code for a cancellation the server never confirmed.
pub const ERROR_CODE_UNCONFIRMED_CANCEL: i32 = -2;
/// Error code for a record the session does not understand.
pub const ERROR_CODE_PROTOCOL: i32 = -3;

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    /// Created, `start()` not called yet.
    NotStarted,
    /// Opening the upload channel.
    Connecting,
    /// Channel open, waiting for the upload config.
    Handshaking,
    /// Sending chunks and collecting acknowledgements.
    Transferring,
    /// Every byte acknowledged; the server is post-processing.
    AwaitingCompletion,
    /// Paused by the caller, channel closed.
    Paused,
    /// Cancel sent, waiting for the server to confirm.
    Cancelling,
    Cancelled,
    Finished,
    Errored,
}

impl UploadState {
    /// Returns `true` for states no regular event can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Errored)
    }

    /// Human-readable description for status lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotStarted => "not yet started",
            Self::Connecting => "connecting to upload server",
            Self::Handshaking => "upload protocol handshake",
            Self::Transferring => "transferring file chunks to upload server",
            Self::AwaitingCompletion => "processing file on server",
            Self::Paused => "paused",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Finished => "all done",
            Self::Errored => "failed",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// How [`pause`](crate::Session::pause) should change the paused flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    Pause,
    Unpause,
    Toggle,
}

impl PauseMode {
    /// Resolves the mode against the current flag.
    pub fn resolve(self, paused: bool) -> bool {
        match self {
            Self::Pause => true,
            Self::Unpause => false,
            Self::Toggle => !paused,
        }
    }
}

/// Error returned when parsing an unknown [`PauseMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pause mode: {0:?} (expected pause, unpause or toggle)")]
pub struct ParsePauseModeError(String);

impl FromStr for PauseMode {
    type Err = ParsePauseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "unpause" => Ok(Self::Unpause),
            "toggle" => Ok(Self::Toggle),
            other => Err(ParsePauseModeError(other.to_string())),
        }
    }
}

/// Error recorded on a session, either reported by the server or
/// synthesized locally (negative codes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub code: i32,
    pub message: String,
}

impl SessionError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {}: {}", self.code, self.message)
    }
}

/// Identifies one connection attempt. Events from older attempts are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// Identifies one chunk read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadId(pub u64);

/// Identifies one armed reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryToken(pub u64);

/// Read-only view of a session, handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    pub state: UploadState,
    pub total_bytes: u64,
    pub bytes_transmitted: u64,
    pub bytes_acknowledged: u64,
    /// `None` until the first handshake completes.
    pub chunk_size: Option<u64>,
    pub send_ahead_limit: Option<u32>,
    pub chunks_in_flight: u32,
    pub bytes_in_flight: u64,
    pub chunks_sent_this_connection: u64,
    pub chunks_acked_this_connection: u64,
    pub paused: bool,
    pub can_pause: bool,
    pub can_cancel: bool,
    pub connected: bool,
    pub retry_pending: bool,
    pub error: Option<SessionError>,
    pub cancel_reason: Option<String>,
}

impl SessionSnapshot {
    /// Fraction of the file acknowledged by the server, in `[0, 1]`.
    pub fn fraction_acknowledged(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        self.bytes_acknowledged as f64 / self.total_bytes as f64
    }

    pub fn status_text(&self) -> &'static str {
        self.state.description()
    }
}
