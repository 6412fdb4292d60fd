//! Wire protocol for the Incoming!! upload channel.
//!
//! Control records travel as JSON text frames wrapped in a
//! `{"MsgType": ..., "MsgData": ...}` envelope; file chunks travel as raw
//! binary frames.

pub mod constants;
pub mod envelope;
pub mod frames;
pub mod messages;

pub use constants::MessageType;
pub use envelope::Message;
pub use frames::{ClientMessage, ServerMessage, UploadParams};

/// Errors produced while encoding or decoding control records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} record without MsgData")]
    MissingPayload(MessageType),

    #[error("{0} is not expected in this direction")]
    WrongDirection(MessageType),

    #[error("invalid upload config: {0}")]
    InvalidConfig(String),

    #[error("{0} must not be negative (got {1})")]
    Negative(&'static str, i64),

    #[error("{0} out of range ({1})")]
    OutOfRange(&'static str, u64),

    #[error("negative acknowledgement")]
    Nack,

    #[error("record too large ({0} bytes)")]
    TooLarge(usize),
}
