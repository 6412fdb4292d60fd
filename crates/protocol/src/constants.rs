use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path of the upload WebSocket endpoint on the upload server.
pub const DEFAULT_ENDPOINT_PATH: &str = "/frontend/upload_ws";

/// Delay before reconnecting after an unexpected disconnect.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(20);

/// How often keepalive pings are sent on an open upload channel.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum size of an inbound message (1 MiB).
///
/// The server only ever sends small control records; anything larger
/// is a broken or hostile peer.
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Bytes per unit of `ChunkSizeKB` in the upload configuration record.
pub const CHUNK_SIZE_UNIT: u64 = 1024;

/// Control record type identifier, carried in the envelope's `MsgType`.
///
/// The names are the server's record type names and must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Client asks to begin or resume an upload.
    #[serde(rename = "MsgUploadReq")]
    UploadReq,
    /// Server accepts the request and announces transfer parameters.
    #[serde(rename = "MsgUploadConf")]
    UploadConf,
    /// Acknowledgement. Client → server after the config; server → client
    /// to confirm a cancellation.
    #[serde(rename = "MsgAck")]
    Ack,
    /// Server persisted one chunk.
    #[serde(rename = "MsgChunkAck")]
    ChunkAck,
    /// Fatal condition, ends the session.
    #[serde(rename = "MsgError")]
    Error,
    /// Abort request (either direction).
    #[serde(rename = "MsgCancel")]
    Cancel,
    /// Client is about to close the connection to pause.
    #[serde(rename = "MsgPause")]
    Pause,
    /// Server finished post-processing the uploaded file.
    #[serde(rename = "MsgAllDone")]
    AllDone,
}

impl MessageType {
    /// Wire name of this record type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadReq => "MsgUploadReq",
            Self::UploadConf => "MsgUploadConf",
            Self::Ack => "MsgAck",
            Self::ChunkAck => "MsgChunkAck",
            Self::Error => "MsgError",
            Self::Cancel => "MsgCancel",
            Self::Pause => "MsgPause",
            Self::AllDone => "MsgAllDone",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_serializes_to_wire_name() {
        let all = [
            MessageType::UploadReq,
            MessageType::UploadConf,
            MessageType::Ack,
            MessageType::ChunkAck,
            MessageType::Error,
            MessageType::Cancel,
            MessageType::Pause,
            MessageType::AllDone,
        ];
        for mt in all {
            let json = serde_json::to_string(&mt).unwrap();
            assert_eq!(json, format!("\"{}\"", mt.as_str()));
            let back: MessageType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, mt);
        }
    }

    #[test]
    fn unknown_message_type_rejected() {
        let result = serde_json::from_str::<MessageType>("\"MsgBogus\"");
        assert!(result.is_err());
    }

    #[test]
    fn retry_delay_default() {
        assert_eq!(DEFAULT_RETRY_DELAY, Duration::from_millis(20));
    }
}
