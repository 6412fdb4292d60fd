//! Payload records carried in the envelope's `MsgData`.
//!
//! Field names follow the server's exported record fields verbatim.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Asks to begin (or resume) the upload with the given id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgUploadReq {
    pub id: String,
    pub length_bytes: i64,
}

/// Acknowledgement record.
///
/// Sent by the client after receiving [`MsgUploadConf`]; sent by the
/// server to confirm a [`MsgCancel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgAck {
    pub ack: bool,
}

/// Informs the server that the client pauses and is about to disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgPause {
    pub pause: bool,
}

/// Abort request. Used in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgCancel {
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Transfer parameters announced by the server at handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUploadConf {
    /// Payload size of a single binary message, in KiB.
    #[serde(rename = "ChunkSizeKB")]
    pub chunk_size_kb: u64,
    /// Position in the file to resume uploading from.
    #[serde(rename = "FilePos")]
    pub file_pos: i64,
    /// How many chunks the sender may be ahead of the acknowledgements.
    #[serde(rename = "SendAhead")]
    pub send_ahead: u32,
}

/// The server persisted one chunk of `chunk_size` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgChunkAck {
    pub chunk_size: i64,
}

/// Fatal, session-ending condition reported by the server.
///
/// The server leaves `ErrorCode` at zero for most errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgError {
    #[serde(default)]
    pub error_code: i32,
    #[serde(default)]
    pub msg: String,
}

/// The server handed the uploaded file over to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MsgAllDone {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_conf_uses_server_field_names() {
        let conf = MsgUploadConf {
            chunk_size_kb: 64,
            file_pos: 0,
            send_ahead: 4,
        };
        let json = serde_json::to_value(&conf).unwrap();
        assert_eq!(json["ChunkSizeKB"], 64);
        assert_eq!(json["FilePos"], 0);
        assert_eq!(json["SendAhead"], 4);
    }

    #[test]
    fn error_tolerates_missing_fields() {
        let err: MsgError = serde_json::from_str(r#"{"Msg":"unknown upload id"}"#).unwrap();
        assert_eq!(err.error_code, 0);
        assert_eq!(err.msg, "unknown upload id");
    }

    #[test]
    fn error_field_names() {
        let err = MsgError {
            error_code: 3,
            msg: "boom".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"ErrorCode":3,"Msg":"boom"}"#);
    }

    #[test]
    fn cancel_and_pause_field_names() {
        let cancel = MsgCancel {
            reason: "user abort".into(),
        };
        assert_eq!(
            serde_json::to_string(&cancel).unwrap(),
            r#"{"Reason":"user abort"}"#
        );
        let pause = MsgPause { pause: true };
        assert_eq!(serde_json::to_string(&pause).unwrap(), r#"{"Pause":true}"#);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let ack: MsgChunkAck =
            serde_json::from_str(r#"{"ChunkSize":1024,"Extra":"ignored"}"#).unwrap();
        assert_eq!(ack.chunk_size, 1024);
    }
}
