//! Typed views of the control records exchanged on the upload channel.
//!
//! [`ClientMessage`] and [`ServerMessage`] are what the rest of the code
//! works with; the envelope and payload structs only exist on the wire.

use crate::ProtocolError;
use crate::constants::{CHUNK_SIZE_UNIT, MessageType, WS_MAX_MESSAGE_SIZE};
use crate::envelope::Message;
use crate::messages::{
    MsgAck, MsgAllDone, MsgCancel, MsgChunkAck, MsgError, MsgPause, MsgUploadConf, MsgUploadReq,
};

/// Transfer parameters negotiated at handshake, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadParams {
    /// Bytes per chunk.
    pub chunk_size: u64,
    /// Offset the server already holds; the upload continues from here.
    pub resume_offset: u64,
    /// Maximum number of unacknowledged chunks in flight.
    pub send_ahead: u32,
}

/// A record sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    UploadRequest { id: String, total_bytes: u64 },
    Ack,
    Pause,
    Cancel { reason: String },
}

/// A record sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    UploadConfig(UploadParams),
    Error { code: i32, message: String },
    ChunkAck { size: u64 },
    AllDone,
    /// Server-initiated abort.
    Cancel { reason: String },
    /// Confirms a client cancellation. Travels as an `MsgAck` record.
    CancelAck,
}

impl ClientMessage {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Self::UploadRequest { .. } => MessageType::UploadReq,
            Self::Ack => MessageType::Ack,
            Self::Pause => MessageType::Pause,
            Self::Cancel { .. } => MessageType::Cancel,
        }
    }

    /// Wraps this record in its envelope.
    pub fn to_message(&self) -> Result<Message, ProtocolError> {
        let msg_type = self.msg_type();
        let msg = match self {
            Self::UploadRequest { id, total_bytes } => {
                let length_bytes = i64::try_from(*total_bytes)
                    .map_err(|_| ProtocolError::OutOfRange("LengthBytes", *total_bytes))?;
                Message::new(
                    msg_type,
                    &MsgUploadReq {
                        id: id.clone(),
                        length_bytes,
                    },
                )?
            }
            Self::Ack => Message::new(msg_type, &MsgAck { ack: true })?,
            Self::Pause => Message::new(msg_type, &MsgPause { pause: true })?,
            Self::Cancel { reason } => Message::new(
                msg_type,
                &MsgCancel {
                    reason: reason.clone(),
                },
            )?,
        };
        Ok(msg)
    }

    /// Encodes this record as the JSON text of a WebSocket text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(&self.to_message()?)?)
    }

    /// Decodes a client record. Used by servers and test peers.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg = parse_envelope(text)?;
        match msg.msg_type {
            MessageType::UploadReq => {
                let req: MsgUploadReq = payload(&msg)?;
                let total_bytes = u64::try_from(req.length_bytes)
                    .map_err(|_| ProtocolError::Negative("LengthBytes", req.length_bytes))?;
                Ok(Self::UploadRequest {
                    id: req.id,
                    total_bytes,
                })
            }
            MessageType::Ack => {
                let ack: MsgAck = payload(&msg)?;
                if !ack.ack {
                    return Err(ProtocolError::Nack);
                }
                Ok(Self::Ack)
            }
            MessageType::Pause => {
                let _: MsgPause = payload(&msg)?;
                Ok(Self::Pause)
            }
            MessageType::Cancel => {
                let cancel: MsgCancel = payload(&msg)?;
                Ok(Self::Cancel {
                    reason: cancel.reason,
                })
            }
            other => Err(ProtocolError::WrongDirection(other)),
        }
    }
}

impl ServerMessage {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UploadConfig(_) => "upload-config",
            Self::Error { .. } => "error",
            Self::ChunkAck { .. } => "chunk-ack",
            Self::AllDone => "all-done",
            Self::Cancel { .. } => "cancel",
            Self::CancelAck => "cancel-ack",
        }
    }

    /// Decodes the JSON text of a WebSocket text frame.
    ///
    /// Structurally invalid records (unknown type, bad payload, parameters
    /// that could never let an upload progress) are rejected here so the
    /// session only ever sees well-formed input.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg = parse_envelope(text)?;
        Self::from_message(&msg)
    }

    /// Converts a decoded envelope into a typed server record.
    pub fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        match msg.msg_type {
            MessageType::UploadConf => {
                let conf: MsgUploadConf = payload(msg)?;
                if conf.chunk_size_kb == 0 {
                    return Err(ProtocolError::InvalidConfig("ChunkSizeKB is zero".into()));
                }
                if conf.send_ahead == 0 {
                    return Err(ProtocolError::InvalidConfig("SendAhead is zero".into()));
                }
                let resume_offset = u64::try_from(conf.file_pos)
                    .map_err(|_| ProtocolError::Negative("FilePos", conf.file_pos))?;
                let chunk_size = conf
                    .chunk_size_kb
                    .checked_mul(CHUNK_SIZE_UNIT)
                    .ok_or(ProtocolError::OutOfRange("ChunkSizeKB", conf.chunk_size_kb))?;
                Ok(Self::UploadConfig(UploadParams {
                    chunk_size,
                    resume_offset,
                    send_ahead: conf.send_ahead,
                }))
            }
            MessageType::Error => {
                let err: MsgError = payload(msg)?;
                Ok(Self::Error {
                    code: err.error_code,
                    message: err.msg,
                })
            }
            MessageType::ChunkAck => {
                let ack: MsgChunkAck = payload(msg)?;
                let size = u64::try_from(ack.chunk_size)
                    .map_err(|_| ProtocolError::Negative("ChunkSize", ack.chunk_size))?;
                Ok(Self::ChunkAck { size })
            }
            MessageType::AllDone => {
                let _: MsgAllDone = payload(msg)?;
                Ok(Self::AllDone)
            }
            MessageType::Cancel => {
                let cancel: MsgCancel = payload(msg)?;
                Ok(Self::Cancel {
                    reason: cancel.reason,
                })
            }
            MessageType::Ack => {
                let ack: MsgAck = payload(msg)?;
                if !ack.ack {
                    return Err(ProtocolError::Nack);
                }
                Ok(Self::CancelAck)
            }
            other => Err(ProtocolError::WrongDirection(other)),
        }
    }

    /// Wraps this record in its envelope. Used by servers and test peers.
    pub fn to_message(&self) -> Result<Message, ProtocolError> {
        let msg = match self {
            Self::UploadConfig(params) => {
                let file_pos = i64::try_from(params.resume_offset)
                    .map_err(|_| ProtocolError::OutOfRange("FilePos", params.resume_offset))?;
                Message::new(
                    MessageType::UploadConf,
                    &MsgUploadConf {
                        chunk_size_kb: params.chunk_size / CHUNK_SIZE_UNIT,
                        file_pos,
                        send_ahead: params.send_ahead,
                    },
                )?
            }
            Self::Error { code, message } => Message::new(
                MessageType::Error,
                &MsgError {
                    error_code: *code,
                    msg: message.clone(),
                },
            )?,
            Self::ChunkAck { size } => {
                let chunk_size = i64::try_from(*size)
                    .map_err(|_| ProtocolError::OutOfRange("ChunkSize", *size))?;
                Message::new(MessageType::ChunkAck, &MsgChunkAck { chunk_size })?
            }
            Self::AllDone => Message::new(MessageType::AllDone, &MsgAllDone { success: true })?,
            Self::Cancel { reason } => Message::new(
                MessageType::Cancel,
                &MsgCancel {
                    reason: reason.clone(),
                },
            )?,
            Self::CancelAck => Message::new(MessageType::Ack, &MsgAck { ack: true })?,
        };
        Ok(msg)
    }

    /// Encodes this record as the JSON text of a WebSocket text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(&self.to_message()?)?)
    }
}

fn parse_envelope(text: &str) -> Result<Message, ProtocolError> {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge(text.len()));
    }
    Ok(serde_json::from_str(text)?)
}

fn payload<T: for<'de> serde::Deserialize<'de>>(msg: &Message) -> Result<T, ProtocolError> {
    msg.parse_payload()?
        .ok_or(ProtocolError::MissingPayload(msg.msg_type))
}
