use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// Envelope for every control record on the upload channel.
///
/// The `MsgData` field uses `serde_json::value::RawValue` so the payload is
/// only decoded once the record type is known, the same two-step decoding
/// the server performs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "MsgType")]
    pub msg_type: MessageType,
    #[serde(rename = "MsgData", default)]
    pub msg_data: Option<Box<serde_json::value::RawValue>>,
}

impl Message {
    /// Wraps a payload into an envelope of the given type.
    pub fn new<T: Serialize>(msg_type: MessageType, payload: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(payload)?;
        Ok(Self {
            msg_type,
            msg_data: Some(serde_json::value::RawValue::from_string(json)?),
        })
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.msg_data {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }
}
