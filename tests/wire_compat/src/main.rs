fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use incoming_protocol::messages::{
        MsgAck, MsgAllDone, MsgCancel, MsgChunkAck, MsgError, MsgPause, MsgUploadConf,
        MsgUploadReq,
    };
    use incoming_protocol::{ClientMessage, Message, ServerMessage, UploadParams};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_text(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes JSON into a Rust type, re-serializes it, and compares
    /// the JSON values (key order is irrelevant).
    fn roundtrip_value<T>(name: &str, value: &serde_json::Value)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let parsed: T = serde_json::from_value(value.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            value, &reserialized,
            "roundtrip mismatch for {name}:\n  server: {value}\n  client: {reserialized}"
        );
    }

    /// Round-trips both the envelope and its payload record.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);

        let envelope: Message = serde_json::from_str(&load_text(name))
            .unwrap_or_else(|e| panic!("failed to deserialize envelope {name}: {e}"));
        assert_encodes_to(serde_json::to_string(&envelope).unwrap(), name);

        roundtrip_value::<T>(name, &fixture["MsgData"]);
    }

    /// Checks that `encoded` is exactly the fixture's JSON.
    fn assert_encodes_to(encoded: String, name: &str) {
        let ours: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(ours, load_fixture(name), "encoding mismatch for {name}");
    }

    // --- Envelope and payload records ---

    #[test]
    fn fixture_upload_req() {
        roundtrip_test::<MsgUploadReq>("msg_upload_req.json");
    }

    #[test]
    fn fixture_upload_conf() {
        roundtrip_test::<MsgUploadConf>("msg_upload_conf.json");
    }

    #[test]
    fn fixture_ack() {
        roundtrip_test::<MsgAck>("msg_ack.json");
    }

    #[test]
    fn fixture_chunk_ack() {
        roundtrip_test::<MsgChunkAck>("msg_chunk_ack.json");
    }

    #[test]
    fn fixture_error() {
        roundtrip_test::<MsgError>("msg_error.json");
    }

    #[test]
    fn fixture_all_done() {
        roundtrip_test::<MsgAllDone>("msg_all_done.json");
    }

    #[test]
    fn fixture_pause() {
        roundtrip_test::<MsgPause>("msg_pause.json");
    }

    #[test]
    fn fixture_cancel() {
        roundtrip_test::<MsgCancel>("msg_cancel.json");
    }

    // --- Typed client records ---

    #[test]
    fn client_records_encode_like_server_expects() {
        let cases = [
            (
                ClientMessage::UploadRequest {
                    id: "7f3c9a1e".into(),
                    total_bytes: 734_003_200,
                },
                "msg_upload_req.json",
            ),
            (ClientMessage::Ack, "msg_ack.json"),
            (ClientMessage::Pause, "msg_pause.json"),
            (
                ClientMessage::Cancel {
                    reason: "user abort".into(),
                },
                "msg_cancel.json",
            ),
        ];
        for (record, fixture) in cases {
            assert_encodes_to(record.encode().unwrap(), fixture);
            assert_eq!(ClientMessage::decode(&load_text(fixture)).unwrap(), record);
        }
    }

    // --- Typed server records ---

    #[test]
    fn upload_conf_decodes_kib_to_bytes() {
        let msg = ServerMessage::decode(&load_text("msg_upload_conf.json")).unwrap();
        assert_eq!(
            msg,
            ServerMessage::UploadConfig(UploadParams {
                chunk_size: 1024 * 1024,
                resume_offset: 20_971_520,
                send_ahead: 8,
            })
        );
        assert_encodes_to(msg.encode().unwrap(), "msg_upload_conf.json");
    }

    #[test]
    fn server_records_decode() {
        let cases = [
            (
                "msg_chunk_ack.json",
                ServerMessage::ChunkAck { size: 1_048_576 },
            ),
            (
                "msg_error.json",
                ServerMessage::Error {
                    code: 0,
                    message: "Unknown upload id".into(),
                },
            ),
            ("msg_all_done.json", ServerMessage::AllDone),
            (
                "msg_cancel.json",
                ServerMessage::Cancel {
                    reason: "user abort".into(),
                },
            ),
            // The server confirms a cancel with a plain MsgAck.
            ("msg_ack.json", ServerMessage::CancelAck),
        ];
        for (fixture, expected) in cases {
            let decoded = ServerMessage::decode(&load_text(fixture))
                .unwrap_or_else(|e| panic!("failed to decode {fixture}: {e}"));
            assert_eq!(decoded, expected, "{fixture}");
            assert_encodes_to(expected.encode().unwrap(), fixture);
        }
    }

    #[test]
    fn client_only_records_rejected_from_server() {
        assert!(ServerMessage::decode(&load_text("msg_upload_req.json")).is_err());
        assert!(ServerMessage::decode(&load_text("msg_pause.json")).is_err());
    }
}
