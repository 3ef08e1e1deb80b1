fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use serde_json::Value;
    use step_protocol::wire::{HEADER_LEN, encode, read_envelope};
    use step_protocol::{Metadata, Request, Response};

    /// `spaced_frame_hex` holds frames from a peer that writes JSON with
    /// `", "` and `": "` separators; `compact_frame_hex` is the same message
    /// as this crate encodes it.
    const REQUEST_FIXTURES: &[&str] = &[
        "login_request.json",
        "file_save_request.json",
        "file_save_anonymous_request.json",
        "upload_request.json",
        "download_request.json",
        "data_save_request.json",
        "data_delete_request.json",
    ];

    const RESPONSE_FIXTURES: &[&str] = &[
        "plan_response.json",
        "download_response.json",
        "error_response.json",
    ];

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn hex_field(fixture: &Value, name: &str) -> Vec<u8> {
        let text = fixture[name]
            .as_str()
            .unwrap_or_else(|| panic!("fixture field {name} missing"));
        hex::decode(text).unwrap_or_else(|e| panic!("bad hex in {name}: {e}"))
    }

    fn str_field(v: &Value, name: &str) -> String {
        v[name].as_str().unwrap_or_default().to_owned()
    }

    /// Builds the typed request a fixture describes.
    fn request_from(v: &Value) -> Request {
        match v["kind"].as_str().unwrap_or_default() {
            "login" => Request::Login {
                username: str_field(v, "username"),
                password: str_field(v, "password"),
            },
            "file_save" => Request::FileSave {
                size: v["size"].as_u64().unwrap_or_default(),
                key: v["key"].as_str().map(str::to_owned),
            },
            "upload" => Request::Upload {
                key: str_field(v, "key"),
                block_index: v["block_index"].as_u64().unwrap_or_default(),
            },
            "download" => Request::Download {
                key: str_field(v, "key"),
                block_index: v["block_index"].as_u64().unwrap_or_default(),
            },
            "data_save" => Request::DataSave {
                key: v["key"].as_str().map(str::to_owned),
                record: v["record"].as_object().cloned().unwrap_or_default(),
            },
            "data_delete" => Request::DataDelete {
                key: str_field(v, "key"),
            },
            other => panic!("unknown request kind {other}"),
        }
    }

    fn keys(m: &Metadata) -> Vec<&str> {
        m.keys().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn spaced_frames_decode_to_typed_requests() {
        for name in REQUEST_FIXTURES {
            let fixture = load_fixture(name);
            let request = request_from(&fixture["request"]);
            let expected = request.to_metadata(fixture["token"].as_str());

            let frame = hex_field(&fixture, "spaced_frame_hex");
            let envelope = read_envelope(&mut frame.as_slice())
                .await
                .unwrap_or_else(|e| panic!("{name}: {e}"));

            assert_eq!(envelope.metadata, expected, "{name}: metadata");
            assert_eq!(keys(&envelope.metadata), keys(&expected), "{name}: field order");
            assert_eq!(envelope.payload, hex_field(&fixture, "payload_hex"), "{name}: payload");
        }
    }

    #[test]
    fn compact_encoding_is_bit_exact() {
        for name in REQUEST_FIXTURES {
            let fixture = load_fixture(name);
            let request = request_from(&fixture["request"]);
            let metadata = request.to_metadata(fixture["token"].as_str());
            let payload = hex_field(&fixture, "payload_hex");

            let frame = encode(&metadata, &payload).unwrap();
            assert_eq!(
                hex::encode(&frame),
                fixture["compact_frame_hex"].as_str().unwrap_or_default(),
                "{name}"
            );
        }
    }

    #[test]
    fn header_lengths_match_sections() {
        for name in REQUEST_FIXTURES {
            let fixture = load_fixture(name);
            let frame = hex_field(&fixture, "spaced_frame_hex");
            let meta_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
            let payload_len = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
            assert_eq!(frame.len(), HEADER_LEN + meta_len + payload_len, "{name}");
        }
    }

    #[tokio::test]
    async fn server_responses_decode() {
        for name in RESPONSE_FIXTURES {
            let fixture = load_fixture(name);
            let frame = hex_field(&fixture, "frame_hex");
            let envelope = read_envelope(&mut frame.as_slice())
                .await
                .unwrap_or_else(|e| panic!("{name}: {e}"));
            let response = Response::from(envelope);

            let expect = &fixture["expect"];
            assert_eq!(response.status(), expect["status"].as_i64(), "{name}: status");
            assert_eq!(
                response.status_msg(),
                expect["status_msg"].as_str(),
                "{name}: status_msg"
            );
            for (field, value) in expect.as_object().into_iter().flatten() {
                assert_eq!(response.metadata().get(field), Some(value), "{name}: {field}");
            }
            assert_eq!(
                response.payload(),
                hex_field(&fixture, "payload_hex").as_slice(),
                "{name}: payload"
            );
        }
    }

    #[tokio::test]
    async fn plan_fields_are_typed() {
        let fixture = load_fixture("plan_response.json");
        let frame = hex_field(&fixture, "frame_hex");
        let response = Response::from(read_envelope(&mut frame.as_slice()).await.unwrap());

        assert!(response.is_ok());
        assert_eq!(response.str_field("key"), Some("report.pdf"));
        assert_eq!(response.u64_field("block_size"), Some(65_536));
        assert_eq!(response.u64_field("total_block"), Some(153));
        assert_eq!(response.u64_field("key"), None);
    }
}
