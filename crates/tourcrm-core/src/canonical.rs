// SPDX-License-Identifier: Apache-2.0

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::sha256_hex;

/// Serializes `value` with object keys sorted at every depth.
pub fn stable_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(raw))
}

pub fn stable_json_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&stable_json_bytes(value)?))
}

/// Hash of a raw request body. JSON bodies hash by their canonical form so
/// that key order and whitespace do not matter.
#[must_use]
pub fn body_fingerprint(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => match stable_json_bytes(&value) {
            Ok(bytes) => sha256_hex(&bytes),
            Err(_) => sha256_hex(body),
        },
        Err(_) => sha256_hex(body),
    }
}

pub fn encode_token_payload<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    Ok(URL_SAFE_NO_PAD.encode(stable_json_bytes(payload)?))
}

pub fn decode_token_payload(encoded: &str) -> Result<Value, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| format!("token base64 decode failed: {e}"))?;
    serde_json::from_slice::<Value>(&bytes).map_err(|e| format!("token JSON decode failed: {e}"))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_are_sorted() {
        let value = json!({"z": 1, "a": {"d": 4, "b": 2}, "list": [{"y": 1, "x": 2}]});
        let text = String::from_utf8(stable_json_bytes(&value).expect("bytes")).expect("utf8");
        assert_eq!(text, r#"{"a":{"b":2,"d":4},"list":[{"x":2,"y":1}],"z":1}"#);
    }

    #[test]
    fn body_fingerprint_ignores_whitespace_and_key_order() {
        let a = body_fingerprint(br#"{"name":"Ana","email":"a@x.io"}"#);
        let b = body_fingerprint(b"{ \"email\": \"a@x.io\",\n \"name\": \"Ana\" }");
        assert_eq!(a, b);
        assert_ne!(a, body_fingerprint(br#"{"name":"Ana"}"#));
        assert_eq!(body_fingerprint(b"not json"), sha256_hex(b"not json"));
    }

    #[test]
    fn token_payload_decodes_back_to_value() {
        let encoded = encode_token_payload(&json!({"sub": 3, "org": 1})).expect("encode");
        assert!(!encoded.contains('='));
        let decoded = decode_token_payload(&encoded).expect("decode");
        assert_eq!(decoded, json!({"org": 1, "sub": 3}));
        assert!(decode_token_payload("%%%").is_err());
    }
}
