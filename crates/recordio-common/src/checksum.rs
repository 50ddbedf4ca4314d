//! Checksum utilities for RecordIO
//!
//! Payload hashing for duplicate suppression and compact cache keys.

use crate::error::{Error, Result};
use crate::types::RecordData;
use base64::Engine;

/// CRC32C of the given bytes, hex encoded
#[must_use]
pub fn crc32c_hex(data: &[u8]) -> String {
    hex::encode(crc32c::crc32c(data).to_be_bytes())
}

/// CRC32C of the given string, base64 encoded. Used to shorten cache keys
/// that embed credentials.
#[must_use]
pub fn crc32c_base64(input: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(crc32c::crc32c(input.as_bytes()).to_be_bytes())
}

/// Canonical content hash of a record payload. Payloads are serialized to
/// JSON bytes and hashed with CRC32C; the same digest is stored alongside
/// blobs so a proposed update can be compared without reading payloads.
pub fn payload_hash(data: &RecordData) -> Result<String> {
    let bytes = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(crc32c_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_hash_stable() {
        let data = RecordData {
            data: serde_json::json!({"depth": 123, "name": "well-a"}),
        };
        let first = payload_hash(&data).unwrap();
        let second = payload_hash(&data).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
    }

    #[test]
    fn test_payload_hash_differs() {
        let a = RecordData {
            data: serde_json::json!({"depth": 123}),
        };
        let b = RecordData {
            data: serde_json::json!({"depth": 124}),
        };
        assert_ne!(payload_hash(&a).unwrap(), payload_hash(&b).unwrap());
    }

    #[test]
    fn test_cache_key_is_compact() {
        let key = crc32c_base64("entitlement-groups:tenant:Bearer abc");
        assert!(!key.is_empty());
        assert!(key.len() <= 8);
    }
}
