//! Payload codec: JSON, gzip-compressed.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes and compresses a value.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
    let json = serde_json::to_vec(value).map_err(|e| e.to_string())?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&json).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}

/// Decompresses and deserializes a payload produced by [`encode`].
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, String> {
    let mut decoder = GzDecoder::new(payload);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json).map_err(|e| e.to_string())?;

    serde_json::from_slice(&json).map_err(|e| e.to_string())
}
