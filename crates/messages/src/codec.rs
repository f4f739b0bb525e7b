//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! Messages are UTF-8 JSON objects tagged on a `kind` field. The transport
//! delivers opaque byte payloads; this codec is the only place those bytes
//! are interpreted. A payload that fails to decode here is rejected without
//! touching protocol state, so one corrupt peer cannot affect the rest.

use crate::WireMessage;
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Empty message")]
    Empty,

    #[error("JSON decode error: {0}")]
    Decode(String),

    #[error("JSON encode error: {0}")]
    Encode(String),
}

/// Encode a message to wire format.
pub fn encode_message(message: &WireMessage) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a message from wire format.
///
/// Unknown `kind` discriminants and malformed payloads are decode errors;
/// callers log and drop them.
pub fn decode_message(data: &[u8]) -> Result<WireMessage, CodecError> {
    if data.is_empty() {
        return Err(CodecError::Empty);
    }
    serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
}
