//! Serialization for channel traffic.
//!
//! Provides postcard encode/decode for [`PushEvent`] and [`ChannelRequest`].
//! Transport framing is the channel implementation's concern.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::event::{ChannelRequest, PushEvent};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`PushEvent`] into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_event(event: &PushEvent) -> Result<Vec<u8>, CodecError> {
    encode_value(event)
}

/// Decodes a [`PushEvent`] from a byte slice.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode_event(bytes: &[u8]) -> Result<PushEvent, CodecError> {
    decode_value(bytes)
}

/// Encodes a [`ChannelRequest`] into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the request cannot be serialized.
pub fn encode_request(request: &ChannelRequest) -> Result<Vec<u8>, CodecError> {
    encode_value(request)
}

/// Decodes a [`ChannelRequest`] from a byte slice.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode_request(bytes: &[u8]) -> Result<ChannelRequest, CodecError> {
    decode_value(bytes)
}
