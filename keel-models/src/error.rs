use displaydoc::Display;
use keel_serialization::SerializeError;
use thiserror::Error;

/// models result
pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

/// models error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ModelsError {
    /// hashing error
    HashError,
    /// serialization error: {0}
    SerializationError(#[from] SerializeError),
    /// deserialization error: {0}
    DeserializeError(String),
    /// buffer error: {0}
    BufferError(String),
    /// keel_hash error: {0}
    KeelHashError(#[from] keel_hash::KeelHashError),
    /// keel_signature error: {0}
    KeelSignatureError(#[from] keel_signature::KeelSignatureError),
    /// amount parse error: {0}
    AmountParseError(String),
    /// address parsing error: {0}
    AddressParseError(String),
    /// amount overflow
    AmountOverflowError,
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for ModelsError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        ModelsError::DeserializeError(err.to_string())
    }
}
