use displaydoc::Display;
use thiserror::Error;

/// Errors of the signature layer
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum KeelSignatureError {
    /// parsing error: {0}
    ParsingError(String),
    /// signature verification failed: {0}
    SignatureError(String),
}
