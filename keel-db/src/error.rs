use displaydoc::Display;
use thiserror::Error;

/// Database errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum DbError {
    /// storage backend error: {0}
    BackendError(String),
    /// corrupted value under key {0}
    CorruptedValue(String),
}
