use displaydoc::Display;
use thiserror::Error;

/// Hash-related errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum KeelHashError {
    /// parsing error: {0}
    ParsingError(String),
}
