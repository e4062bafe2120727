use displaydoc::Display;
use thiserror::Error;

/// Messenger errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum NetworkError {
    /// messenger is already started
    AlreadyStarted,
    /// channel send failed: {0}
    ChannelError(String),
    /// handler error: {0}
    HandlerError(String),
}
