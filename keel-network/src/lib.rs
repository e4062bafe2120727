//! The messenger contract the node assumes of its transport layer, with an
//! in-process implementation.
//!
//! The wire transport itself (sockets, discovery) lives outside this
//! workspace; what the ledger-side code relies on is only the shape
//! implemented here: peers connect bidirectionally, `broadcast` delivers a
//! message to every directly connected peer, and inbound messages are routed
//! to the handler registered for their channel.

mod error;
mod messenger;

pub use error::NetworkError;
pub use messenger::{ChannelId, Message, MessageHandler, Messenger, PeerId};
