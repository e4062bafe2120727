//! Hashing primitives for keel.
//!
//! `Hash` wraps blake3 and is used everywhere a commitment is needed:
//! transaction ids, block ids, account addresses and the ledger state root.

mod error;
mod hash;

pub use error::KeelHashError;
pub use hash::{Hash, HashDeserializer, HashSerializer, HASH_SIZE_BYTES};
