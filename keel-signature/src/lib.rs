//! Signature management for keel.
//!
//! Keys and signatures are secp256k1 ECDSA over 32-byte hashes. Text forms
//! are bs58-check, binary forms are fixed-width byte arrays.

mod error;
mod signature_impl;

pub use error::KeelSignatureError;
pub use signature_impl::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, PUBLIC_KEY_SIZE_BYTES, SECRET_KEY_SIZE_BYTES, SIGNATURE_SIZE_BYTES,
};
