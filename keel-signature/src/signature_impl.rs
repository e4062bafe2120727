use crate::error::KeelSignatureError;
use keel_hash::Hash;
use keel_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use secp256k1::{ecdsa, All, Message, Secp256k1};
use std::convert::TryInto;
use std::str::FromStr;

/// Size of a serialized secret key, in bytes
pub const SECRET_KEY_SIZE_BYTES: usize = 32;
/// Size of a serialized public key (compressed form), in bytes
pub const PUBLIC_KEY_SIZE_BYTES: usize = 33;
/// Size of a serialized signature (compact form), in bytes
pub const SIGNATURE_SIZE_BYTES: usize = 64;

fn engine() -> Secp256k1<All> {
    Secp256k1::new()
}

/// A secp256k1 keypair used to sign hashes
#[derive(Clone)]
pub struct KeyPair {
    secret: secp256k1::SecretKey,
    public: secp256k1::PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // never print the secret
        write!(f, "KeyPair({})", self.get_public_key())
    }
}

impl KeyPair {
    /// Generates a random keypair
    pub fn generate() -> Self {
        let secp = engine();
        let (secret, public) = secp.generate_keypair(&mut rand::thread_rng());
        KeyPair { secret, public }
    }

    /// Rebuilds a keypair from secret key bytes
    pub fn from_bytes(data: &[u8; SECRET_KEY_SIZE_BYTES]) -> Result<Self, KeelSignatureError> {
        let secret = secp256k1::SecretKey::from_slice(data).map_err(|err| {
            KeelSignatureError::ParsingError(format!("secret key bytes parsing error: {}", err))
        })?;
        let public = secp256k1::PublicKey::from_secret_key(&engine(), &secret);
        Ok(KeyPair { secret, public })
    }

    /// Secret key bytes
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE_BYTES] {
        self.secret.secret_bytes()
    }

    /// The public half of the keypair
    pub fn get_public_key(&self) -> PublicKey {
        PublicKey(self.public)
    }

    /// Signs a 32-byte hash with the secret key
    pub fn sign(&self, hash: &Hash) -> Result<Signature, KeelSignatureError> {
        let message = Message::from_slice(hash.to_bytes()).map_err(|err| {
            KeelSignatureError::SignatureError(format!("could not build message: {}", err))
        })?;
        Ok(Signature(engine().sign_ecdsa(&message, &self.secret)))
    }
}

/// Public key used to verify signatures, serialized in compressed form
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PublicKey(secp256k1::PublicKey);

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for PublicKey {
    type Err = KeelSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_bs58_check(s)
    }
}

impl PublicKey {
    /// Checks that `signature` was produced over `hash` by the holder of
    /// this key's secret half.
    pub fn verify_signature(
        &self,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<(), KeelSignatureError> {
        let message = Message::from_slice(hash.to_bytes()).map_err(|err| {
            KeelSignatureError::SignatureError(format!("could not build message: {}", err))
        })?;
        engine()
            .verify_ecdsa(&message, &signature.0, &self.0)
            .map_err(|err| KeelSignatureError::SignatureError(err.to_string()))
    }

    /// Serialize in bs58-check form
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Compressed key bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE_BYTES] {
        self.0.serialize()
    }

    /// Deserialize from bs58-check form
    pub fn from_bs58_check(data: &str) -> Result<PublicKey, KeelSignatureError> {
        let decoded = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| {
                KeelSignatureError::ParsingError(format!(
                    "public key bs58-check parsing error: {}",
                    err
                ))
            })?;
        let bytes: [u8; PUBLIC_KEY_SIZE_BYTES] = decoded.as_slice().try_into().map_err(|_| {
            KeelSignatureError::ParsingError("public key bs58-check has wrong length".to_string())
        })?;
        PublicKey::from_bytes(&bytes)
    }

    /// Deserialize from compressed key bytes
    pub fn from_bytes(data: &[u8; PUBLIC_KEY_SIZE_BYTES]) -> Result<PublicKey, KeelSignatureError> {
        secp256k1::PublicKey::from_slice(&data[..])
            .map(PublicKey)
            .map_err(|err| {
                KeelSignatureError::ParsingError(format!(
                    "public key bytes parsing error: {}",
                    err
                ))
            })
    }
}

impl ::serde::Serialize for PublicKey {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(&self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = PublicKey;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII bs58-check string")
                }

                fn visit_str<E: ::serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                    PublicKey::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = PublicKey;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E: ::serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                    let bytes: [u8; PUBLIC_KEY_SIZE_BYTES] = v.try_into().map_err(E::custom)?;
                    PublicKey::from_bytes(&bytes).map_err(E::custom)
                }
            }
            d.deserialize_bytes(BytesVisitor)
        }
    }
}

/// Deserializer for `PublicKey`
#[derive(Default, Clone)]
pub struct PublicKeyDeserializer;

impl PublicKeyDeserializer {
    /// Creates a deserializer for `PublicKey`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<PublicKey> for PublicKeyDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], PublicKey, E> {
        context("Failed public key deserialization", |input: &'a [u8]| {
            if input.len() < PUBLIC_KEY_SIZE_BYTES {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Eof,
                )));
            }
            let bytes: [u8; PUBLIC_KEY_SIZE_BYTES] = input[..PUBLIC_KEY_SIZE_BYTES]
                .try_into()
                .expect("public key buffer was length-checked");
            let key = PublicKey::from_bytes(&bytes).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Fail,
                ))
            })?;
            Ok((&input[PUBLIC_KEY_SIZE_BYTES..], key))
        })(buffer)
    }
}

/// Serializer for `PublicKey`
#[derive(Default, Clone)]
pub struct PublicKeySerializer;

impl PublicKeySerializer {
    /// Creates a serializer for `PublicKey`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<PublicKey> for PublicKeySerializer {
    fn serialize(&self, value: &PublicKey, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// ECDSA signature over a 32-byte hash, serialized in compact form
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Signature(ecdsa::Signature);

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for Signature {
    type Err = KeelSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::from_bs58_check(s)
    }
}

impl Signature {
    /// Serialize in bs58-check form
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.into_bytes()).with_check().into_string()
    }

    /// Compact signature bytes
    pub fn into_bytes(self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0.serialize_compact()
    }

    /// Deserialize from bs58-check form
    pub fn from_bs58_check(data: &str) -> Result<Signature, KeelSignatureError> {
        let decoded = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| {
                KeelSignatureError::ParsingError(format!(
                    "signature bs58-check parsing error: {}",
                    err
                ))
            })?;
        let bytes: [u8; SIGNATURE_SIZE_BYTES] = decoded.as_slice().try_into().map_err(|_| {
            KeelSignatureError::ParsingError("signature bs58-check has wrong length".to_string())
        })?;
        Signature::from_bytes(&bytes)
    }

    /// Deserialize from compact signature bytes
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Result<Signature, KeelSignatureError> {
        ecdsa::Signature::from_compact(&data[..])
            .map(Signature)
            .map_err(|err| {
                KeelSignatureError::ParsingError(format!("signature bytes parsing error: {}", err))
            })
    }
}

impl ::serde::Serialize for Signature {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(&self.into_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Signature {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Signature, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = Signature;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII bs58-check string")
                }

                fn visit_str<E: ::serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                    Signature::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = Signature;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E: ::serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                    let bytes: [u8; SIGNATURE_SIZE_BYTES] = v.try_into().map_err(E::custom)?;
                    Signature::from_bytes(&bytes).map_err(E::custom)
                }
            }
            d.deserialize_bytes(BytesVisitor)
        }
    }
}

/// Deserializer for `Signature`
#[derive(Default, Clone)]
pub struct SignatureDeserializer;

impl SignatureDeserializer {
    /// Creates a deserializer for `Signature`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Signature> for SignatureDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Signature, E> {
        context("Failed signature deserialization", |input: &'a [u8]| {
            if input.len() < SIGNATURE_SIZE_BYTES {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Eof,
                )));
            }
            let bytes: [u8; SIGNATURE_SIZE_BYTES] = input[..SIGNATURE_SIZE_BYTES]
                .try_into()
                .expect("signature buffer was length-checked");
            let signature = Signature::from_bytes(&bytes).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Fail,
                ))
            })?;
            Ok((&input[SIGNATURE_SIZE_BYTES..], signature))
        })(buffer)
    }
}
