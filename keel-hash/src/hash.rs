use crate::error::KeelHashError;
use keel_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use std::cmp::Ordering;
use std::convert::TryInto;
use std::ops::{BitXor, BitXorAssign};
use std::str::FromStr;

/// Size of a serialized hash, in bytes
pub const HASH_SIZE_BYTES: usize = 32;

/// Blake3 hash wrapper.
///
/// Displayed and parsed in bs58-check form.
#[derive(Eq, PartialEq, Copy, Clone, Hash)]
pub struct Hash(blake3::Hash);

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

/// Bitwise XOR of hashes is used as an order-independent combination for
/// incremental set commitments (see the ledger state root).
impl BitXorAssign for Hash {
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = *self ^ rhs;
    }
}

impl BitXor for Hash {
    type Output = Self;

    fn bitxor(self, other: Self) -> Self {
        let mut bytes = [0u8; HASH_SIZE_BYTES];
        for (out, (a, b)) in bytes
            .iter_mut()
            .zip(self.to_bytes().iter().zip(other.to_bytes()))
        {
            *out = a ^ b;
        }
        Hash::from_bytes(&bytes)
    }
}

impl Hash {
    /// Compute a hash from raw data.
    pub fn compute_from(data: &[u8]) -> Self {
        Hash(blake3::hash(data))
    }

    /// The all-zeroes hash, XOR identity for set commitments.
    pub fn zero() -> Self {
        Hash::from_bytes(&[0u8; HASH_SIZE_BYTES])
    }

    /// Serialize in bs58-check form.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// View the hash as raw bytes.
    pub fn to_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        self.0.as_bytes()
    }

    /// Convert into raw bytes.
    pub fn into_bytes(self) -> [u8; HASH_SIZE_BYTES] {
        *self.0.as_bytes()
    }

    /// Deserialize from bs58-check form.
    pub fn from_bs58_check(data: &str) -> Result<Hash, KeelHashError> {
        let decoded = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| {
                KeelHashError::ParsingError(format!("hash bs58-check parsing error: {}", err))
            })?;
        let bytes: [u8; HASH_SIZE_BYTES] = decoded.as_slice().try_into().map_err(|_| {
            KeelHashError::ParsingError("hash bs58-check has wrong length".to_string())
        })?;
        Ok(Hash::from_bytes(&bytes))
    }

    /// Deserialize from raw bytes.
    pub fn from_bytes(data: &[u8; HASH_SIZE_BYTES]) -> Hash {
        Hash(blake3::Hash::from(*data))
    }
}

impl FromStr for Hash {
    type Err = KeelHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_bs58_check(s)
    }
}

impl ::serde::Serialize for Hash {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Hash {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII bs58-check string")
                }

                fn visit_str<E: ::serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                    Hash::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E: ::serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                    let bytes: [u8; HASH_SIZE_BYTES] = v.try_into().map_err(E::custom)?;
                    Ok(Hash::from_bytes(&bytes))
                }
            }
            d.deserialize_bytes(BytesVisitor)
        }
    }
}

/// Serializer for `Hash`
#[derive(Default, Clone)]
pub struct HashSerializer;

impl HashSerializer {
    /// Creates a serializer for `Hash`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Hash> for HashSerializer {
    fn serialize(&self, value: &Hash, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Hash`
#[derive(Default, Clone)]
pub struct HashDeserializer;

impl HashDeserializer {
    /// Creates a deserializer for `Hash`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Hash> for HashDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Hash, E> {
        context("Failed hash deserialization", |input: &'a [u8]| {
            if input.len() < HASH_SIZE_BYTES {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Eof,
                )));
            }
            Ok((
                &input[HASH_SIZE_BYTES..],
                Hash::from_bytes(
                    input[..HASH_SIZE_BYTES]
                        .try_into()
                        .expect("hash buffer was length-checked"),
                ),
            ))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_serialization::DeserializeError;

    #[test]
    fn test_hash_determinism() {
        assert_eq!(
            Hash::compute_from(b"keel"),
            Hash::compute_from(b"keel"),
        );
        assert_ne!(Hash::compute_from(b"keel"), Hash::compute_from(b"leek"));
    }

    #[test]
    fn test_bs58_roundtrip() {
        let hash = Hash::compute_from(b"hashhashhash");
        assert_eq!(Hash::from_bs58_check(&hash.to_bs58_check()).unwrap(), hash);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let hash = Hash::compute_from(b"wire");
        let mut buffer = Vec::new();
        HashSerializer::new().serialize(&hash, &mut buffer).unwrap();
        let (rest, out) = HashDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(out, hash);
    }

    #[test]
    fn test_xor_identity_and_involution() {
        let a = Hash::compute_from(b"a");
        let b = Hash::compute_from(b"b");
        assert_eq!(a ^ Hash::zero(), a);
        assert_eq!(a ^ b ^ b, a);
    }
}
