//! Length-prefixed serializers for variable-size payloads.

use keel_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::bytes::complete::take;
use nom::error::{context, ContextError, ParseError};
use nom::{IResult, Parser};
use std::ops::Bound::Included;

/// Serializer for `Vec<u8>`: varint length followed by the raw bytes
#[derive(Default, Clone)]
pub struct VecU8Serializer {
    len_serializer: U64VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a new `VecU8Serializer`
    pub const fn new() -> Self {
        Self {
            len_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.len_serializer.serialize(&(value.len() as u64), buffer)?;
        buffer.extend(value);
        Ok(())
    }
}

/// Deserializer for `Vec<u8>` with a maximum length bound
#[derive(Clone)]
pub struct VecU8Deserializer {
    len_deserializer: U64VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a new `VecU8Deserializer` accepting up to `max_length` bytes
    pub const fn new(max_length: u64) -> Self {
        Self {
            len_deserializer: U64VarIntDeserializer::new(Included(0), Included(max_length)),
        }
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        context("Failed Vec<u8> deserialization", |input| {
            let (rest, len) = self.len_deserializer.deserialize(input)?;
            let (rest, data) = take(len as usize)(rest)?;
            Ok((rest, data.to_vec()))
        })
        .parse(buffer)
    }
}

/// Serializer for `String`: varint byte length followed by the utf8 bytes
#[derive(Default, Clone)]
pub struct StringSerializer {
    len_serializer: U64VarIntSerializer,
}

impl StringSerializer {
    /// Creates a new `StringSerializer`
    pub const fn new() -> Self {
        Self {
            len_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<String> for StringSerializer {
    fn serialize(&self, value: &String, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.len_serializer.serialize(&(value.len() as u64), buffer)?;
        buffer.extend(value.as_bytes());
        Ok(())
    }
}

/// Deserializer for `String` with a maximum byte length bound
#[derive(Clone)]
pub struct StringDeserializer {
    len_deserializer: U64VarIntDeserializer,
}

impl StringDeserializer {
    /// Creates a new `StringDeserializer` accepting up to `max_length` bytes
    pub const fn new(max_length: u64) -> Self {
        Self {
            len_deserializer: U64VarIntDeserializer::new(Included(0), Included(max_length)),
        }
    }
}

impl Deserializer<String> for StringDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        context("Failed String deserialization", |input: &'a [u8]| {
            let (rest, len) = self.len_deserializer.deserialize(input)?;
            let (rest, data) = take(len as usize)(rest)?;
            let value = String::from_utf8(data.to_vec()).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Verify,
                ))
            })?;
            Ok((rest, value))
        })
        .parse(buffer)
    }
}
