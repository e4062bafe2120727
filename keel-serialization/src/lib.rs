//! Binary serialization primitives shared by every keel wire type.
//!
//! Each serializable type gets a dedicated `Serializer` and a bounded
//! `Deserializer` implementation; deserializers are nom parsers so they can
//! be freely composed and report the full context chain on failure.

use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};

use displaydoc::Display;
use nom::error::{context, ContextError, ParseError};
use nom::{IResult, Parser};
use thiserror::Error;
use unsigned_varint::nom as varint_nom;

/// Errors raised while serializing a value
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// number {0} is out of the serializable range
    NumberTooBig(String),
    /// general serialization error: {0}
    GeneralError(String),
}

/// Failure report produced by keel deserializers.
///
/// When a parse fails, nom unwinds through every enclosing parser; each
/// layer deposits a frame here on the way out. The report renders
/// outermost-first ("what was being parsed: ...: what actually failed"),
/// pins how many bytes were left when the innermost parser stopped, and
/// keeps a short copied preview of those bytes, so the error owns no
/// borrow of the input buffer.
#[derive(Clone, Error)]
pub struct DeserializeError {
    /// unwind-ordered frames, innermost parser first
    frames: Vec<Frame>,
    /// input bytes remaining at the innermost failure
    remaining: usize,
    /// copied prefix of the bytes the innermost parser saw
    preview: Vec<u8>,
}

#[derive(Clone)]
enum Frame {
    Label(&'static str),
    Kind(nom::error::ErrorKind),
}

const ERROR_PREVIEW_BYTES: usize = 8;

impl DeserializeError {
    fn at_input(input: &[u8], frame: Frame) -> Self {
        DeserializeError {
            frames: vec![frame],
            remaining: input.len(),
            preview: input.iter().copied().take(ERROR_PREVIEW_BYTES).collect(),
        }
    }
}

impl<'a> ParseError<&'a [u8]> for DeserializeError {
    fn from_error_kind(input: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        Self::at_input(input, Frame::Kind(kind))
    }

    fn append(_input: &'a [u8], kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.frames.push(Frame::Kind(kind));
        other
    }

    fn from_char(input: &'a [u8], _: char) -> Self {
        Self::from_error_kind(input, nom::error::ErrorKind::Char)
    }

    fn or(self, other: Self) -> Self {
        // keep whichever branch consumed more input before giving up
        if other.remaining <= self.remaining {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a [u8]> for DeserializeError {
    fn add_context(_input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.frames.push(Frame::Label(ctx));
        other
    }
}

impl Display for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (depth, frame) in self.frames.iter().rev().enumerate() {
            if depth > 0 {
                write!(f, ": ")?;
            }
            match frame {
                Frame::Label(label) => write!(f, "{}", label)?,
                Frame::Kind(kind) => write!(f, "{}", kind.description())?,
            }
        }
        write!(f, " ({} bytes left)", self.remaining)
    }
}

impl Debug for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if !self.preview.is_empty() {
            write!(f, ", next bytes:")?;
            for byte in &self.preview {
                write!(f, " {:02x}", byte)?;
            }
        }
        Ok(())
    }
}

/// Serializes a value `T` into a byte buffer.
pub trait Serializer<T> {
    /// Serialize `value`, appending the bytes to `buffer`.
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

/// Deserializes a value `T` from a byte buffer.
///
/// Implementations carry their own validity bounds so that a deserializer
/// rejects out-of-range values at parse time.
pub trait Deserializer<T> {
    /// Deserialize a `T` from the start of `buffer`, returning the rest.
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

macro_rules! gen_varint {
    ($($t:ident, $ser:ident, $deser:ident, $buf:ident, $nomfn:ident, $doc:expr);*) => {
        $(
            #[doc = "Serializer for "]
            #[doc = $doc]
            #[doc = " in unsigned varint form."]
            #[derive(Clone, Default)]
            pub struct $ser;

            impl $ser {
                /// Creates a new varint serializer
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Serializer<$t> for $ser {
                fn serialize(&self, value: &$t, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
                    buffer.extend_from_slice(unsigned_varint::encode::$t(
                        *value,
                        &mut unsigned_varint::encode::$buf(),
                    ));
                    Ok(())
                }
            }

            #[doc = "Bounded deserializer for "]
            #[doc = $doc]
            #[doc = " in unsigned varint form."]
            #[derive(Clone)]
            pub struct $deser {
                range: (Bound<$t>, Bound<$t>),
            }

            impl $deser {
                /// Creates a varint deserializer accepting values within the given bounds
                pub const fn new(min: Bound<$t>, max: Bound<$t>) -> Self {
                    Self { range: (min, max) }
                }
            }

            impl Deserializer<$t> for $deser {
                fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
                    &self,
                    buffer: &'a [u8],
                ) -> IResult<&'a [u8], $t, E> {
                    context(concat!("Failed ", stringify!($t), " varint deserialization"), |input: &'a [u8]| {
                        let (rest, value) = varint_nom::$nomfn(input).map_err(|_| {
                            nom::Err::Error(ParseError::from_error_kind(
                                input,
                                nom::error::ErrorKind::Fail,
                            ))
                        })?;
                        if !self.range.contains(&value) {
                            return Err(nom::Err::Error(ParseError::from_error_kind(
                                input,
                                nom::error::ErrorKind::Verify,
                            )));
                        }
                        Ok((rest, value))
                    })(buffer)
                }
            }
        )*
    };
}

gen_varint! {
    u32, U32VarIntSerializer, U32VarIntDeserializer, u32_buffer, u32, "`u32`";
    u64, U64VarIntSerializer, U64VarIntDeserializer, u64_buffer, u64, "`u64`"
}

/// Serializer for `Option<T>`: a presence tag byte followed by the value.
#[derive(Clone)]
pub struct OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    inner: ST,
    phantom: PhantomData<T>,
}

impl<T, ST> OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    /// Creates an option serializer wrapping the value serializer
    pub const fn new(inner: ST) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

const OPTION_TAG_NONE: u8 = 0;
const OPTION_TAG_SOME: u8 = 1;

impl<T, ST> Serializer<Option<T>> for OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    fn serialize(&self, value: &Option<T>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        match value {
            None => buffer.push(OPTION_TAG_NONE),
            Some(v) => {
                buffer.push(OPTION_TAG_SOME);
                self.inner.serialize(v, buffer)?;
            }
        }
        Ok(())
    }
}

/// Deserializer for `Option<T>`
#[derive(Clone)]
pub struct OptionDeserializer<T, DT>
where
    DT: Deserializer<T>,
{
    inner: DT,
    phantom: PhantomData<T>,
}

impl<T, DT> OptionDeserializer<T, DT>
where
    DT: Deserializer<T>,
{
    /// Creates an option deserializer wrapping the value deserializer
    pub const fn new(inner: DT) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T, DT> Deserializer<Option<T>> for OptionDeserializer<T, DT>
where
    DT: Deserializer<T>,
{
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Option<T>, E> {
        context("Failed Option deserialization", |input: &'a [u8]| {
            let Some((&tag, rest)) = input.split_first() else {
                return Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Eof,
                )));
            };
            match tag {
                OPTION_TAG_NONE => Ok((rest, None)),
                OPTION_TAG_SOME => self.inner.deserialize(rest).map(|(rest, v)| (rest, Some(v))),
                _ => Err(nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Tag,
                ))),
            }
        })
        .parse(buffer)
    }
}
