use crate::error::ModelsError;
use keel_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

/// A coin amount with overflow-checked arithmetic.
///
/// The underlying representation is a raw `u64` count of the smallest coin
/// unit; all on-chain arithmetic goes through the checked operations so an
/// overflow is an explicit error rather than silent wraparound.
#[derive(
    Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Default, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    /// Minimum amount
    pub const MIN: Amount = Amount(u64::MIN);
    /// Maximum amount
    pub const MAX: Amount = Amount(u64::MAX);

    /// The zero amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Builds an amount from its raw unit count
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw unit count
    pub const fn to_raw(&self) -> u64 {
        self.0
    }

    /// Checked addition, `None` on overflow
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction, `None` on underflow
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Checked multiplication by a scalar, `None` on overflow
    #[must_use]
    pub fn checked_mul_u64(self, rhs: u64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Amount)
    }

    /// Checked division by a scalar, `None` when dividing by zero
    #[must_use]
    pub fn checked_div_u64(self, rhs: u64) -> Option<Self> {
        self.0.checked_div(rhs).map(Amount)
    }

    /// Saturating addition
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Amount(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// True for the zero amount
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Amount {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Amount)
            .map_err(|err| ModelsError::AmountParseError(err.to_string()))
    }
}

/// Serializer for `Amount`
#[derive(Default, Clone)]
pub struct AmountSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl AmountSerializer {
    /// Creates a serializer for `Amount`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Amount> for AmountSerializer {
    fn serialize(&self, value: &Amount, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `Amount`
#[derive(Clone)]
pub struct AmountDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

impl AmountDeserializer {
    /// Creates a deserializer for `Amount` within the given bounds
    pub const fn new(min: Bound<Amount>, max: Bound<Amount>) -> Self {
        let min = match min {
            Bound::Included(amount) => Bound::Included(amount.0),
            Bound::Excluded(amount) => Bound::Excluded(amount.0),
            Bound::Unbounded => Bound::Unbounded,
        };
        let max = match max {
            Bound::Included(amount) => Bound::Included(amount.0),
            Bound::Excluded(amount) => Bound::Excluded(amount.0),
            Bound::Unbounded => Bound::Unbounded,
        };
        Self {
            u64_deserializer: U64VarIntDeserializer::new(min, max),
        }
    }
}

impl Deserializer<Amount> for AmountDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Amount, E> {
        context("Failed Amount deserialization", |input| {
            self.u64_deserializer.deserialize(input)
        })
        .map(Amount)
        .parse(buffer)
    }
}
