use crate::amount::{Amount, AmountDeserializer, AmountSerializer};
use keel_serialization::{
    Deserializer, OptionDeserializer, OptionSerializer, SerializeError, Serializer,
    U64VarIntDeserializer, U64VarIntSerializer,
};
use keel_signature::{PublicKey, PublicKeyDeserializer, PublicKeySerializer};
use nom::error::{context, ContextError, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;

/// The state of one account in the ledger.
///
/// The public key is `None` until the account's first signed spend, at which
/// point it is adopted from the transaction input and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    /// number of spends executed from this account so far
    pub sequence: u64,
    /// spendable balance
    pub balance: Amount,
    /// staked coins, used for reward weighting and confiscated on slashing
    pub stake: Amount,
    /// public key, resolved on first use
    pub public_key: Option<PublicKey>,
}

impl Account {
    /// Creates an account holding `balance` and nothing else
    pub fn with_balance(balance: Amount) -> Self {
        Account {
            balance,
            ..Default::default()
        }
    }

    /// Creates a staked account, as found on validator addresses
    pub fn with_stake(balance: Amount, stake: Amount) -> Self {
        Account {
            balance,
            stake,
            ..Default::default()
        }
    }
}

/// Serializer for `Account`
#[derive(Clone)]
pub struct AccountSerializer {
    u64_serializer: U64VarIntSerializer,
    amount_serializer: AmountSerializer,
    public_key_serializer: OptionSerializer<PublicKey, PublicKeySerializer>,
}

impl AccountSerializer {
    /// Creates a serializer for `Account`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
            amount_serializer: AmountSerializer::new(),
            public_key_serializer: OptionSerializer::new(PublicKeySerializer::new()),
        }
    }
}

impl Default for AccountSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<Account> for AccountSerializer {
    fn serialize(&self, value: &Account, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.sequence, buffer)?;
        self.amount_serializer.serialize(&value.balance, buffer)?;
        self.amount_serializer.serialize(&value.stake, buffer)?;
        self.public_key_serializer
            .serialize(&value.public_key, buffer)?;
        Ok(())
    }
}

/// Deserializer for `Account`
#[derive(Clone)]
pub struct AccountDeserializer {
    u64_deserializer: U64VarIntDeserializer,
    amount_deserializer: AmountDeserializer,
    public_key_deserializer: OptionDeserializer<PublicKey, PublicKeyDeserializer>,
}

impl AccountDeserializer {
    /// Creates a deserializer for `Account`
    pub const fn new() -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            amount_deserializer: AmountDeserializer::new(
                Included(Amount::MIN),
                Included(Amount::MAX),
            ),
            public_key_deserializer: OptionDeserializer::new(PublicKeyDeserializer::new()),
        }
    }
}

impl Default for AccountDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Account> for AccountDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Account, E> {
        context(
            "Failed Account deserialization",
            tuple((
                context("Failed sequence deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
                context("Failed balance deserialization", |input| {
                    self.amount_deserializer.deserialize(input)
                }),
                context("Failed stake deserialization", |input| {
                    self.amount_deserializer.deserialize(input)
                }),
                context("Failed public_key deserialization", |input| {
                    self.public_key_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(sequence, balance, stake, public_key)| Account {
            sequence,
            balance,
            stake,
            public_key,
        })
        .parse(buffer)
    }
}
