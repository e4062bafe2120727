//! The closed transaction sum type and its canonical wire codec.
//!
//! A transaction is one of three kinds: a user `Send`, a protocol `Coinbase`
//! (proposer reward) or a protocol `Slash` (misbehavior punishment). The
//! byte form is tag-discriminated and stable across nodes; signing covers
//! the chain id plus the signature-less body.

use crate::address::{Address, AddressDeserializer, AddressSerializer};
use crate::amount::{Amount, AmountDeserializer, AmountSerializer};
use crate::config::{
    MAX_SLASH_PROOF_LENGTH, MAX_TX_INPUTS, MAX_TX_OUTPUTS, MAX_TX_SIGNATURES,
};
use crate::error::ModelsError;
use crate::serialization::{StringSerializer, VecU8Deserializer, VecU8Serializer};
use keel_hash::Hash;
use keel_serialization::{
    DeserializeError, Deserializer, OptionDeserializer, OptionSerializer, SerializeError,
    Serializer, U32VarIntDeserializer, U32VarIntSerializer, U64VarIntDeserializer,
    U64VarIntSerializer,
};
use keel_signature::{
    PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature, SignatureDeserializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::{IResult, Parser};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Formatter;
use std::ops::Bound::Included;
use std::str::FromStr;

/// Size in bytes of a serialized transaction id
pub const TX_ID_SIZE_BYTES: usize = keel_hash::HASH_SIZE_BYTES;

/// Content-derived transaction identifier: the hash of the raw tx bytes
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TxId(Hash);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.to_bs58_check())
    }
}

impl FromStr for TxId {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TxId(Hash::from_str(s)?))
    }
}

impl TxId {
    /// Derives the id of a transaction from its raw byte form
    pub fn compute_from_raw(raw: &[u8]) -> TxId {
        TxId(Hash::compute_from(raw))
    }

    /// The underlying hash
    pub fn get_hash(&self) -> &Hash {
        &self.0
    }
}

/// A spend from one account: who pays, how much, and at which sequence step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// paying account
    pub address: Address,
    /// public key of the account, required the first time it spends
    pub public_key: Option<PublicKey>,
    /// coins debited
    pub coins: Amount,
    /// account sequence this spend consumes; strictly `current + 1`
    pub sequence: u64,
}

/// A credit to one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// credited account
    pub address: Address,
    /// coins credited
    pub coins: Amount,
}

/// Evidence of validator misbehavior recorded during execution,
/// materialized into a `SlashTx` at the next block proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashIntent {
    /// misbehaving account
    pub address: Address,
    /// sequence number the evidence refers to
    pub reserve_sequence: u64,
    /// opaque proof bytes
    pub proof: Vec<u8>,
}

/// Coin transfer submitted by users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTx {
    /// fee paid on top of the transferred coins; destroyed on execution
    pub fee: Amount,
    /// declared gas
    pub gas: u64,
    /// debited accounts
    pub inputs: Vec<TxInput>,
    /// credited accounts
    pub outputs: Vec<TxOutput>,
    /// signatures keyed by signer address
    pub signatures: BTreeMap<Address, Signature>,
}

/// Protocol reward transaction assembled by the block proposer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseTx {
    /// proposer identity; consumes no sequence number
    pub proposer: TxInput,
    /// reward credits, one per rewarded validator
    pub outputs: Vec<TxOutput>,
    /// height of the block this coinbase belongs to
    pub block_height: u64,
    /// signatures keyed by signer address
    pub signatures: BTreeMap<Address, Signature>,
}

/// Protocol punishment transaction assembled from a recorded slash intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashTx {
    /// proposer identity
    pub proposer: TxInput,
    /// account being slashed
    pub slashed_address: Address,
    /// sequence number the evidence refers to
    pub reserve_sequence: u64,
    /// opaque proof bytes
    pub slash_proof: Vec<u8>,
    /// signatures keyed by signer address
    pub signatures: BTreeMap<Address, Signature>,
}

/// A ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// user coin transfer
    Send(SendTx),
    /// proposer reward
    Coinbase(CoinbaseTx),
    /// validator punishment
    Slash(SlashTx),
}

#[derive(IntoPrimitive, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
enum TxTypeId {
    Send = 0,
    Coinbase = 1,
    Slash = 2,
}

impl Transaction {
    /// Kinds that only the block proposer may inject
    pub fn is_validator_only(&self) -> bool {
        matches!(self, Transaction::Coinbase(_) | Transaction::Slash(_))
    }

    /// Short kind name, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Send(_) => "send",
            Transaction::Coinbase(_) => "coinbase",
            Transaction::Slash(_) => "slash",
        }
    }

    /// Signatures attached to the transaction, keyed by signer address
    pub fn signatures(&self) -> &BTreeMap<Address, Signature> {
        match self {
            Transaction::Send(tx) => &tx.signatures,
            Transaction::Coinbase(tx) => &tx.signatures,
            Transaction::Slash(tx) => &tx.signatures,
        }
    }

    /// Attaches (or replaces) the signature of `address`
    pub fn set_signature(&mut self, address: Address, signature: Signature) {
        let signatures = match self {
            Transaction::Send(tx) => &mut tx.signatures,
            Transaction::Coinbase(tx) => &mut tx.signatures,
            Transaction::Slash(tx) => &mut tx.signatures,
        };
        signatures.insert(address, signature);
    }

    /// The bytes covered by signatures: the chain id followed by the
    /// signature-less body. Stable across nodes.
    pub fn sign_bytes(&self, chain_id: &str) -> Result<Vec<u8>, ModelsError> {
        let mut buffer = Vec::new();
        StringSerializer::new().serialize(&chain_id.to_string(), &mut buffer)?;
        TransactionSerializer::new().serialize_body(self, &mut buffer, false)?;
        Ok(buffer)
    }

    /// Hash of the sign bytes, the value actually signed
    pub fn sign_hash(&self, chain_id: &str) -> Result<Hash, ModelsError> {
        Ok(Hash::compute_from(&self.sign_bytes(chain_id)?))
    }

    /// Canonical byte form
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelsError> {
        let mut buffer = Vec::new();
        TransactionSerializer::new().serialize(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Decodes a transaction, requiring the whole buffer to be consumed
    pub fn from_bytes(raw: &[u8]) -> Result<Transaction, ModelsError> {
        let (rest, tx) = TransactionDeserializer::new()
            .deserialize::<DeserializeError>(raw)
            .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
        if !rest.is_empty() {
            return Err(ModelsError::DeserializeError(
                "trailing bytes after transaction".to_string(),
            ));
        }
        Ok(tx)
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transaction::Send(tx) => {
                writeln!(f, "Send:")?;
                writeln!(f, "\t- Fee:{}", tx.fee)?;
                writeln!(f, "\t- Gas:{}", tx.gas)?;
                writeln!(f, "\t- Inputs:{}", tx.inputs.len())?;
                writeln!(f, "\t- Outputs:{}", tx.outputs.len())?;
            }
            Transaction::Coinbase(tx) => {
                writeln!(f, "Coinbase:")?;
                writeln!(f, "\t- Proposer:{}", tx.proposer.address)?;
                writeln!(f, "\t- Outputs:{}", tx.outputs.len())?;
                writeln!(f, "\t- Block height:{}", tx.block_height)?;
            }
            Transaction::Slash(tx) => {
                writeln!(f, "Slash:")?;
                writeln!(f, "\t- Proposer:{}", tx.proposer.address)?;
                writeln!(f, "\t- Slashed:{}", tx.slashed_address)?;
                writeln!(f, "\t- Reserve sequence:{}", tx.reserve_sequence)?;
            }
        }
        Ok(())
    }
}

/// Serializer for `TxInput`
#[derive(Clone)]
pub struct TxInputSerializer {
    address_serializer: AddressSerializer,
    public_key_serializer: OptionSerializer<PublicKey, PublicKeySerializer>,
    amount_serializer: AmountSerializer,
    u64_serializer: U64VarIntSerializer,
}

impl TxInputSerializer {
    /// Creates a serializer for `TxInput`
    pub const fn new() -> Self {
        Self {
            address_serializer: AddressSerializer::new(),
            public_key_serializer: OptionSerializer::new(PublicKeySerializer::new()),
            amount_serializer: AmountSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Default for TxInputSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<TxInput> for TxInputSerializer {
    fn serialize(&self, value: &TxInput, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.address_serializer.serialize(&value.address, buffer)?;
        self.public_key_serializer
            .serialize(&value.public_key, buffer)?;
        self.amount_serializer.serialize(&value.coins, buffer)?;
        self.u64_serializer.serialize(&value.sequence, buffer)?;
        Ok(())
    }
}

/// Deserializer for `TxInput`
#[derive(Clone)]
pub struct TxInputDeserializer {
    address_deserializer: AddressDeserializer,
    public_key_deserializer: OptionDeserializer<PublicKey, PublicKeyDeserializer>,
    amount_deserializer: AmountDeserializer,
    u64_deserializer: U64VarIntDeserializer,
}

impl TxInputDeserializer {
    /// Creates a deserializer for `TxInput`
    pub const fn new() -> Self {
        Self {
            address_deserializer: AddressDeserializer::new(),
            public_key_deserializer: OptionDeserializer::new(PublicKeyDeserializer::new()),
            amount_deserializer: AmountDeserializer::new(
                Included(Amount::MIN),
                Included(Amount::MAX),
            ),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for TxInputDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<TxInput> for TxInputDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TxInput, E> {
        context(
            "Failed TxInput deserialization",
            tuple((
                context("Failed address deserialization", |input| {
                    self.address_deserializer.deserialize(input)
                }),
                context("Failed public_key deserialization", |input| {
                    self.public_key_deserializer.deserialize(input)
                }),
                context("Failed coins deserialization", |input| {
                    self.amount_deserializer.deserialize(input)
                }),
                context("Failed sequence deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(address, public_key, coins, sequence)| TxInput {
            address,
            public_key,
            coins,
            sequence,
        })
        .parse(buffer)
    }
}

/// Serializer for `TxOutput`
#[derive(Clone)]
pub struct TxOutputSerializer {
    address_serializer: AddressSerializer,
    amount_serializer: AmountSerializer,
}

impl TxOutputSerializer {
    /// Creates a serializer for `TxOutput`
    pub const fn new() -> Self {
        Self {
            address_serializer: AddressSerializer::new(),
            amount_serializer: AmountSerializer::new(),
        }
    }
}

impl Default for TxOutputSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<TxOutput> for TxOutputSerializer {
    fn serialize(&self, value: &TxOutput, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.address_serializer.serialize(&value.address, buffer)?;
        self.amount_serializer.serialize(&value.coins, buffer)?;
        Ok(())
    }
}

/// Deserializer for `TxOutput`
#[derive(Clone)]
pub struct TxOutputDeserializer {
    address_deserializer: AddressDeserializer,
    amount_deserializer: AmountDeserializer,
}

impl TxOutputDeserializer {
    /// Creates a deserializer for `TxOutput`
    pub const fn new() -> Self {
        Self {
            address_deserializer: AddressDeserializer::new(),
            amount_deserializer: AmountDeserializer::new(
                Included(Amount::MIN),
                Included(Amount::MAX),
            ),
        }
    }
}

impl Default for TxOutputDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<TxOutput> for TxOutputDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TxOutput, E> {
        context(
            "Failed TxOutput deserialization",
            tuple((
                context("Failed address deserialization", |input| {
                    self.address_deserializer.deserialize(input)
                }),
                context("Failed coins deserialization", |input| {
                    self.amount_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(address, coins)| TxOutput { address, coins })
        .parse(buffer)
    }
}

/// Serializer for `Transaction`
#[derive(Clone)]
pub struct TransactionSerializer {
    u32_serializer: U32VarIntSerializer,
    u64_serializer: U64VarIntSerializer,
    amount_serializer: AmountSerializer,
    input_serializer: TxInputSerializer,
    output_serializer: TxOutputSerializer,
    address_serializer: AddressSerializer,
    proof_serializer: VecU8Serializer,
}

impl TransactionSerializer {
    /// Creates a serializer for `Transaction`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            amount_serializer: AmountSerializer::new(),
            input_serializer: TxInputSerializer::new(),
            output_serializer: TxOutputSerializer::new(),
            address_serializer: AddressSerializer::new(),
            proof_serializer: VecU8Serializer::new(),
        }
    }

    fn serialize_inputs(
        &self,
        inputs: &[TxInput],
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&(inputs.len() as u32), buffer)?;
        for input in inputs {
            self.input_serializer.serialize(input, buffer)?;
        }
        Ok(())
    }

    fn serialize_outputs(
        &self,
        outputs: &[TxOutput],
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&(outputs.len() as u32), buffer)?;
        for output in outputs {
            self.output_serializer.serialize(output, buffer)?;
        }
        Ok(())
    }

    fn serialize_signatures(
        &self,
        signatures: &BTreeMap<Address, Signature>,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&(signatures.len() as u32), buffer)?;
        for (address, signature) in signatures {
            self.address_serializer.serialize(address, buffer)?;
            buffer.extend(signature.into_bytes());
        }
        Ok(())
    }

    /// Serializes the transaction body, optionally with its signature map.
    /// The signature-less form is what `sign_bytes` covers.
    pub(crate) fn serialize_body(
        &self,
        value: &Transaction,
        buffer: &mut Vec<u8>,
        with_signatures: bool,
    ) -> Result<(), SerializeError> {
        match value {
            Transaction::Send(tx) => {
                self.u32_serializer
                    .serialize(&u32::from(TxTypeId::Send), buffer)?;
                self.amount_serializer.serialize(&tx.fee, buffer)?;
                self.u64_serializer.serialize(&tx.gas, buffer)?;
                self.serialize_inputs(&tx.inputs, buffer)?;
                self.serialize_outputs(&tx.outputs, buffer)?;
                if with_signatures {
                    self.serialize_signatures(&tx.signatures, buffer)?;
                }
            }
            Transaction::Coinbase(tx) => {
                self.u32_serializer
                    .serialize(&u32::from(TxTypeId::Coinbase), buffer)?;
                self.input_serializer.serialize(&tx.proposer, buffer)?;
                self.serialize_outputs(&tx.outputs, buffer)?;
                self.u64_serializer.serialize(&tx.block_height, buffer)?;
                if with_signatures {
                    self.serialize_signatures(&tx.signatures, buffer)?;
                }
            }
            Transaction::Slash(tx) => {
                self.u32_serializer
                    .serialize(&u32::from(TxTypeId::Slash), buffer)?;
                self.input_serializer.serialize(&tx.proposer, buffer)?;
                self.address_serializer
                    .serialize(&tx.slashed_address, buffer)?;
                self.u64_serializer.serialize(&tx.reserve_sequence, buffer)?;
                self.proof_serializer.serialize(&tx.slash_proof, buffer)?;
                if with_signatures {
                    self.serialize_signatures(&tx.signatures, buffer)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for TransactionSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<Transaction> for TransactionSerializer {
    fn serialize(&self, value: &Transaction, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.serialize_body(value, buffer, true)
    }
}

/// Deserializer for `Transaction`
#[derive(Clone)]
pub struct TransactionDeserializer {
    id_deserializer: U32VarIntDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    amount_deserializer: AmountDeserializer,
    input_deserializer: TxInputDeserializer,
    output_deserializer: TxOutputDeserializer,
    address_deserializer: AddressDeserializer,
    signature_deserializer: SignatureDeserializer,
    proof_deserializer: VecU8Deserializer,
    input_count_deserializer: U32VarIntDeserializer,
    output_count_deserializer: U32VarIntDeserializer,
    signature_count_deserializer: U32VarIntDeserializer,
}

impl TransactionDeserializer {
    /// Creates a deserializer for `Transaction` with the protocol bounds
    pub const fn new() -> Self {
        Self {
            id_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            amount_deserializer: AmountDeserializer::new(
                Included(Amount::MIN),
                Included(Amount::MAX),
            ),
            input_deserializer: TxInputDeserializer::new(),
            output_deserializer: TxOutputDeserializer::new(),
            address_deserializer: AddressDeserializer::new(),
            signature_deserializer: SignatureDeserializer::new(),
            proof_deserializer: VecU8Deserializer::new(MAX_SLASH_PROOF_LENGTH),
            input_count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_TX_INPUTS),
            ),
            output_count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_TX_OUTPUTS),
            ),
            signature_count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_TX_SIGNATURES),
            ),
        }
    }

    fn deserialize_inputs<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<TxInput>, E> {
        context(
            "Failed inputs deserialization",
            length_count(
                context("Failed input count deserialization", |input| {
                    self.input_count_deserializer.deserialize(input)
                }),
                context("Failed input deserialization", |input| {
                    self.input_deserializer.deserialize(input)
                }),
            ),
        )
        .parse(buffer)
    }

    fn deserialize_outputs<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<TxOutput>, E> {
        context(
            "Failed outputs deserialization",
            length_count(
                context("Failed output count deserialization", |input| {
                    self.output_count_deserializer.deserialize(input)
                }),
                context("Failed output deserialization", |input| {
                    self.output_deserializer.deserialize(input)
                }),
            ),
        )
        .parse(buffer)
    }

    fn deserialize_signatures<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BTreeMap<Address, Signature>, E> {
        context(
            "Failed signatures deserialization",
            length_count(
                context("Failed signature count deserialization", |input| {
                    self.signature_count_deserializer.deserialize(input)
                }),
                context(
                    "Failed signature entry deserialization",
                    tuple((
                        |input| self.address_deserializer.deserialize(input),
                        |input| self.signature_deserializer.deserialize(input),
                    )),
                ),
            ),
        )
        .map(|entries: Vec<(Address, Signature)>| entries.into_iter().collect())
        .parse(buffer)
    }
}

impl Default for TransactionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Transaction> for TransactionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Transaction, E> {
        context("Failed Transaction deserialization", |input: &'a [u8]| {
            let (rest, type_id_raw) = self.id_deserializer.deserialize(input)?;
            let type_id = TxTypeId::try_from(type_id_raw).map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Tag,
                ))
            })?;
            match type_id {
                TxTypeId::Send => {
                    let (rest, fee) = self.amount_deserializer.deserialize(rest)?;
                    let (rest, gas) = self.u64_deserializer.deserialize(rest)?;
                    let (rest, inputs) = self.deserialize_inputs(rest)?;
                    let (rest, outputs) = self.deserialize_outputs(rest)?;
                    let (rest, signatures) = self.deserialize_signatures(rest)?;
                    Ok((
                        rest,
                        Transaction::Send(SendTx {
                            fee,
                            gas,
                            inputs,
                            outputs,
                            signatures,
                        }),
                    ))
                }
                TxTypeId::Coinbase => {
                    let (rest, proposer) = self.input_deserializer.deserialize(rest)?;
                    let (rest, outputs) = self.deserialize_outputs(rest)?;
                    let (rest, block_height) = self.u64_deserializer.deserialize(rest)?;
                    let (rest, signatures) = self.deserialize_signatures(rest)?;
                    Ok((
                        rest,
                        Transaction::Coinbase(CoinbaseTx {
                            proposer,
                            outputs,
                            block_height,
                            signatures,
                        }),
                    ))
                }
                TxTypeId::Slash => {
                    let (rest, proposer) = self.input_deserializer.deserialize(rest)?;
                    let (rest, slashed_address) = self.address_deserializer.deserialize(rest)?;
                    let (rest, reserve_sequence) = self.u64_deserializer.deserialize(rest)?;
                    let (rest, slash_proof) = self.proof_deserializer.deserialize(rest)?;
                    let (rest, signatures) = self.deserialize_signatures(rest)?;
                    Ok((
                        rest,
                        Transaction::Slash(SlashTx {
                            proposer,
                            slashed_address,
                            reserve_sequence,
                            slash_proof,
                            signatures,
                        }),
                    ))
                }
            }
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_signature::KeyPair;

    fn test_send_tx() -> Transaction {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        let sender_address = Address::from_public_key(&sender.get_public_key());
        let mut tx = Transaction::Send(SendTx {
            fee: Amount::from_raw(1),
            gas: 10,
            inputs: vec![TxInput {
                address: sender_address,
                public_key: Some(sender.get_public_key()),
                coins: Amount::from_raw(101),
                sequence: 1,
            }],
            outputs: vec![TxOutput {
                address: Address::from_public_key(&recipient.get_public_key()),
                coins: Amount::from_raw(100),
            }],
            signatures: BTreeMap::new(),
        });
        let hash = tx.sign_hash("keel-test").unwrap();
        let signature = sender.sign(&hash).unwrap();
        tx.set_signature(sender_address, signature);
        tx
    }

    #[test]
    fn test_send_roundtrip() {
        let tx = test_send_tx();
        let raw = tx.to_bytes().unwrap();
        let decoded = Transaction::from_bytes(&raw).unwrap();
        assert_eq!(decoded, tx);
        // the signature map travels with the tx
        assert_eq!(decoded.signatures().len(), 1);
    }

    #[test]
    fn test_coinbase_roundtrip() {
        let proposer = KeyPair::generate();
        let proposer_address = Address::from_public_key(&proposer.get_public_key());
        let mut tx = Transaction::Coinbase(CoinbaseTx {
            proposer: TxInput {
                address: proposer_address,
                public_key: Some(proposer.get_public_key()),
                coins: Amount::zero(),
                sequence: 0,
            },
            outputs: vec![TxOutput {
                address: proposer_address,
                coins: Amount::from_raw(1_000),
            }],
            block_height: 42,
            signatures: BTreeMap::new(),
        });
        tx.set_signature(
            proposer_address,
            proposer.sign(&tx.sign_hash("keel-test").unwrap()).unwrap(),
        );
        let decoded = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_slash_roundtrip() {
        let proposer = KeyPair::generate();
        let proposer_address = Address::from_public_key(&proposer.get_public_key());
        let tx = Transaction::Slash(SlashTx {
            proposer: TxInput {
                address: proposer_address,
                public_key: Some(proposer.get_public_key()),
                coins: Amount::zero(),
                sequence: 0,
            },
            slashed_address: Address::from_public_key(&KeyPair::generate().get_public_key()),
            reserve_sequence: 3,
            slash_proof: vec![0xde, 0xad, 0xbe, 0xef],
            signatures: BTreeMap::new(),
        });
        let decoded = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_sign_bytes_exclude_signatures() {
        let mut tx = test_send_tx();
        let before = tx.sign_bytes("keel-test").unwrap();
        tx.set_signature(
            Address::from_public_key(&KeyPair::generate().get_public_key()),
            KeyPair::generate()
                .sign(&Hash::compute_from(b"x"))
                .unwrap(),
        );
        assert_eq!(tx.sign_bytes("keel-test").unwrap(), before);
    }

    #[test]
    fn test_sign_bytes_bind_chain_id() {
        let tx = test_send_tx();
        assert_ne!(
            tx.sign_bytes("keel-test").unwrap(),
            tx.sign_bytes("keel-main").unwrap()
        );
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let mut raw = test_send_tx().to_bytes().unwrap();
        // patch the kind tag to an unassigned value
        raw[0] = 0x7f;
        assert!(Transaction::from_bytes(&raw).is_err());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut raw = test_send_tx().to_bytes().unwrap();
        raw.push(0);
        assert!(Transaction::from_bytes(&raw).is_err());
    }

    #[test]
    fn test_tx_id_is_content_derived() {
        let raw_a = test_send_tx().to_bytes().unwrap();
        let raw_b = test_send_tx().to_bytes().unwrap();
        assert_eq!(TxId::compute_from_raw(&raw_a), TxId::compute_from_raw(&raw_a));
        assert_ne!(TxId::compute_from_raw(&raw_a), TxId::compute_from_raw(&raw_b));
    }
}
