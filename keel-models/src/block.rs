use crate::config::{MAX_CHAIN_ID_LENGTH, MAX_RAW_TX_LENGTH, MAX_TXS_PER_BLOCK};
use crate::error::ModelsError;
use crate::serialization::{
    StringDeserializer, StringSerializer, VecU8Deserializer, VecU8Serializer,
};
use keel_hash::{Hash, HashDeserializer, HashSerializer};
use keel_serialization::{
    DeserializeError, Deserializer, SerializeError, Serializer, U32VarIntDeserializer,
    U32VarIntSerializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;
use std::str::FromStr;

/// Block identifier: the hash of the serialized header
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BlockId(pub Hash);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.to_bs58_check())
    }
}

impl FromStr for BlockId {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BlockId(Hash::from_str(s)?))
    }
}

impl BlockId {
    /// The id used as parent by a chain's root block
    pub fn zero() -> Self {
        BlockId(Hash::zero())
    }

    /// The underlying hash
    pub fn get_hash(&self) -> &Hash {
        &self.0
    }
}

/// Block header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// chain this block belongs to
    pub chain_id: String,
    /// consensus epoch the block was proposed in
    pub epoch: u64,
    /// block height, root is 0
    pub height: u64,
    /// id of the parent block
    pub parent: BlockId,
    /// state root the ledger must reach after applying the block
    pub state_root: Hash,
}

impl BlockHeader {
    /// The header's id, a pure function of its serialized contents
    pub fn hash(&self) -> Result<BlockId, ModelsError> {
        let mut buffer = Vec::new();
        BlockHeaderSerializer::new().serialize(self, &mut buffer)?;
        Ok(BlockId(Hash::compute_from(&buffer)))
    }
}

impl std::fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "height: {}, epoch: {}, parent: {}",
            self.height, self.epoch, self.parent
        )
    }
}

/// A block: header plus the raw transactions it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// header
    pub header: BlockHeader,
    /// raw transactions, in application order
    pub txs: Vec<Vec<u8>>,
}

impl Block {
    /// The block's id (hash of its header)
    pub fn hash(&self) -> Result<BlockId, ModelsError> {
        self.header.hash()
    }

    /// Canonical byte form
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelsError> {
        let mut buffer = Vec::new();
        BlockSerializer::new().serialize(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Decodes a block, requiring the whole buffer to be consumed
    pub fn from_bytes(raw: &[u8]) -> Result<Block, ModelsError> {
        let (rest, block) = BlockDeserializer::new()
            .deserialize::<DeserializeError>(raw)
            .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
        if !rest.is_empty() {
            return Err(ModelsError::DeserializeError(
                "trailing bytes after block".to_string(),
            ));
        }
        Ok(block)
    }
}

/// Serializer for `BlockHeader`
#[derive(Clone)]
pub struct BlockHeaderSerializer {
    chain_id_serializer: StringSerializer,
    u64_serializer: U64VarIntSerializer,
    hash_serializer: HashSerializer,
}

impl BlockHeaderSerializer {
    /// Creates a serializer for `BlockHeader`
    pub const fn new() -> Self {
        Self {
            chain_id_serializer: StringSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Default for BlockHeaderSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<BlockHeader> for BlockHeaderSerializer {
    fn serialize(&self, value: &BlockHeader, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.chain_id_serializer.serialize(&value.chain_id, buffer)?;
        self.u64_serializer.serialize(&value.epoch, buffer)?;
        self.u64_serializer.serialize(&value.height, buffer)?;
        self.hash_serializer.serialize(&value.parent.0, buffer)?;
        self.hash_serializer.serialize(&value.state_root, buffer)?;
        Ok(())
    }
}

/// Deserializer for `BlockHeader`
#[derive(Clone)]
pub struct BlockHeaderDeserializer {
    chain_id_deserializer: StringDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    hash_deserializer: HashDeserializer,
}

impl BlockHeaderDeserializer {
    /// Creates a deserializer for `BlockHeader`
    pub const fn new() -> Self {
        Self {
            chain_id_deserializer: StringDeserializer::new(MAX_CHAIN_ID_LENGTH),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Default for BlockHeaderDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockHeader> for BlockHeaderDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeader, E> {
        context(
            "Failed BlockHeader deserialization",
            tuple((
                context("Failed chain_id deserialization", |input| {
                    self.chain_id_deserializer.deserialize(input)
                }),
                context("Failed epoch deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
                context("Failed height deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
                context("Failed parent deserialization", |input| {
                    self.hash_deserializer.deserialize(input)
                }),
                context("Failed state_root deserialization", |input| {
                    self.hash_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(chain_id, epoch, height, parent, state_root)| BlockHeader {
            chain_id,
            epoch,
            height,
            parent: BlockId(parent),
            state_root,
        })
        .parse(buffer)
    }
}

/// Serializer for `Block`
#[derive(Clone)]
pub struct BlockSerializer {
    header_serializer: BlockHeaderSerializer,
    u32_serializer: U32VarIntSerializer,
    tx_serializer: VecU8Serializer,
}

impl BlockSerializer {
    /// Creates a serializer for `Block`
    pub const fn new() -> Self {
        Self {
            header_serializer: BlockHeaderSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            tx_serializer: VecU8Serializer::new(),
        }
    }
}

impl Default for BlockSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<Block> for BlockSerializer {
    fn serialize(&self, value: &Block, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.header_serializer.serialize(&value.header, buffer)?;
        self.u32_serializer
            .serialize(&(value.txs.len() as u32), buffer)?;
        for tx in &value.txs {
            self.tx_serializer.serialize(tx, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `Block`
#[derive(Clone)]
pub struct BlockDeserializer {
    header_deserializer: BlockHeaderDeserializer,
    tx_count_deserializer: U32VarIntDeserializer,
    tx_deserializer: VecU8Deserializer,
}

impl BlockDeserializer {
    /// Creates a deserializer for `Block`
    pub const fn new() -> Self {
        Self {
            header_deserializer: BlockHeaderDeserializer::new(),
            tx_count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_TXS_PER_BLOCK),
            ),
            tx_deserializer: VecU8Deserializer::new(MAX_RAW_TX_LENGTH),
        }
    }
}

impl Default for BlockDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Block> for BlockDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Block, E> {
        context(
            "Failed Block deserialization",
            tuple((
                context("Failed header deserialization", |input| {
                    self.header_deserializer.deserialize(input)
                }),
                context(
                    "Failed txs deserialization",
                    length_count(
                        context("Failed tx count deserialization", |input| {
                            self.tx_count_deserializer.deserialize(input)
                        }),
                        context("Failed tx deserialization", |input| {
                            self.tx_deserializer.deserialize(input)
                        }),
                    ),
                ),
            )),
        )
        .map(|(header, txs)| Block { header, txs })
        .parse(buffer)
    }
}
