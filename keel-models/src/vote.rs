//! Consensus votes and the per-epoch vote set.
//!
//! A vote set keeps exactly one vote per voter; a later vote replaces an
//! earlier one only when its epoch is strictly greater (last-write-wins).

use crate::block::{BlockHeader, BlockHeaderDeserializer, BlockHeaderSerializer};
use crate::config::{MAX_VOTER_ID_LENGTH, MAX_VOTES_PER_SET};
use crate::error::ModelsError;
use crate::serialization::{StringDeserializer, StringSerializer};
use keel_serialization::{
    DeserializeError, Deserializer, SerializeError, Serializer, U32VarIntDeserializer,
    U32VarIntSerializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound::Included;

/// A consensus vote: a block header endorsed by a voter at an epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// endorsed block header
    pub block: BlockHeader,
    /// voter identity
    pub voter_id: String,
    /// epoch the vote was cast in
    pub epoch: u64,
}

/// Set of votes keyed by voter id, last-write-wins by epoch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteSet {
    votes: BTreeMap<String, Vote>,
}

impl VoteSet {
    /// Creates an empty vote set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vote. An existing vote from the same voter is replaced only
    /// when the incoming epoch is strictly greater; otherwise the incoming
    /// vote is dropped.
    pub fn add_vote(&mut self, vote: Vote) {
        match self.votes.get(&vote.voter_id) {
            Some(existing) if existing.epoch >= vote.epoch => {}
            _ => {
                self.votes.insert(vote.voter_id.clone(), vote);
            }
        }
    }

    /// All votes, ordered by voter id
    pub fn votes(&self) -> Vec<&Vote> {
        self.votes.values().collect()
    }

    /// Number of votes in the set
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    /// True when the set holds no votes
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Canonical byte form
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelsError> {
        let mut buffer = Vec::new();
        VoteSetSerializer::new().serialize(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Decodes a vote set, requiring the whole buffer to be consumed
    pub fn from_bytes(raw: &[u8]) -> Result<VoteSet, ModelsError> {
        let (rest, set) = VoteSetDeserializer::new()
            .deserialize::<DeserializeError>(raw)
            .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
        if !rest.is_empty() {
            return Err(ModelsError::DeserializeError(
                "trailing bytes after vote set".to_string(),
            ));
        }
        Ok(set)
    }
}

/// Serializer for `Vote`
#[derive(Clone)]
pub struct VoteSerializer {
    header_serializer: BlockHeaderSerializer,
    voter_id_serializer: StringSerializer,
    u64_serializer: U64VarIntSerializer,
}

impl VoteSerializer {
    /// Creates a serializer for `Vote`
    pub const fn new() -> Self {
        Self {
            header_serializer: BlockHeaderSerializer::new(),
            voter_id_serializer: StringSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Default for VoteSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<Vote> for VoteSerializer {
    fn serialize(&self, value: &Vote, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.header_serializer.serialize(&value.block, buffer)?;
        self.voter_id_serializer.serialize(&value.voter_id, buffer)?;
        self.u64_serializer.serialize(&value.epoch, buffer)?;
        Ok(())
    }
}

/// Deserializer for `Vote`
#[derive(Clone)]
pub struct VoteDeserializer {
    header_deserializer: BlockHeaderDeserializer,
    voter_id_deserializer: StringDeserializer,
    u64_deserializer: U64VarIntDeserializer,
}

impl VoteDeserializer {
    /// Creates a deserializer for `Vote`
    pub const fn new() -> Self {
        Self {
            header_deserializer: BlockHeaderDeserializer::new(),
            voter_id_deserializer: StringDeserializer::new(MAX_VOTER_ID_LENGTH),
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for VoteDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Vote> for VoteDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vote, E> {
        context(
            "Failed Vote deserialization",
            tuple((
                context("Failed block deserialization", |input| {
                    self.header_deserializer.deserialize(input)
                }),
                context("Failed voter_id deserialization", |input| {
                    self.voter_id_deserializer.deserialize(input)
                }),
                context("Failed epoch deserialization", |input| {
                    self.u64_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(block, voter_id, epoch)| Vote {
            block,
            voter_id,
            epoch,
        })
        .parse(buffer)
    }
}

/// Serializer for `VoteSet`
#[derive(Clone)]
pub struct VoteSetSerializer {
    u32_serializer: U32VarIntSerializer,
    vote_serializer: VoteSerializer,
}

impl VoteSetSerializer {
    /// Creates a serializer for `VoteSet`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            vote_serializer: VoteSerializer::new(),
        }
    }
}

impl Default for VoteSetSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<VoteSet> for VoteSetSerializer {
    fn serialize(&self, value: &VoteSet, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&(value.votes.len() as u32), buffer)?;
        for vote in value.votes.values() {
            self.vote_serializer.serialize(vote, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `VoteSet`
#[derive(Clone)]
pub struct VoteSetDeserializer {
    count_deserializer: U32VarIntDeserializer,
    vote_deserializer: VoteDeserializer,
}

impl VoteSetDeserializer {
    /// Creates a deserializer for `VoteSet`
    pub const fn new() -> Self {
        Self {
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_VOTES_PER_SET),
            ),
            vote_deserializer: VoteDeserializer::new(),
        }
    }
}

impl Default for VoteSetDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<VoteSet> for VoteSetDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], VoteSet, E> {
        context(
            "Failed VoteSet deserialization",
            length_count(
                context("Failed vote count deserialization", |input| {
                    self.count_deserializer.deserialize(input)
                }),
                context("Failed vote deserialization", |input| {
                    self.vote_deserializer.deserialize(input)
                }),
            ),
        )
        .map(|votes: Vec<Vote>| {
            let mut set = VoteSet::new();
            for vote in votes {
                set.add_vote(vote);
            }
            set
        })
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use keel_hash::Hash;

    fn header(tag: &str) -> BlockHeader {
        BlockHeader {
            chain_id: "keel-test".to_string(),
            epoch: 0,
            height: 1,
            parent: BlockId(Hash::compute_from(b"parent")),
            state_root: Hash::compute_from(tag.as_bytes()),
        }
    }

    #[test]
    fn test_encoding_roundtrip() {
        let mut votes = VoteSet::new();
        votes.add_vote(Vote {
            block: header("a"),
            voter_id: "Alice".to_string(),
            epoch: 1,
        });
        votes.add_vote(Vote {
            block: header("b"),
            voter_id: "Bob".to_string(),
            epoch: 1,
        });

        let decoded = VoteSet::from_bytes(&votes.to_bytes().unwrap()).unwrap();
        let vs = decoded.votes();
        let vs0 = votes.votes();

        assert_eq!(vs.len(), 2);
        assert_eq!(vs[0].voter_id, "Alice");
        assert_eq!(vs[0].block.hash().unwrap(), vs0[0].block.hash().unwrap());
        assert_eq!(vs[1].voter_id, "Bob");
        assert_eq!(vs[1].block.hash().unwrap(), vs0[1].block.hash().unwrap());
    }

    #[test]
    fn test_last_write_wins_by_epoch() {
        let mut votes = VoteSet::new();
        votes.add_vote(Vote {
            block: header("a1"),
            voter_id: "Alice".to_string(),
            epoch: 13,
        });
        votes.add_vote(Vote {
            block: header("a2"),
            voter_id: "Alice".to_string(),
            epoch: 20,
        });
        votes.add_vote(Vote {
            block: header("a1"),
            voter_id: "Bob".to_string(),
            epoch: 20,
        });

        let vs = votes.votes();
        assert_eq!(vs.len(), 2);
        assert_eq!(vs[0].voter_id, "Alice");
        assert_eq!(vs[0].epoch, 20);
        assert_eq!(vs[0].block, header("a2"));
    }

    #[test]
    fn test_equal_or_older_epoch_dropped() {
        let mut votes = VoteSet::new();
        votes.add_vote(Vote {
            block: header("a2"),
            voter_id: "Alice".to_string(),
            epoch: 20,
        });
        votes.add_vote(Vote {
            block: header("a3"),
            voter_id: "Alice".to_string(),
            epoch: 20,
        });
        votes.add_vote(Vote {
            block: header("a1"),
            voter_id: "Alice".to_string(),
            epoch: 13,
        });

        let vs = votes.votes();
        assert_eq!(vs.len(), 1);
        assert_eq!(vs[0].epoch, 20);
        assert_eq!(vs[0].block, header("a2"));
    }
}
