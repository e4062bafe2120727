//! Persisted consensus state.
//!
//! The engine keeps its epoch, last vote height, highest
//! committed-certificate block and the current epoch's vote set in the
//! database so a restarted node resumes voting where it left off. Every
//! setter persists immediately; `load` restores the whole state from the
//! same database.

use crate::chain::Chain;
use crate::error::ConsensusError;
use keel_db::SharedDb;
use keel_hash::Hash;
use keel_models::block::{Block, BlockId};
use keel_models::vote::{Vote, VoteSet};
use keel_serialization::{
    DeserializeError, Deserializer, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use std::ops::Bound::Included;
use tracing::debug;

const EPOCH_KEY: &[u8] = b"consensus/epoch";
const LAST_VOTE_HEIGHT_KEY: &[u8] = b"consensus/last_vote_height";
const HIGHEST_CC_BLOCK_KEY: &[u8] = b"consensus/highest_cc_block";
const EPOCH_VOTES_KEY: &[u8] = b"consensus/epoch_votes";

/// The consensus engine's persisted voting state
pub struct ConsensusState {
    db: SharedDb,
    chain: Chain,
    epoch: u64,
    last_vote_height: u64,
    highest_cc_block: Option<BlockId>,
    epoch_votes: VoteSet,
}

impl ConsensusState {
    /// Creates a fresh state over `db` and `chain`; nothing is read until
    /// `load` is called.
    pub fn new(db: SharedDb, chain: Chain) -> Self {
        ConsensusState {
            db,
            chain,
            epoch: 0,
            last_vote_height: 0,
            highest_cc_block: None,
            epoch_votes: VoteSet::new(),
        }
    }

    /// Restores every persisted field from the database
    pub fn load(&mut self) -> Result<(), ConsensusError> {
        if let Some(raw) = self.db.get(EPOCH_KEY)? {
            self.epoch = decode_u64(&raw)?;
        }
        if let Some(raw) = self.db.get(LAST_VOTE_HEIGHT_KEY)? {
            self.last_vote_height = decode_u64(&raw)?;
        }
        if let Some(raw) = self.db.get(HIGHEST_CC_BLOCK_KEY)? {
            let bytes: [u8; keel_hash::HASH_SIZE_BYTES] = raw.as_slice().try_into().map_err(
                |_| {
                    keel_db::DbError::CorruptedValue(
                        String::from_utf8_lossy(HIGHEST_CC_BLOCK_KEY).into_owned(),
                    )
                },
            )?;
            self.highest_cc_block = Some(BlockId(Hash::from_bytes(&bytes)));
        }
        if let Some(raw) = self.db.get(EPOCH_VOTES_KEY)? {
            self.epoch_votes = VoteSet::from_bytes(&raw)?;
        }
        debug!(
            "consensus state loaded: epoch {}, last vote height {}",
            self.epoch, self.last_vote_height
        );
        Ok(())
    }

    /// Sets and persists the current epoch
    pub fn set_epoch(&mut self, epoch: u64) -> Result<(), ConsensusError> {
        self.epoch = epoch;
        self.db.put(EPOCH_KEY, &encode_u64(epoch)?)?;
        Ok(())
    }

    /// Current epoch
    pub fn get_epoch(&self) -> u64 {
        self.epoch
    }

    /// Sets and persists the height of the last block voted for
    pub fn set_last_vote_height(&mut self, height: u64) -> Result<(), ConsensusError> {
        self.last_vote_height = height;
        self.db.put(LAST_VOTE_HEIGHT_KEY, &encode_u64(height)?)?;
        Ok(())
    }

    /// Height of the last block voted for
    pub fn get_last_vote_height(&self) -> u64 {
        self.last_vote_height
    }

    /// Sets and persists the highest block with a committed certificate
    pub fn set_highest_cc_block(&mut self, block: &Block) -> Result<(), ConsensusError> {
        let id = block.hash()?;
        self.highest_cc_block = Some(id);
        self.db
            .put(HIGHEST_CC_BLOCK_KEY, id.get_hash().to_bytes())?;
        Ok(())
    }

    /// The highest block with a committed certificate, if any
    pub fn get_highest_cc_block(&self) -> Option<&Block> {
        self.highest_cc_block
            .as_ref()
            .and_then(|id| self.chain.find_block(id))
    }

    /// Records a vote in the epoch vote set (last-write-wins by epoch) and
    /// persists the updated set
    pub fn add_vote(&mut self, vote: Vote) -> Result<(), ConsensusError> {
        self.epoch_votes.add_vote(vote);
        self.db.put(EPOCH_VOTES_KEY, &self.epoch_votes.to_bytes()?)?;
        Ok(())
    }

    /// The current epoch's vote set
    pub fn get_epoch_votes(&self) -> &VoteSet {
        &self.epoch_votes
    }

    /// The deepest block of the chain
    pub fn get_tip(&self) -> &Block {
        self.chain.tip()
    }

    /// The last finalized block: the parent of the highest CC block, or the
    /// chain root when no certificate is known yet
    pub fn get_last_finalized_block(&self) -> &Block {
        match self.get_highest_cc_block() {
            Some(cc) => self
                .chain
                .find_block(&cc.header.parent)
                .unwrap_or_else(|| self.chain.root()),
            None => self.chain.root(),
        }
    }

    /// The chain this state tracks
    pub fn chain(&self) -> &Chain {
        &self.chain
    }
}

fn encode_u64(value: u64) -> Result<Vec<u8>, ConsensusError> {
    let mut buffer = Vec::new();
    U64VarIntSerializer::new()
        .serialize(&value, &mut buffer)
        .map_err(keel_models::ModelsError::from)?;
    Ok(buffer)
}

fn decode_u64(raw: &[u8]) -> Result<u64, ConsensusError> {
    let (_, value) = U64VarIntDeserializer::new(Included(0), Included(u64::MAX))
        .deserialize::<DeserializeError>(raw)
        .map_err(|err| keel_models::ModelsError::DeserializeError(err.to_string()))?;
    Ok(value)
}
