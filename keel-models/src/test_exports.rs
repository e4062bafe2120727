//! Test fixtures shared by downstream crates' test suites.

use crate::block::{Block, BlockHeader, BlockId};
use keel_hash::Hash;
use std::collections::HashMap;

/// Builds named, deterministic test blocks and remembers them by name, so a
/// test can reference "A1" repeatedly and always get the same block.
pub struct TestBlockFactory {
    chain_id: String,
    blocks: HashMap<String, Block>,
}

impl TestBlockFactory {
    /// Creates a factory for the given chain id
    pub fn new(chain_id: &str) -> Self {
        TestBlockFactory {
            chain_id: chain_id.to_string(),
            blocks: HashMap::new(),
        }
    }

    /// Creates (or returns the existing) root block `name` at height 0
    pub fn create_root(&mut self, name: &str) -> Block {
        if let Some(block) = self.blocks.get(name) {
            return block.clone();
        }
        let block = Block {
            header: BlockHeader {
                chain_id: self.chain_id.clone(),
                epoch: 0,
                height: 0,
                parent: BlockId::zero(),
                state_root: Hash::compute_from(name.as_bytes()),
            },
            txs: vec![],
        };
        self.blocks.insert(name.to_string(), block.clone());
        block
    }

    /// Creates (or returns the existing) block `name` as a child of
    /// `parent_name`. The parent is created as a root when unknown.
    pub fn create_block(&mut self, name: &str, parent_name: &str) -> Block {
        if let Some(block) = self.blocks.get(name) {
            return block.clone();
        }
        let parent = match self.blocks.get(parent_name) {
            Some(parent) => parent.clone(),
            None => self.create_root(parent_name),
        };
        let block = Block {
            header: BlockHeader {
                chain_id: self.chain_id.clone(),
                epoch: 0,
                height: parent.header.height + 1,
                parent: parent.hash().expect("test block hashing failed"),
                state_root: Hash::compute_from(name.as_bytes()),
            },
            txs: vec![],
        };
        self.blocks.insert(name.to_string(), block.clone());
        block
    }

    /// Returns the block previously created under `name`
    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.get(name)
    }
}
