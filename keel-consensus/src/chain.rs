use crate::error::ConsensusError;
use keel_models::block::{Block, BlockId};
use std::collections::{HashMap, VecDeque};

/// In-memory block tree rooted at a genesis block.
///
/// Blocks are indexed by id; every non-root block's parent must already be
/// in the tree when it is added.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: HashMap<BlockId, Block>,
    children: HashMap<BlockId, Vec<BlockId>>,
    root: BlockId,
}

impl Chain {
    /// Creates a chain rooted at `root`
    pub fn new(root: Block) -> Result<Self, ConsensusError> {
        let root_id = root.hash()?;
        let mut blocks = HashMap::new();
        blocks.insert(root_id, root);
        Ok(Chain {
            blocks,
            children: HashMap::new(),
            root: root_id,
        })
    }

    /// The root block
    pub fn root(&self) -> &Block {
        self.blocks
            .get(&self.root)
            .expect("chain root is inserted at construction")
    }

    /// Adds a block whose parent is already in the tree
    pub fn add_block(&mut self, block: Block) -> Result<BlockId, ConsensusError> {
        let id = block.hash()?;
        if self.blocks.contains_key(&id) {
            return Err(ConsensusError::DuplicateBlock(id.to_string()));
        }
        if !self.blocks.contains_key(&block.header.parent) {
            return Err(ConsensusError::OrphanBlock(id.to_string()));
        }
        self.children
            .entry(block.header.parent)
            .or_default()
            .push(id);
        self.blocks.insert(id, block);
        Ok(id)
    }

    /// Looks up a block by id
    pub fn find_block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// The deepest descendant of the root. Ties are broken in favor of the
    /// earliest-added block, which keeps the result deterministic.
    pub fn tip(&self) -> &Block {
        let mut best = self.root;
        let mut best_height = self.root().header.height;
        let mut queue = VecDeque::from([self.root]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.children.get(&current) {
                for child_id in children {
                    let child = &self.blocks[child_id];
                    if child.header.height > best_height {
                        best = *child_id;
                        best_height = child.header.height;
                    }
                    queue.push_back(*child_id);
                }
            }
        }
        &self.blocks[&best]
    }

    /// Number of blocks in the tree
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least its root
    pub fn is_empty(&self) -> bool {
        false
    }
}
