//! Protocol constants shared across the workspace.

/// Maximum number of regular (mempool) transactions included in one block
pub const MAX_REGULAR_TXS_PER_BLOCK: usize = 512;

/// Maximum number of inputs in a single transaction
pub const MAX_TX_INPUTS: u32 = 128;

/// Maximum number of outputs in a single transaction
pub const MAX_TX_OUTPUTS: u32 = 128;

/// Maximum number of signatures attached to a single transaction
pub const MAX_TX_SIGNATURES: u32 = 128;

/// Maximum gas a single transaction may declare
pub const MAX_TX_GAS: u64 = 10_000_000;

/// Maximum byte length of a slash proof
pub const MAX_SLASH_PROOF_LENGTH: u64 = 4096;

/// Maximum byte length of a serialized transaction
pub const MAX_RAW_TX_LENGTH: u64 = 1 << 20;

/// Maximum byte length of a chain id string
pub const MAX_CHAIN_ID_LENGTH: u64 = 64;

/// Maximum number of transactions referenced by one block body
pub const MAX_TXS_PER_BLOCK: u32 = 1024;

/// Maximum number of votes in one serialized vote set
pub const MAX_VOTES_PER_SET: u32 = 4096;

/// Maximum byte length of a voter id string
pub const MAX_VOTER_ID_LENGTH: u64 = 256;

/// Total coin reward distributed to validators by each coinbase transaction,
/// in raw `Amount` units
pub const BLOCK_REWARD_RAW: u64 = 1_000;
