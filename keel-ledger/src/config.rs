use keel_models::account::Account;
use keel_models::address::Address;
use keel_models::amount::Amount;
use keel_models::config::{BLOCK_REWARD_RAW, MAX_REGULAR_TXS_PER_BLOCK};
use std::collections::BTreeMap;

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// chain id mixed into every signature
    pub chain_id: String,
    /// maximum number of mempool transactions reaped into one block
    pub max_regular_txs_per_block: usize,
    /// total coinbase reward distributed per block
    pub block_reward: Amount,
    /// when true, reaped candidates that fail decoding or checking stay in
    /// the mempool for a later block; when false (default) the whole reaped
    /// batch is drained unconditionally
    pub requeue_failed_candidates: bool,
    /// accounts seeded into the genesis state
    pub initial_accounts: BTreeMap<Address, Account>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            chain_id: "keel-main".to_string(),
            max_regular_txs_per_block: MAX_REGULAR_TXS_PER_BLOCK,
            block_reward: Amount::from_raw(BLOCK_REWARD_RAW),
            requeue_failed_candidates: false,
            initial_accounts: BTreeMap::new(),
        }
    }
}
