//! The public ledger operations.
//!
//! A single readers-writer lock guards the ledger state: screening and
//! snapshots share it, proposal / application / reset / finalization take
//! it exclusively. Snapshots are independent copies so callers read them
//! without holding the lock.

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::executor::{Executor, TxReceipt};
use crate::ledger_state::LedgerState;
use crate::reward::calculate_reward;
use crate::store_view::StoreView;
use keel_consensus::{ConsensusEngine, Validator, ValidatorManager};
use keel_db::SharedDb;
use keel_hash::Hash;
use keel_models::address::Address;
use keel_models::amount::Amount;
use keel_models::transaction::{CoinbaseTx, SlashTx, Transaction, TxId, TxInput, TxOutput};
use keel_pool::MempoolController;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The ledger façade
pub struct Ledger {
    config: LedgerConfig,
    consensus: Arc<dyn ConsensusEngine>,
    valmgr: Arc<dyn ValidatorManager>,
    mempool: Arc<dyn MempoolController>,
    state: RwLock<LedgerState>,
    executor: Executor,
}

impl Ledger {
    /// Creates a ledger over `db`, wired to its consensus collaborators and
    /// the mempool
    pub fn new(
        config: LedgerConfig,
        db: SharedDb,
        consensus: Arc<dyn ConsensusEngine>,
        valmgr: Arc<dyn ValidatorManager>,
        mempool: Arc<dyn MempoolController>,
    ) -> Result<Self, LedgerError> {
        let state = LedgerState::new(&config.chain_id, db, &config.initial_accounts)?;
        let executor = Executor::new(config.clone(), consensus.clone(), valmgr.clone());
        Ok(Ledger {
            config,
            consensus,
            valmgr,
            mempool,
            state: RwLock::new(state),
            executor,
        })
    }

    /// Snapshot of the screened view, owned by the caller
    pub fn get_screened_snapshot(&self) -> StoreView {
        self.state.read().screened().copy()
    }

    /// Snapshot of the delivered view, owned by the caller
    pub fn get_delivered_snapshot(&self) -> StoreView {
        self.state.read().delivered().copy()
    }

    /// Snapshot of the finalized view, owned by the caller
    pub fn get_finalized_snapshot(&self) -> StoreView {
        self.state.read().finalized().copy()
    }

    /// Screens a raw transaction for mempool admission. Validator-only
    /// kinds are rejected before any further validation; nothing is
    /// mutated.
    pub fn screen_tx(&self, raw: &[u8]) -> Result<TxReceipt, LedgerError> {
        let tx = Transaction::from_bytes(raw)
            .map_err(|err| LedgerError::DecodeError(err.to_string()))?;
        if tx.is_validator_only() {
            return Err(LedgerError::UnauthorizedTx(tx.kind().to_string()));
        }
        let state = self.state.read();
        self.executor
            .screen_tx(state.screened(), &tx)
            .map_err(LedgerError::CheckFailed)
    }

    /// Collects and checks the transactions for the next block: the
    /// coinbase first, then one slash tx per recorded intent, then the
    /// reaped mempool candidates. Candidates failing decode or check are
    /// dropped; the returned root is the checked view's hash after all
    /// surviving candidates were applied.
    pub fn propose_block_txs(&self) -> Result<(Hash, Vec<Vec<u8>>), LedgerError> {
        let mut state = self.state.write();

        let mut raw_candidates: Vec<Vec<u8>> = Vec::new();
        self.add_special_transactions(&mut state, &mut raw_candidates);

        let reaped = self.mempool.reap(self.config.max_regular_txs_per_block);
        raw_candidates.extend(reaped.iter().cloned());

        let mut block_raw_txs: Vec<Vec<u8>> = Vec::new();
        for raw_candidate in &raw_candidates {
            let tx = match Transaction::from_bytes(raw_candidate) {
                Ok(tx) => tx,
                Err(err) => {
                    debug!("dropping undecodable block candidate: {}", err);
                    continue;
                }
            };
            match self.executor.check_tx(state.checked_mut(), &tx) {
                Ok(_) => block_raw_txs.push(raw_candidate.clone()),
                Err(err) => {
                    warn!("transaction check failed: {}, tx: {}", err, tx);
                    continue;
                }
            }
        }

        let state_root_hash = state.checked().hash();

        if self.config.requeue_failed_candidates {
            let included: HashSet<TxId> = block_raw_txs
                .iter()
                .map(|raw| TxId::compute_from_raw(raw))
                .collect();
            let drained: Vec<Vec<u8>> = reaped
                .into_iter()
                .filter(|raw| included.contains(&TxId::compute_from_raw(raw)))
                .collect();
            self.mempool.update(&drained);
        } else {
            self.mempool.update(&reaped);
        }

        Ok((state_root_hash, block_raw_txs))
    }

    /// Applies a block's transactions to the delivered view. Any failure
    /// restores the exact pre-batch `(height, root)` and surfaces the
    /// error; on success the post-batch root must equal `expected_root`,
    /// the store is committed and the applied entries leave the mempool.
    pub fn apply_block_txs(
        &self,
        block_raw_txs: &[Vec<u8>],
        expected_root: Hash,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.write();

        let curr_height = state.delivered().height();
        let curr_root = state.delivered().hash();

        for (index, raw_tx) in block_raw_txs.iter().enumerate() {
            let tx = match Transaction::from_bytes(raw_tx) {
                Ok(tx) => tx,
                Err(err) => {
                    state.reset(curr_height, curr_root)?;
                    return Err(LedgerError::DecodeError(format!(
                        "block tx {}: {}",
                        index, err
                    )));
                }
            };
            if let Err(err) = self.executor.execute_tx(state.delivered_mut(), &tx) {
                state.reset(curr_height, curr_root)?;
                return Err(LedgerError::ExecuteFailed(err));
            }
        }

        let new_root = state.delivered().hash();
        if new_root != expected_root {
            state.reset(curr_height, curr_root)?;
            return Err(LedgerError::StateRootMismatch(
                new_root.to_string(),
                expected_root.to_string(),
            ));
        }

        state
            .commit()
            .map_err(|err| LedgerError::CommitFailed(err.to_string()))?;
        self.mempool.update(block_raw_txs);
        Ok(())
    }

    /// Moves the working state to a previously committed `(height, root)`
    pub fn reset_state(&self, height: u64, root: Hash) -> Result<(), LedgerError> {
        self.state.write().reset(height, root)
    }

    /// Records `(height, root)` as finalized; the finalized height never
    /// decreases
    pub fn finalize_state(&self, height: u64, root: Hash) -> Result<(), LedgerError> {
        self.state.write().finalize(height, root)
    }

    /// Height of the block currently being built
    pub fn height(&self) -> u64 {
        self.state.read().height()
    }

    // Assembles the proposer-injected transactions from the checked view:
    // one coinbase, then one slash tx per recorded intent. Assembly errors
    // are logged and skipped so one bad special tx never aborts a proposal.
    fn add_special_transactions(&self, state: &mut LedgerState, raw_txs: &mut Vec<Vec<u8>>) {
        let epoch = self.consensus.epoch();
        let proposer = self.valmgr.proposer_for_epoch(epoch);
        let validators: Vec<Address> = self
            .valmgr
            .validator_set_for_epoch(epoch)
            .validators()
            .iter()
            .map(|validator| validator.address())
            .collect();

        self.add_coinbase_tx(state, &proposer, &validators, raw_txs);
        self.add_slash_txs(state, &proposer, raw_txs);
    }

    fn add_coinbase_tx(
        &self,
        state: &mut LedgerState,
        proposer: &Validator,
        validators: &[Address],
        raw_txs: &mut Vec<Vec<u8>>,
    ) {
        let reward_map = calculate_reward(state.checked(), validators, self.config.block_reward);
        let outputs: Vec<TxOutput> = reward_map
            .into_iter()
            .map(|(address, coins)| TxOutput { address, coins })
            .collect();

        let mut coinbase_tx = Transaction::Coinbase(CoinbaseTx {
            proposer: proposer_input(proposer),
            outputs,
            block_height: state.height(),
            signatures: BTreeMap::new(),
        });
        if let Err(err) = self.sign_transaction(&mut coinbase_tx) {
            error!("failed to add coinbase transaction: {}", err);
            return;
        }
        match coinbase_tx.to_bytes() {
            Ok(raw) => {
                debug!("adding coinbase transaction: {}", coinbase_tx);
                raw_txs.push(raw);
            }
            Err(err) => error!("failed to add coinbase transaction: {}", err),
        }
    }

    fn add_slash_txs(
        &self,
        state: &mut LedgerState,
        proposer: &Validator,
        raw_txs: &mut Vec<Vec<u8>>,
    ) {
        for intent in state.checked().get_slash_intents().to_vec() {
            let mut slash_tx = Transaction::Slash(SlashTx {
                proposer: proposer_input(proposer),
                slashed_address: intent.address,
                reserve_sequence: intent.reserve_sequence,
                slash_proof: intent.proof,
                signatures: BTreeMap::new(),
            });
            if let Err(err) = self.sign_transaction(&mut slash_tx) {
                error!("failed to add slash transaction: {}", err);
                continue;
            }
            match slash_tx.to_bytes() {
                Ok(raw) => {
                    debug!("adding slash transaction: {}", slash_tx);
                    raw_txs.push(raw);
                }
                Err(err) => error!("failed to add slash transaction: {}", err),
            }
        }
        state.checked_mut().clear_slash_intents();
    }

    fn sign_transaction(&self, tx: &mut Transaction) -> Result<(), LedgerError> {
        let keypair = self.consensus.keypair();
        let hash = tx.sign_hash(&self.config.chain_id)?;
        let signature = keypair
            .sign(&hash)
            .map_err(keel_models::ModelsError::from)?;
        let address = Address::from_public_key(&keypair.get_public_key());
        tx.set_signature(address, signature);
        Ok(())
    }
}

fn proposer_input(proposer: &Validator) -> TxInput {
    TxInput {
        address: proposer.address(),
        public_key: Some(proposer.public_key()),
        coins: Amount::zero(),
        sequence: 0,
    }
}
