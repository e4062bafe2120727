//! Deterministic transaction validation and execution.
//!
//! One executor serves the three pipeline stages: `screen_tx` validates
//! without mutating, `check_tx` validates and applies against the checked
//! view, `execute_tx` does the same against the delivered view. Given equal
//! view contents and equal tx bytes, every node reaches the same post-state
//! and the same receipt; nothing here reads clocks or iterates unordered
//! containers.

use crate::config::LedgerConfig;
use crate::error::TxError;
use crate::reward::calculate_reward;
use crate::store_view::StoreView;
use keel_consensus::{ConsensusEngine, ValidatorManager};
use keel_models::account::Account;
use keel_models::address::Address;
use keel_models::amount::Amount;
use keel_models::config::MAX_TX_GAS;
use keel_models::transaction::{
    CoinbaseTx, SendTx, SlashIntent, SlashTx, Transaction, TxOutput,
};
use keel_signature::PublicKey;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome information for a processed transaction
#[derive(Debug, Clone)]
pub struct TxReceipt {
    /// short kind name
    pub kind: &'static str,
    /// human-readable outcome note
    pub info: String,
}

impl TxReceipt {
    fn new(kind: &'static str, info: impl Into<String>) -> Self {
        TxReceipt {
            kind,
            info: info.into(),
        }
    }
}

/// Screen / check / execute pipeline over the transaction kinds
pub struct Executor {
    config: LedgerConfig,
    consensus: Arc<dyn ConsensusEngine>,
    valmgr: Arc<dyn ValidatorManager>,
}

impl Executor {
    /// Creates an executor bound to the node's consensus collaborators
    pub fn new(
        config: LedgerConfig,
        consensus: Arc<dyn ConsensusEngine>,
        valmgr: Arc<dyn ValidatorManager>,
    ) -> Self {
        Executor {
            config,
            consensus,
            valmgr,
        }
    }

    /// Cheap admission validation against the screened view. Never mutates.
    pub fn screen_tx(&self, view: &StoreView, tx: &Transaction) -> Result<TxReceipt, TxError> {
        match tx {
            Transaction::Send(send) => {
                self.validate_send(view, tx, send, None)?;
                Ok(TxReceipt::new("send", "screened"))
            }
            Transaction::Coinbase(_) | Transaction::Slash(_) => Err(TxError::UnauthorizedKind),
        }
    }

    /// Full validation applied to the checked view, as if executed
    pub fn check_tx(&self, view: &mut StoreView, tx: &Transaction) -> Result<TxReceipt, TxError> {
        self.process_tx(view, tx)
    }

    /// Full execution against the delivered view
    pub fn execute_tx(
        &self,
        view: &mut StoreView,
        tx: &Transaction,
    ) -> Result<TxReceipt, TxError> {
        self.process_tx(view, tx)
    }

    fn process_tx(&self, view: &mut StoreView, tx: &Transaction) -> Result<TxReceipt, TxError> {
        match tx {
            Transaction::Send(send) => self.process_send(view, tx, send),
            Transaction::Coinbase(coinbase) => self.process_coinbase(view, tx, coinbase),
            Transaction::Slash(slash) => self.process_slash(view, tx, slash),
        }
    }

    // ---- send ----

    /// Validates a send without mutating the view. When an intent sink is
    /// given, a valid signature over an already-consumed sequence number is
    /// recorded as double-spend evidence.
    fn validate_send(
        &self,
        view: &StoreView,
        tx: &Transaction,
        send: &SendTx,
        mut intents: Option<&mut Vec<SlashIntent>>,
    ) -> Result<(), TxError> {
        if send.gas > MAX_TX_GAS {
            return Err(TxError::GasLimitExceeded(send.gas));
        }
        if send.inputs.is_empty() {
            return Err(TxError::InvalidCoinFlow("no inputs".to_string()));
        }

        // balanced, overflow-free coin flow: sum(in) == sum(out) + fee
        let mut input_sum = Amount::zero();
        for input in &send.inputs {
            input_sum = input_sum
                .checked_add(input.coins)
                .ok_or_else(|| TxError::InvalidCoinFlow("input overflow".to_string()))?;
        }
        let mut output_sum = send.fee;
        for output in &send.outputs {
            output_sum = output_sum
                .checked_add(output.coins)
                .ok_or_else(|| TxError::InvalidCoinFlow("output overflow".to_string()))?;
        }
        if input_sum != output_sum {
            return Err(TxError::InvalidCoinFlow(format!(
                "inputs {} != outputs + fee {}",
                input_sum, output_sum
            )));
        }

        let sign_hash = self
            .sign_hash(tx)
            .map_err(|err| TxError::Internal(err.to_string()))?;

        let mut seen = BTreeSet::new();
        for input in &send.inputs {
            if !seen.insert(input.address) {
                return Err(TxError::InvalidCoinFlow(format!(
                    "duplicate input address {}",
                    input.address
                )));
            }
            let account = view
                .get(&input.address)
                .ok_or_else(|| TxError::UnknownAccount(input.address.to_string()))?;
            let public_key = resolve_public_key(&account, input.public_key, &input.address)?;
            verify_tx_signature(tx, &sign_hash, &input.address, &public_key)?;

            let expected = account.sequence + 1;
            if input.sequence != expected {
                if input.sequence <= account.sequence {
                    // a correctly signed replay of a spent sequence is
                    // double-spend evidence
                    if let Some(sink) = intents.as_deref_mut() {
                        sink.push(SlashIntent {
                            address: input.address,
                            reserve_sequence: input.sequence,
                            proof: tx
                                .sign_bytes(&self.config.chain_id)
                                .map_err(|err| TxError::Internal(err.to_string()))?,
                        });
                    }
                }
                return Err(TxError::SequenceMismatch(
                    input.address.to_string(),
                    expected,
                    input.sequence,
                ));
            }
            if account.balance < input.coins {
                return Err(TxError::InsufficientCoins(input.address.to_string()));
            }
        }
        Ok(())
    }

    fn process_send(
        &self,
        view: &mut StoreView,
        tx: &Transaction,
        send: &SendTx,
    ) -> Result<TxReceipt, TxError> {
        let mut intents = Vec::new();
        let validation = self.validate_send(view, tx, send, Some(&mut intents));
        for intent in intents {
            view.add_slash_intent(intent);
        }
        validation?;

        for input in &send.inputs {
            let mut account = view
                .get(&input.address)
                .ok_or_else(|| TxError::UnknownAccount(input.address.to_string()))?;
            account.balance = account
                .balance
                .checked_sub(input.coins)
                .ok_or_else(|| TxError::Internal("validated balance underflow".to_string()))?;
            account.sequence = input.sequence;
            if account.public_key.is_none() {
                account.public_key = input.public_key;
            }
            view.set(input.address, account)
                .map_err(|err| TxError::Internal(err.to_string()))?;
        }
        for output in &send.outputs {
            credit(view, &output.address, output.coins)?;
        }
        // the fee (inputs minus outputs) is destroyed
        Ok(TxReceipt::new("send", "executed"))
    }

    // ---- coinbase ----

    fn process_coinbase(
        &self,
        view: &mut StoreView,
        tx: &Transaction,
        coinbase: &CoinbaseTx,
    ) -> Result<TxReceipt, TxError> {
        let epoch = self.consensus.epoch();
        let proposer = self.valmgr.proposer_for_epoch(epoch);
        if coinbase.proposer.address != proposer.address() {
            return Err(TxError::InvalidProposer(
                coinbase.proposer.address.to_string(),
                proposer.address().to_string(),
            ));
        }
        let sign_hash = self
            .sign_hash(tx)
            .map_err(|err| TxError::Internal(err.to_string()))?;
        verify_tx_signature(tx, &sign_hash, &proposer.address(), &proposer.public_key())?;

        if coinbase.block_height != view.height() {
            return Err(TxError::InvalidBlockHeight(
                coinbase.block_height,
                view.height(),
            ));
        }

        let validators: Vec<Address> = self
            .valmgr
            .validator_set_for_epoch(epoch)
            .validators()
            .iter()
            .map(|validator| validator.address())
            .collect();
        let expected = calculate_reward(view, &validators, self.config.block_reward);
        let actual: BTreeMap<Address, Amount> = coinbase
            .outputs
            .iter()
            .map(|output| (output.address, output.coins))
            .collect();
        if actual != expected || actual.len() != coinbase.outputs.len() {
            return Err(TxError::InvalidRewardOutputs);
        }

        for TxOutput { address, coins } in &coinbase.outputs {
            credit(view, address, *coins)?;
        }
        Ok(TxReceipt::new("coinbase", "executed"))
    }

    // ---- slash ----

    fn process_slash(
        &self,
        view: &mut StoreView,
        tx: &Transaction,
        slash: &SlashTx,
    ) -> Result<TxReceipt, TxError> {
        let epoch = self.consensus.epoch();
        let proposer = self.valmgr.proposer_for_epoch(epoch);
        if slash.proposer.address != proposer.address() {
            return Err(TxError::InvalidProposer(
                slash.proposer.address.to_string(),
                proposer.address().to_string(),
            ));
        }
        let sign_hash = self
            .sign_hash(tx)
            .map_err(|err| TxError::Internal(err.to_string()))?;
        verify_tx_signature(tx, &sign_hash, &proposer.address(), &proposer.public_key())?;

        if slash.slash_proof.is_empty() {
            return Err(TxError::InvalidSlashEvidence("empty proof".to_string()));
        }
        let mut slashed = view
            .get(&slash.slashed_address)
            .ok_or_else(|| TxError::UnknownAccount(slash.slashed_address.to_string()))?;
        if slash.reserve_sequence > slashed.sequence {
            return Err(TxError::InvalidSlashEvidence(format!(
                "evidence sequence {} beyond account sequence {}",
                slash.reserve_sequence, slashed.sequence
            )));
        }

        let confiscated = slashed
            .balance
            .checked_add(slashed.stake)
            .ok_or_else(|| TxError::Internal("confiscation overflow".to_string()))?;
        slashed.balance = Amount::zero();
        slashed.stake = Amount::zero();
        view.set(slash.slashed_address, slashed)
            .map_err(|err| TxError::Internal(err.to_string()))?;
        credit(view, &slash.proposer.address, confiscated)?;
        Ok(TxReceipt::new("slash", "executed"))
    }

    fn sign_hash(&self, tx: &Transaction) -> Result<keel_hash::Hash, keel_models::ModelsError> {
        tx.sign_hash(&self.config.chain_id)
    }
}

fn resolve_public_key(
    account: &Account,
    embedded: Option<PublicKey>,
    address: &Address,
) -> Result<PublicKey, TxError> {
    let public_key = account
        .public_key
        .or(embedded)
        .ok_or_else(|| TxError::BadSignature(address.to_string()))?;
    // an embedded key must actually be the key of this address
    if account.public_key.is_none() && Address::from_public_key(&public_key) != *address {
        return Err(TxError::BadSignature(address.to_string()));
    }
    Ok(public_key)
}

fn verify_tx_signature(
    tx: &Transaction,
    sign_hash: &keel_hash::Hash,
    address: &Address,
    public_key: &PublicKey,
) -> Result<(), TxError> {
    let signature = tx
        .signatures()
        .get(address)
        .ok_or_else(|| TxError::BadSignature(address.to_string()))?;
    public_key
        .verify_signature(sign_hash, signature)
        .map_err(|_| TxError::BadSignature(address.to_string()))
}

fn credit(view: &mut StoreView, address: &Address, coins: Amount) -> Result<(), TxError> {
    let mut account = view.get(address).unwrap_or_default();
    account.balance = account
        .balance
        .checked_add(coins)
        .ok_or_else(|| TxError::InvalidCoinFlow(format!("balance overflow on {}", address)))?;
    view.set(*address, account)
        .map_err(|err| TxError::Internal(err.to_string()))?;
    Ok(())
}
