use super::tools::{addr, TestConsensusEngine};
use crate::config::LedgerConfig;
use crate::error::TxError;
use crate::executor::Executor;
use crate::store_view::StoreView;
use keel_consensus::{RoundRobinValidatorManager, Validator, ValidatorSet};
use keel_db::MemDb;
use keel_models::account::Account;
use keel_models::amount::Amount;
use keel_models::config::MAX_TX_GAS;
use keel_models::transaction::{CoinbaseTx, SendTx, Transaction, TxInput, TxOutput};
use keel_signature::KeyPair;
use std::collections::BTreeMap;
use std::sync::Arc;

struct ExecutorSetup {
    executor: Executor,
    view: StoreView,
    proposer: KeyPair,
    alice: KeyPair,
    bob: KeyPair,
    config: LedgerConfig,
}

fn executor_setup() -> ExecutorSetup {
    let proposer = KeyPair::generate();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let config = LedgerConfig {
        chain_id: "keel-test".to_string(),
        ..Default::default()
    };
    let consensus = Arc::new(TestConsensusEngine::new(0, proposer.clone()));
    let valmgr = Arc::new(
        RoundRobinValidatorManager::new(ValidatorSet::new(vec![Validator::new(
            proposer.get_public_key(),
        )]))
        .expect("validator set is non-empty"),
    );
    let executor = Executor::new(config.clone(), consensus, valmgr);

    let mut view = StoreView::new(MemDb::shared());
    view.set(addr(&alice), Account::with_balance(Amount::from_raw(1_000)))
        .unwrap();
    view.set_height(1);

    ExecutorSetup {
        executor,
        view,
        proposer,
        alice,
        bob,
        config,
    }
}

fn build_send(
    setup: &ExecutorSetup,
    coins: u64,
    fee: u64,
    gas: u64,
    sequence: u64,
    signer: &KeyPair,
) -> Transaction {
    let sender_address = addr(&setup.alice);
    let mut tx = Transaction::Send(SendTx {
        fee: Amount::from_raw(fee),
        gas,
        inputs: vec![TxInput {
            address: sender_address,
            public_key: Some(setup.alice.get_public_key()),
            coins: Amount::from_raw(coins + fee),
            sequence,
        }],
        outputs: vec![TxOutput {
            address: addr(&setup.bob),
            coins: Amount::from_raw(coins),
        }],
        signatures: BTreeMap::new(),
    });
    let hash = tx.sign_hash(&setup.config.chain_id).unwrap();
    tx.set_signature(sender_address, signer.sign(&hash).unwrap());
    tx
}

#[test]
fn test_send_executes_and_matches_check() {
    let setup = executor_setup();
    let tx = build_send(&setup, 100, 1, 1, 1, &setup.alice);

    let mut checked = setup.view.copy();
    let mut delivered = setup.view.copy();
    setup.executor.check_tx(&mut checked, &tx).unwrap();
    setup.executor.execute_tx(&mut delivered, &tx).unwrap();

    // check applies the same delta execution does
    assert_eq!(checked.hash(), delivered.hash());
    assert_eq!(
        delivered.get(&addr(&setup.bob)).unwrap().balance,
        Amount::from_raw(100)
    );
}

#[test]
fn test_screen_leaves_view_untouched() {
    let setup = executor_setup();
    let tx = build_send(&setup, 100, 1, 1, 1, &setup.alice);
    let before = setup.view.hash();
    setup.executor.screen_tx(&setup.view, &tx).unwrap();
    assert_eq!(setup.view.hash(), before);
}

#[test]
fn test_bad_signature_rejected() {
    let setup = executor_setup();
    // signed by the wrong key
    let tx = build_send(&setup, 100, 1, 1, 1, &setup.bob);
    assert!(matches!(
        setup.executor.screen_tx(&setup.view, &tx),
        Err(TxError::BadSignature(_))
    ));
}

#[test]
fn test_insufficient_coins_rejected() {
    let setup = executor_setup();
    let tx = build_send(&setup, 5_000, 1, 1, 1, &setup.alice);
    assert!(matches!(
        setup.executor.screen_tx(&setup.view, &tx),
        Err(TxError::InsufficientCoins(_))
    ));
}

#[test]
fn test_gas_limit_enforced() {
    let setup = executor_setup();
    let tx = build_send(&setup, 100, 1, MAX_TX_GAS + 1, 1, &setup.alice);
    assert!(matches!(
        setup.executor.screen_tx(&setup.view, &tx),
        Err(TxError::GasLimitExceeded(_))
    ));
}

#[test]
fn test_unbalanced_coin_flow_rejected() {
    let setup = executor_setup();
    let sender_address = addr(&setup.alice);
    let mut tx = Transaction::Send(SendTx {
        fee: Amount::from_raw(1),
        gas: 1,
        inputs: vec![TxInput {
            address: sender_address,
            public_key: Some(setup.alice.get_public_key()),
            coins: Amount::from_raw(50),
            sequence: 1,
        }],
        outputs: vec![TxOutput {
            address: addr(&setup.bob),
            coins: Amount::from_raw(100),
        }],
        signatures: BTreeMap::new(),
    });
    let hash = tx.sign_hash(&setup.config.chain_id).unwrap();
    tx.set_signature(sender_address, setup.alice.sign(&hash).unwrap());
    assert!(matches!(
        setup.executor.screen_tx(&setup.view, &tx),
        Err(TxError::InvalidCoinFlow(_))
    ));
}

#[test]
fn test_sequence_replay_records_intent_on_check_only() {
    let setup = executor_setup();
    let mut view = setup.view.copy();
    // consume sequence 1
    let first = build_send(&setup, 100, 1, 1, 1, &setup.alice);
    setup.executor.execute_tx(&mut view, &first).unwrap();

    let replay = build_send(&setup, 50, 1, 1, 1, &setup.alice);

    // screening surfaces the mismatch without recording evidence
    assert!(matches!(
        setup.executor.screen_tx(&view, &replay),
        Err(TxError::SequenceMismatch(_, 2, 1))
    ));
    assert!(view.get_slash_intents().is_empty());

    // checking records the double-spend evidence on the view
    assert!(matches!(
        setup.executor.check_tx(&mut view, &replay),
        Err(TxError::SequenceMismatch(_, 2, 1))
    ));
    let intents = view.get_slash_intents();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].address, addr(&setup.alice));
    assert_eq!(intents[0].reserve_sequence, 1);
}

#[test]
fn test_future_sequence_is_not_slashable() {
    let setup = executor_setup();
    let mut view = setup.view.copy();
    let tx = build_send(&setup, 100, 1, 1, 7, &setup.alice);
    assert!(matches!(
        setup.executor.check_tx(&mut view, &tx),
        Err(TxError::SequenceMismatch(_, 1, 7))
    ));
    assert!(view.get_slash_intents().is_empty());
}

fn build_coinbase(setup: &ExecutorSetup, block_height: u64, outputs: Vec<TxOutput>) -> Transaction {
    let proposer_address = addr(&setup.proposer);
    let mut tx = Transaction::Coinbase(CoinbaseTx {
        proposer: TxInput {
            address: proposer_address,
            public_key: Some(setup.proposer.get_public_key()),
            coins: Amount::zero(),
            sequence: 0,
        },
        outputs,
        block_height,
        signatures: BTreeMap::new(),
    });
    let hash = tx.sign_hash(&setup.config.chain_id).unwrap();
    tx.set_signature(proposer_address, setup.proposer.sign(&hash).unwrap());
    tx
}

#[test]
fn test_coinbase_wrong_height_rejected() {
    let setup = executor_setup();
    let mut view = setup.view.copy();
    let outputs = vec![TxOutput {
        address: addr(&setup.proposer),
        coins: setup.config.block_reward,
    }];
    let tx = build_coinbase(&setup, 9, outputs);
    assert!(matches!(
        setup.executor.check_tx(&mut view, &tx),
        Err(TxError::InvalidBlockHeight(9, 1))
    ));
}

#[test]
fn test_coinbase_wrong_outputs_rejected() {
    let setup = executor_setup();
    let mut view = setup.view.copy();
    let outputs = vec![TxOutput {
        address: addr(&setup.proposer),
        coins: Amount::from_raw(123_456),
    }];
    let tx = build_coinbase(&setup, 1, outputs);
    assert!(matches!(
        setup.executor.check_tx(&mut view, &tx),
        Err(TxError::InvalidRewardOutputs)
    ));
}

#[test]
fn test_coinbase_valid_credits_rewards() {
    let setup = executor_setup();
    let mut view = setup.view.copy();
    let outputs = vec![TxOutput {
        address: addr(&setup.proposer),
        coins: setup.config.block_reward,
    }];
    let tx = build_coinbase(&setup, 1, outputs);
    setup.executor.execute_tx(&mut view, &tx).unwrap();
    assert_eq!(
        view.get(&addr(&setup.proposer)).unwrap().balance,
        setup.config.block_reward
    );
}

#[test]
fn test_screen_refuses_validator_only_kinds() {
    let setup = executor_setup();
    let tx = build_coinbase(
        &setup,
        1,
        vec![TxOutput {
            address: addr(&setup.proposer),
            coins: setup.config.block_reward,
        }],
    );
    assert!(matches!(
        setup.executor.screen_tx(&setup.view, &tx),
        Err(TxError::UnauthorizedKind)
    ));
}
