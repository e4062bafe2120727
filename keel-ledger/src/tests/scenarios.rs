use super::tools::{addr, ledger_setup, ledger_setup_with_config, signed_send};
use crate::error::LedgerError;
use crate::reward::calculate_reward;
use keel_hash::Hash;
use keel_models::amount::Amount;
use keel_models::transaction::Transaction;
use keel_pool::MempoolController;

#[test]
fn test_successful_block_apply() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;
    let raw_send = signed_send(chain_id, &setup.alice, addr(&setup.bob), 100, 1, 1);

    setup.ledger.screen_tx(&raw_send).unwrap();
    setup.pool.add_tx(raw_send.clone()).unwrap();

    let (root, batch) = setup.ledger.propose_block_txs().unwrap();
    // coinbase first, then the reaped send
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[1], raw_send);

    setup.ledger.apply_block_txs(&batch, root).unwrap();

    let delivered = setup.ledger.get_delivered_snapshot();
    assert_eq!(delivered.hash(), root);
    assert_eq!(setup.ledger.height(), 2);

    let alice_account = delivered.get(&addr(&setup.alice)).unwrap();
    assert_eq!(alice_account.balance, Amount::from_raw(1_000 - 100 - 1));
    assert_eq!(alice_account.sequence, 1);
    // the account key is adopted on first spend
    assert_eq!(
        alice_account.public_key,
        Some(setup.alice.get_public_key())
    );
    let bob_account = delivered.get(&addr(&setup.bob)).unwrap();
    assert_eq!(bob_account.balance, Amount::from_raw(100));
    // the proposer collected the whole block reward
    let proposer_account = delivered.get(&addr(&setup.proposer)).unwrap();
    assert_eq!(proposer_account.balance, setup.config.block_reward);

    // applied entries are no longer reapable
    assert!(setup.pool.is_empty());
    assert!(setup.ledger.propose_block_txs().unwrap().1.len() == 1);
}

#[test]
fn test_state_root_mismatch_rollback() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;
    let raw_send = signed_send(chain_id, &setup.alice, addr(&setup.bob), 100, 1, 1);
    setup.pool.add_tx(raw_send).unwrap();

    let pre_root = setup.ledger.get_delivered_snapshot().hash();
    let pre_height = setup.ledger.height();
    let (_, batch) = setup.ledger.propose_block_txs().unwrap();

    // an unrelated tx arriving after proposal must survive the failed apply
    let straggler = signed_send(chain_id, &setup.alice, addr(&setup.bob), 7, 1, 2);
    setup.pool.add_tx(straggler.clone()).unwrap();

    let wrong_root = Hash::compute_from(b"not the state root");
    let err = setup.ledger.apply_block_txs(&batch, wrong_root).unwrap_err();
    assert!(matches!(err, LedgerError::StateRootMismatch(_, _)));
    assert_eq!(err.code(), "state_root_mismatch");

    let delivered = setup.ledger.get_delivered_snapshot();
    assert_eq!(delivered.hash(), pre_root);
    assert_eq!(setup.ledger.height(), pre_height);
    assert_eq!(setup.pool.reap(10), vec![straggler]);
}

#[test]
fn test_coinbase_inclusion_with_empty_mempool() {
    let setup = ledger_setup();
    let pre_view = setup.ledger.get_delivered_snapshot();

    let (root, batch) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(batch.len(), 1);

    let tx = Transaction::from_bytes(&batch[0]).unwrap();
    let Transaction::Coinbase(coinbase) = &tx else {
        panic!("expected a coinbase transaction, got {}", tx.kind());
    };
    assert_eq!(coinbase.proposer.address, addr(&setup.proposer));
    assert_eq!(coinbase.block_height, 1);

    // outputs equal the reward calculation over the pre-proposal view
    let expected = calculate_reward(
        &pre_view,
        &[addr(&setup.proposer)],
        setup.config.block_reward,
    );
    assert_eq!(coinbase.outputs.len(), expected.len());
    for output in &coinbase.outputs {
        assert_eq!(expected.get(&output.address), Some(&output.coins));
    }

    // signed by the proposer for the current epoch
    let sign_hash = tx.sign_hash(&setup.config.chain_id).unwrap();
    let signature = tx.signatures().get(&addr(&setup.proposer)).unwrap();
    setup
        .proposer
        .get_public_key()
        .verify_signature(&sign_hash, signature)
        .unwrap();

    setup.ledger.apply_block_txs(&batch, root).unwrap();
    assert_eq!(setup.ledger.get_delivered_snapshot().hash(), root);
}

#[test]
fn test_apply_atomicity_on_execution_failure() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;
    let raw_send = signed_send(chain_id, &setup.alice, addr(&setup.bob), 100, 1, 1);
    setup.pool.add_tx(raw_send).unwrap();
    let (root, mut batch) = setup.ledger.propose_block_txs().unwrap();

    // a spend from an account that does not exist fails execution
    let stranger = keel_signature::KeyPair::generate();
    batch.push(signed_send(chain_id, &stranger, addr(&setup.bob), 1, 0, 1));

    let pre_root = setup.ledger.get_delivered_snapshot().hash();
    let pre_height = setup.ledger.height();
    let err = setup.ledger.apply_block_txs(&batch, root).unwrap_err();
    assert!(matches!(err, LedgerError::ExecuteFailed(_)));
    assert_eq!(err.code(), "execute_failed");

    assert_eq!(setup.ledger.get_delivered_snapshot().hash(), pre_root);
    assert_eq!(setup.ledger.height(), pre_height);
}

#[test]
fn test_apply_rolls_back_on_undecodable_tx() {
    let setup = ledger_setup();
    let (root, mut batch) = setup.ledger.propose_block_txs().unwrap();
    batch.push(vec![0xff; 16]);

    let pre_root = setup.ledger.get_delivered_snapshot().hash();
    let err = setup.ledger.apply_block_txs(&batch, root).unwrap_err();
    assert!(matches!(err, LedgerError::DecodeError(_)));
    assert_eq!(err.code(), "decode_error");
    assert_eq!(setup.ledger.get_delivered_snapshot().hash(), pre_root);
}

#[test]
fn test_screen_rejects_validator_only_kinds() {
    let setup = ledger_setup();

    // a correctly signed coinbase is still refused at the door
    let (_, batch) = setup.ledger.propose_block_txs().unwrap();
    let err = setup.ledger.screen_tx(&batch[0]).unwrap_err();
    assert!(matches!(err, LedgerError::UnauthorizedTx(_)));
    assert_eq!(err.code(), "unauthorized_tx");
}

#[test]
fn test_screen_rejects_undecodable_bytes() {
    let setup = ledger_setup();
    let err = setup.ledger.screen_tx(&[0xff; 8]).unwrap_err();
    assert!(matches!(err, LedgerError::DecodeError(_)));
}

#[test]
fn test_screen_does_not_mutate_state() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;
    let raw_send = signed_send(chain_id, &setup.alice, addr(&setup.bob), 100, 1, 1);
    let pre_root = setup.ledger.get_delivered_snapshot().hash();
    setup.ledger.screen_tx(&raw_send).unwrap();
    setup.ledger.screen_tx(&raw_send).unwrap();
    assert_eq!(setup.ledger.get_delivered_snapshot().hash(), pre_root);
    assert_eq!(setup.ledger.get_screened_snapshot().hash(), pre_root);
}

#[test]
fn test_double_spend_produces_slash_tx() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;

    // block 1: alice spends at sequence 1
    let raw_send = signed_send(chain_id, &setup.alice, addr(&setup.bob), 100, 1, 1);
    setup.pool.add_tx(raw_send).unwrap();
    let (r1, b1) = setup.ledger.propose_block_txs().unwrap();
    setup.ledger.apply_block_txs(&b1, r1).unwrap();

    // alice replays sequence 1 with a different recipient; the pool itself
    // does not screen
    let replay = signed_send(chain_id, &setup.alice, addr(&setup.proposer), 50, 1, 1);
    setup.pool.add_tx(replay).unwrap();

    // block 2: the replay is dropped, double-spend evidence is recorded
    let (r2, b2) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(b2.len(), 1);
    setup.ledger.apply_block_txs(&b2, r2).unwrap();

    // block 3: the evidence is materialized as a slash transaction
    let (r3, b3) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(b3.len(), 2);
    let tx = Transaction::from_bytes(&b3[1]).unwrap();
    let Transaction::Slash(slash) = &tx else {
        panic!("expected a slash transaction, got {}", tx.kind());
    };
    assert_eq!(slash.slashed_address, addr(&setup.alice));
    assert_eq!(slash.reserve_sequence, 1);
    assert!(!slash.slash_proof.is_empty());

    let alice_balance_before_slash = setup
        .ledger
        .get_delivered_snapshot()
        .get(&addr(&setup.alice))
        .unwrap()
        .balance;
    setup.ledger.apply_block_txs(&b3, r3).unwrap();

    let delivered = setup.ledger.get_delivered_snapshot();
    let alice_account = delivered.get(&addr(&setup.alice)).unwrap();
    assert_eq!(alice_account.balance, Amount::zero());
    assert_eq!(alice_account.stake, Amount::zero());
    // the confiscated coins landed on the proposer, on top of three rewards
    let proposer_account = delivered.get(&addr(&setup.proposer)).unwrap();
    let expected = setup
        .config
        .block_reward
        .checked_mul_u64(3)
        .unwrap()
        .checked_add(alice_balance_before_slash)
        .unwrap();
    assert_eq!(proposer_account.balance, expected);

    // the intent queue was cleared when it was materialized
    let (_, b4) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(b4.len(), 1);
}

#[test]
fn test_evidence_survives_unrelated_apply_failure() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;

    // block 1: alice spends at sequence 1
    let raw_send = signed_send(chain_id, &setup.alice, addr(&setup.bob), 100, 1, 1);
    setup.pool.add_tx(raw_send).unwrap();
    let (r1, b1) = setup.ledger.propose_block_txs().unwrap();
    setup.ledger.apply_block_txs(&b1, r1).unwrap();

    // the replayed spend is dropped from block 2 but leaves evidence behind
    let replay = signed_send(chain_id, &setup.alice, addr(&setup.proposer), 50, 1, 1);
    setup.pool.add_tx(replay).unwrap();
    let (r2, b2) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(b2.len(), 1);

    // an apply failure rolls the working state back before the evidence
    // could be materialized
    let err = setup
        .ledger
        .apply_block_txs(&b2, Hash::compute_from(b"not the state root"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::StateRootMismatch(_, _)));

    // the real block still applies, and the next proposal still carries
    // the slash transaction
    setup.ledger.apply_block_txs(&b2, r2).unwrap();
    let (_, b3) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(b3.len(), 2);
    let tx = Transaction::from_bytes(&b3[1]).unwrap();
    let Transaction::Slash(slash) = &tx else {
        panic!("expected a slash transaction, got {}", tx.kind());
    };
    assert_eq!(slash.slashed_address, addr(&setup.alice));
}

#[test]
fn test_finalize_state_monotonicity() {
    let setup = ledger_setup();
    let r0 = setup.ledger.get_delivered_snapshot().hash();
    let (r1, b1) = setup.ledger.propose_block_txs().unwrap();
    setup.ledger.apply_block_txs(&b1, r1).unwrap();

    setup.ledger.finalize_state(2, r1).unwrap();
    assert_eq!(setup.ledger.get_finalized_snapshot().hash(), r1);

    let err = setup.ledger.finalize_state(1, r0).unwrap_err();
    assert!(matches!(err, LedgerError::FinalizedHeightRegression(2, 1)));
    assert_eq!(setup.ledger.get_finalized_snapshot().hash(), r1);
}

#[test]
fn test_reset_state_requires_known_root() {
    let setup = ledger_setup();
    let err = setup
        .ledger
        .reset_state(5, Hash::compute_from(b"unknown"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::UnknownStateRoot(_, 5)));
}

#[test]
fn test_reset_state_restores_previous_root() {
    let setup = ledger_setup();
    let r0 = setup.ledger.get_delivered_snapshot().hash();
    let (r1, b1) = setup.ledger.propose_block_txs().unwrap();
    setup.ledger.apply_block_txs(&b1, r1).unwrap();
    assert_ne!(setup.ledger.get_delivered_snapshot().hash(), r0);

    setup.ledger.reset_state(1, r0).unwrap();
    assert_eq!(setup.ledger.get_delivered_snapshot().hash(), r0);
    assert_eq!(setup.ledger.height(), 1);
}

#[test]
fn test_failed_candidates_drained_by_default() {
    let setup = ledger_setup();
    let chain_id = &setup.config.chain_id;
    let good = signed_send(chain_id, &setup.alice, addr(&setup.bob), 10, 1, 1);
    // sequence far in the future fails the check
    let bad = signed_send(chain_id, &setup.alice, addr(&setup.bob), 10, 1, 9);
    setup.pool.add_tx(good.clone()).unwrap();
    setup.pool.add_tx(bad).unwrap();

    let (_, batch) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[1], good);
    // the whole reaped batch is drained, failed candidate included
    assert!(setup.pool.is_empty());
}

#[test]
fn test_failed_candidates_requeued_when_configured() {
    let setup = ledger_setup_with_config(|config| config.requeue_failed_candidates = true);
    let chain_id = &setup.config.chain_id;
    let good = signed_send(chain_id, &setup.alice, addr(&setup.bob), 10, 1, 1);
    let bad = signed_send(chain_id, &setup.alice, addr(&setup.bob), 10, 1, 9);
    setup.pool.add_tx(good.clone()).unwrap();
    setup.pool.add_tx(bad.clone()).unwrap();

    let (_, batch) = setup.ledger.propose_block_txs().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[1], good);
    // only the included candidate left the pool
    assert_eq!(setup.pool.reap(10), vec![bad]);
}

#[test]
fn test_snapshots_are_independent_copies() {
    let setup = ledger_setup();
    let snapshot = setup.ledger.get_delivered_snapshot();
    let pre_root = snapshot.hash();

    let (r1, b1) = setup.ledger.propose_block_txs().unwrap();
    setup.ledger.apply_block_txs(&b1, r1).unwrap();

    // the snapshot still shows the world as it was when it was taken
    assert_eq!(snapshot.hash(), pre_root);
    assert_eq!(snapshot.get(&addr(&setup.proposer)).unwrap().balance, Amount::zero());
}
