use super::tools::create_test_chain;
use crate::state::ConsensusState;
use keel_db::MemDb;
use keel_models::test_exports::TestBlockFactory;
use keel_models::vote::Vote;

#[test]
fn test_consensus_state_basic() {
    let db = MemDb::shared();
    let mut factory = TestBlockFactory::new("keel-test");
    let chain = create_test_chain(&mut factory, &[("A1", "A0"), ("A2", "A1")]);
    let cc = factory.get("A1").unwrap().clone();

    let mut state1 = ConsensusState::new(db.clone(), chain.clone());
    state1.set_epoch(3).unwrap();
    state1.set_last_vote_height(10).unwrap();
    state1.set_highest_cc_block(&cc).unwrap();

    let mut state2 = ConsensusState::new(db, chain);
    state2.load().unwrap();
    assert_eq!(state2.get_epoch(), 3);
    assert_eq!(state2.get_last_vote_height(), 10);
    let highest_cc = state2.get_highest_cc_block().unwrap();
    assert_eq!(
        highest_cc.hash().unwrap(),
        factory.get("A1").unwrap().hash().unwrap()
    );
    assert_eq!(
        state2.get_tip().hash().unwrap(),
        factory.get("A2").unwrap().hash().unwrap()
    );
    assert_eq!(
        state2.get_last_finalized_block().hash().unwrap(),
        factory.get("A0").unwrap().hash().unwrap()
    );
}

#[test]
fn test_consensus_state_vote_set() {
    let db = MemDb::shared();
    let mut factory = TestBlockFactory::new("keel-test");
    let chain = create_test_chain(&mut factory, &[("A1", "A0"), ("A2", "A1")]);
    let block1 = factory.get("A1").unwrap().clone();
    let block2 = factory.get("A2").unwrap().clone();

    let mut state1 = ConsensusState::new(db.clone(), chain.clone());
    state1
        .add_vote(Vote {
            block: block1.header.clone(),
            voter_id: "Alice".to_string(),
            epoch: 13,
        })
        .unwrap();
    state1
        .add_vote(Vote {
            block: block2.header.clone(),
            voter_id: "Alice".to_string(),
            epoch: 20,
        })
        .unwrap();
    state1
        .add_vote(Vote {
            block: block1.header.clone(),
            voter_id: "Bob".to_string(),
            epoch: 20,
        })
        .unwrap();

    let mut state2 = ConsensusState::new(db, chain);
    state2.load().unwrap();
    let votes = state2.get_epoch_votes().votes();
    assert_eq!(votes.len(), 2);
    assert_eq!(votes[0].voter_id, "Alice");
    assert_eq!(votes[0].epoch, 20);
    assert_eq!(votes[0].block, block2.header);
}
