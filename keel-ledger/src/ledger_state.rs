//! Lifecycle of the named state views.
//!
//! All four views fork from the same committed base. Screened is the cheap
//! read mirror, checked accumulates proposal speculation, delivered is the
//! authoritative working state, finalized trails consensus decisions and
//! its height never decreases.

use crate::error::LedgerError;
use crate::store_view::StoreView;
use keel_db::SharedDb;
use keel_hash::Hash;
use keel_models::account::Account;
use keel_models::address::Address;
use std::collections::BTreeMap;
use tracing::debug;

/// Owns the screened / checked / delivered / finalized views
pub struct LedgerState {
    chain_id: String,
    screened: StoreView,
    checked: StoreView,
    delivered: StoreView,
    finalized: StoreView,
}

impl LedgerState {
    /// Creates the state over `db`, seeding the genesis accounts and
    /// committing the genesis snapshot so it can be reset to later. All
    /// views start at working height 1, the height of the first block to
    /// be built.
    pub fn new(
        chain_id: &str,
        db: SharedDb,
        initial_accounts: &BTreeMap<Address, Account>,
    ) -> Result<Self, LedgerError> {
        let mut delivered = StoreView::new(db);
        for (address, account) in initial_accounts {
            delivered.set(*address, account.clone())?;
        }
        delivered.commit()?;
        delivered.set_height(1);
        let screened = delivered.copy();
        let checked = delivered.copy();
        let mut finalized = delivered.copy();
        finalized.set_height(0);
        Ok(LedgerState {
            chain_id: chain_id.to_string(),
            screened,
            checked,
            delivered,
            finalized,
        })
    }

    /// The chain id signatures are bound to
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Height of the block currently being built
    pub fn height(&self) -> u64 {
        self.delivered.height()
    }

    /// The screened view (cheap admission checks)
    pub fn screened(&self) -> &StoreView {
        &self.screened
    }

    /// The checked view (proposal speculation)
    pub fn checked(&self) -> &StoreView {
        &self.checked
    }

    /// Mutable access to the checked view
    pub fn checked_mut(&mut self) -> &mut StoreView {
        &mut self.checked
    }

    /// The delivered view (authoritative working state)
    pub fn delivered(&self) -> &StoreView {
        &self.delivered
    }

    /// Mutable access to the delivered view
    pub fn delivered_mut(&mut self) -> &mut StoreView {
        &mut self.delivered
    }

    /// The finalized view
    pub fn finalized(&self) -> &StoreView {
        &self.finalized
    }

    /// Commits the delivered view, advances the working height and
    /// refreshes the screened and checked mirrors from the new base.
    /// Slash intents recorded on the checked view but not yet materialized
    /// into a block survive the refresh. Returns the committed root.
    pub fn commit(&mut self) -> Result<Hash, LedgerError> {
        let pending_intents = self.checked.get_slash_intents().to_vec();
        let root = self.delivered.commit()?;
        let next_height = self.delivered.height() + 1;
        self.delivered.set_height(next_height);
        self.delivered.clear_slash_intents();
        self.screened = self.delivered.copy();
        self.checked = self.delivered.copy();
        for intent in pending_intents {
            self.checked.add_slash_intent(intent);
        }
        Ok(root)
    }

    /// Moves the three working views to a previously committed
    /// `(height, root)` pair. Slash intents recorded on the checked view
    /// but not yet materialized into a block survive the move, like they
    /// do across `commit`; what a failed batch recorded on the delivered
    /// view is discarded with the rest of its effects.
    pub fn reset(&mut self, height: u64, root: Hash) -> Result<(), LedgerError> {
        let pending_intents = self.checked.get_slash_intents().to_vec();
        self.delivered.reset_to(height, root)?;
        self.screened = self.delivered.copy();
        self.checked = self.delivered.copy();
        for intent in pending_intents {
            self.checked.add_slash_intent(intent);
        }
        debug!("ledger state reset to root {} at height {}", root, height);
        Ok(())
    }

    /// Records `(height, root)` as the finalized point; the finalized
    /// height is monotonic non-decreasing
    pub fn finalize(&mut self, height: u64, root: Hash) -> Result<(), LedgerError> {
        if height < self.finalized.height() {
            return Err(LedgerError::FinalizedHeightRegression(
                self.finalized.height(),
                height,
            ));
        }
        self.finalized.reset_to(height, root)?;
        debug!("finalized state root {} at height {}", root, height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_db::MemDb;
    use keel_models::amount::Amount;
    use keel_models::transaction::SlashIntent;
    use keel_signature::KeyPair;

    #[test]
    fn test_views_fork_from_same_base() {
        let state = LedgerState::new("keel-test", MemDb::shared(), &BTreeMap::new()).unwrap();
        assert_eq!(state.screened().hash(), state.delivered().hash());
        assert_eq!(state.checked().hash(), state.delivered().hash());
        assert_eq!(state.height(), 1);
    }

    #[test]
    fn test_commit_refreshes_mirrors() {
        let mut state = LedgerState::new("keel-test", MemDb::shared(), &BTreeMap::new()).unwrap();
        let address = Address::from_public_key(&KeyPair::generate().get_public_key());
        state
            .delivered_mut()
            .set(address, Account::with_balance(Amount::from_raw(5)))
            .unwrap();
        assert_ne!(state.screened().hash(), state.delivered().hash());
        let root = state.commit().unwrap();
        assert_eq!(state.delivered().hash(), root);
        assert_eq!(state.screened().hash(), root);
        assert_eq!(state.checked().hash(), root);
        assert_eq!(state.height(), 2);
    }

    #[test]
    fn test_reset_preserves_checked_intents() {
        let mut state = LedgerState::new("keel-test", MemDb::shared(), &BTreeMap::new()).unwrap();
        let r0 = state.delivered().hash();
        let address = Address::from_public_key(&KeyPair::generate().get_public_key());
        // evidence recorded during proposal checking
        state.checked_mut().add_slash_intent(SlashIntent {
            address,
            reserve_sequence: 1,
            proof: vec![1],
        });
        // an intent recorded by the batch that is about to be rolled back
        state.delivered_mut().add_slash_intent(SlashIntent {
            address,
            reserve_sequence: 2,
            proof: vec![2],
        });

        state.reset(1, r0).unwrap();

        let intents = state.checked().get_slash_intents();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].reserve_sequence, 1);
        assert!(state.delivered().get_slash_intents().is_empty());
    }

    #[test]
    fn test_finalize_monotonicity() {
        let mut state = LedgerState::new("keel-test", MemDb::shared(), &BTreeMap::new()).unwrap();
        let r0 = state.delivered().hash();
        state.finalize(1, r0).unwrap();
        assert!(matches!(
            state.finalize(0, r0),
            Err(LedgerError::FinalizedHeightRegression(1, 0))
        ));
        // equal height is allowed
        state.finalize(1, r0).unwrap();
    }
}
