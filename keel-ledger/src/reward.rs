//! Coinbase reward calculation.

use crate::store_view::StoreView;
use keel_models::address::Address;
use keel_models::amount::Amount;
use std::collections::BTreeMap;

/// Splits `total_reward` across `validators` proportionally to the stake
/// each one holds in `view`.
///
/// Validators are read in the caller-provided order; the result is keyed by
/// address so iteration over it is canonical. When no validator holds any
/// stake the reward is split equally. The remainder left by integer
/// division goes to the lexicographically smallest validator address.
/// Zero-amount entries are omitted.
pub fn calculate_reward(
    view: &StoreView,
    validators: &[Address],
    total_reward: Amount,
) -> BTreeMap<Address, Amount> {
    let mut rewards: BTreeMap<Address, Amount> = BTreeMap::new();
    if validators.is_empty() || total_reward.is_zero() {
        return rewards;
    }

    let stakes: Vec<(Address, u128)> = validators
        .iter()
        .map(|address| {
            let stake = view
                .get(address)
                .map(|account| account.stake.to_raw())
                .unwrap_or(0);
            (*address, stake as u128)
        })
        .collect();
    let total_stake: u128 = stakes.iter().map(|(_, stake)| stake).sum();
    let total = total_reward.to_raw() as u128;

    let mut distributed: u128 = 0;
    for (address, stake) in &stakes {
        let share = if total_stake == 0 {
            total / stakes.len() as u128
        } else {
            total * stake / total_stake
        };
        distributed += share;
        if share > 0 {
            let entry = rewards.entry(*address).or_insert_with(Amount::zero);
            *entry = entry.saturating_add(Amount::from_raw(share as u64));
        }
    }

    // integer division leftovers go to the smallest address
    let remainder = total - distributed;
    if remainder > 0 {
        let smallest = validators
            .iter()
            .min()
            .expect("validators were checked non-empty");
        let entry = rewards.entry(*smallest).or_insert_with(Amount::zero);
        *entry = entry.saturating_add(Amount::from_raw(remainder as u64));
    }

    rewards
}
