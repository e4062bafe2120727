use crate::error::ConsensusError;
use keel_models::Address;
use keel_signature::PublicKey;

/// A consensus validator: an address and the key it votes with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    address: Address,
    public_key: PublicKey,
}

impl Validator {
    /// Creates a validator from its public key
    pub fn new(public_key: PublicKey) -> Self {
        Validator {
            address: Address::from_public_key(&public_key),
            public_key,
        }
    }

    /// The validator's account address
    pub fn address(&self) -> Address {
        self.address
    }

    /// The validator's public key
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }
}

/// An ordered set of validators for one epoch
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    /// Creates a set from an ordered validator list
    pub fn new(validators: Vec<Validator>) -> Self {
        ValidatorSet { validators }
    }

    /// The validators, in set order
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Number of validators in the set
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// True when the set is empty
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Per-epoch proposer and validator-set lookup, consumed by the ledger
pub trait ValidatorManager: Send + Sync {
    /// The validator proposing blocks during `epoch`
    fn proposer_for_epoch(&self, epoch: u64) -> Validator;

    /// The full validator set for `epoch`
    fn validator_set_for_epoch(&self, epoch: u64) -> ValidatorSet;
}

/// Fixed validator set rotating the proposer role by epoch
#[derive(Debug, Clone)]
pub struct RoundRobinValidatorManager {
    set: ValidatorSet,
}

impl RoundRobinValidatorManager {
    /// Creates a manager over a non-empty validator set
    pub fn new(set: ValidatorSet) -> Result<Self, ConsensusError> {
        if set.is_empty() {
            return Err(ConsensusError::EmptyValidatorSet);
        }
        Ok(RoundRobinValidatorManager { set })
    }
}

impl ValidatorManager for RoundRobinValidatorManager {
    fn proposer_for_epoch(&self, epoch: u64) -> Validator {
        let index = (epoch as usize) % self.set.len();
        self.set.validators()[index].clone()
    }

    fn validator_set_for_epoch(&self, _epoch: u64) -> ValidatorSet {
        self.set.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_signature::KeyPair;

    #[test]
    fn test_proposer_rotation() {
        let validators: Vec<Validator> = (0..3)
            .map(|_| Validator::new(KeyPair::generate().get_public_key()))
            .collect();
        let manager =
            RoundRobinValidatorManager::new(ValidatorSet::new(validators.clone())).unwrap();
        assert_eq!(manager.proposer_for_epoch(0), validators[0]);
        assert_eq!(manager.proposer_for_epoch(1), validators[1]);
        assert_eq!(manager.proposer_for_epoch(5), validators[2]);
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            RoundRobinValidatorManager::new(ValidatorSet::default()),
            Err(ConsensusError::EmptyValidatorSet)
        ));
    }
}
