//! Consensus-facing contracts and state.
//!
//! The ledger consumes the `ConsensusEngine` and `ValidatorManager` traits
//! defined here; `ConsensusState` is the persisted voting state a consensus
//! engine maintains between restarts.

mod chain;
mod controller;
mod error;
mod state;
mod validator;

pub use chain::Chain;
pub use controller::ConsensusEngine;
pub use error::ConsensusError;
pub use state::ConsensusState;
pub use validator::{RoundRobinValidatorManager, Validator, ValidatorManager, ValidatorSet};

#[cfg(test)]
mod tests;
