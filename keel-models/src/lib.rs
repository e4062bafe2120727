//! Core data model of the keel ledger: addresses, amounts, accounts,
//! transactions and their canonical wire codec, votes, and blocks.

#![warn(missing_docs)]

pub mod account;
pub mod address;
pub mod amount;
pub mod block;
pub mod config;
pub mod error;
pub mod serialization;
pub mod transaction;
pub mod vote;

#[cfg(any(test, feature = "testing"))]
pub mod test_exports;

pub use account::Account;
pub use address::Address;
pub use amount::Amount;
pub use block::{Block, BlockHeader, BlockId};
pub use error::ModelsError;
pub use transaction::{
    CoinbaseTx, SendTx, SlashIntent, SlashTx, Transaction, TxId, TxInput, TxOutput,
};
pub use vote::{Vote, VoteSet};
