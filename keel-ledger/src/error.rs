use displaydoc::Display;
use keel_db::DbError;
use keel_models::ModelsError;
use thiserror::Error;

/// Failures raised while validating or executing a single transaction
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum TxError {
    /// transaction kind may only be injected by the block proposer
    UnauthorizedKind,
    /// bad or missing signature for address {0}
    BadSignature(String),
    /// account {0}: expected sequence {1}, got {2}
    SequenceMismatch(String, u64, u64),
    /// account {0} has insufficient coins
    InsufficientCoins(String),
    /// account {0} is unknown
    UnknownAccount(String),
    /// invalid coin flow: {0}
    InvalidCoinFlow(String),
    /// declared gas {0} exceeds the limit
    GasLimitExceeded(u64),
    /// transaction names proposer {0}, epoch proposer is {1}
    InvalidProposer(String, String),
    /// coinbase is for block height {0}, view is at height {1}
    InvalidBlockHeight(u64, u64),
    /// coinbase outputs do not match the reward calculation
    InvalidRewardOutputs,
    /// invalid slash evidence: {0}
    InvalidSlashEvidence(String),
    /// internal error: {0}
    Internal(String),
}

/// Ledger operation failures; `code()` is the stable machine-readable form,
/// the display implementation is the human message
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum LedgerError {
    /// failed to parse transaction: {0}
    DecodeError(String),
    /// unauthorized transaction kind: {0}
    UnauthorizedTx(String),
    /// transaction check failed: {0}
    CheckFailed(#[source] TxError),
    /// transaction execution failed: {0}
    ExecuteFailed(#[source] TxError),
    /// state root mismatch: computed {0}, expected {1}
    StateRootMismatch(String, String),
    /// unknown state root {0} for height {1}
    UnknownStateRoot(String, u64),
    /// finalized height cannot decrease from {0} to {1}
    FinalizedHeightRegression(u64, u64),
    /// commit failed: {0}
    CommitFailed(String),
    /// database error: {0}
    DbError(#[from] DbError),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// internal error: {0}
    Internal(String),
}

impl LedgerError {
    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::DecodeError(_) => "decode_error",
            LedgerError::UnauthorizedTx(_) => "unauthorized_tx",
            LedgerError::CheckFailed(_) => "check_failed",
            LedgerError::ExecuteFailed(_) => "execute_failed",
            LedgerError::StateRootMismatch(_, _) => "state_root_mismatch",
            LedgerError::UnknownStateRoot(_, _) => "unknown_state_root",
            LedgerError::FinalizedHeightRegression(_, _) => "finalized_height_regression",
            LedgerError::CommitFailed(_) => "commit_failed",
            LedgerError::DbError(_) => "db_error",
            LedgerError::ModelsError(_) => "models_error",
            LedgerError::Internal(_) => "internal",
        }
    }
}
