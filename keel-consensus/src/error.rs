use displaydoc::Display;
use thiserror::Error;

/// Consensus-side errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ConsensusError {
    /// database error: {0}
    DbError(#[from] keel_db::DbError),
    /// models error: {0}
    ModelsError(#[from] keel_models::ModelsError),
    /// block {0} is unknown
    UnknownBlock(String),
    /// block {0} references an unknown parent
    OrphanBlock(String),
    /// block {0} was already added
    DuplicateBlock(String),
    /// a validator manager needs at least one validator
    EmptyValidatorSet,
}
