use displaydoc::Display;
use thiserror::Error;

/// Mempool errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum PoolError {
    /// transaction {0} is already in the pool
    DuplicateTx(String),
    /// the pool is full ({0} entries)
    PoolFull(usize),
}
