/// Mempool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// maximum number of transactions kept in the pool
    pub max_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_pool_size: 100_000,
        }
    }
}
