use crate::config::PoolConfig;
use crate::error::PoolError;
use keel_models::transaction::TxId;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// The reap/update contract the ledger consumes.
///
/// `reap` does not remove entries; `update` removes exactly the listed ones.
pub trait MempoolController: Send + Sync {
    /// Returns up to `max` raw transactions in the pool's selection order
    fn reap(&self, max: usize) -> Vec<Vec<u8>>;

    /// Removes the listed entries from the pool
    fn update(&self, applied: &[Vec<u8>]);
}

struct PoolInner {
    /// insertion counter, also the selection order
    next_slot: u64,
    /// entries in insertion order
    ordered: BTreeMap<u64, (TxId, Vec<u8>)>,
    /// id -> insertion slot index
    slots: HashMap<TxId, u64>,
}

/// In-memory mempool holding screened raw transactions
pub struct TxPool {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl TxPool {
    /// Creates an empty pool
    pub fn new(config: PoolConfig) -> Self {
        TxPool {
            config,
            inner: Mutex::new(PoolInner {
                next_slot: 0,
                ordered: BTreeMap::new(),
                slots: HashMap::new(),
            }),
        }
    }

    /// Inserts a raw transaction. The caller is responsible for screening
    /// it against the ledger first.
    pub fn add_tx(&self, raw: Vec<u8>) -> Result<TxId, PoolError> {
        let id = TxId::compute_from_raw(&raw);
        let mut inner = self.inner.lock();
        if inner.slots.contains_key(&id) {
            return Err(PoolError::DuplicateTx(id.to_string()));
        }
        if inner.slots.len() >= self.config.max_pool_size {
            return Err(PoolError::PoolFull(inner.slots.len()));
        }
        let slot = inner.next_slot;
        inner.next_slot += 1;
        inner.ordered.insert(slot, (id, raw));
        inner.slots.insert(id, slot);
        debug!("mempool: added tx {}", id);
        Ok(id)
    }

    /// True when the pool holds the transaction with this id
    pub fn contains(&self, id: &TxId) -> bool {
        self.inner.lock().slots.contains_key(id)
    }

    /// Number of pooled transactions
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// True when the pool is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }
}

impl MempoolController for TxPool {
    fn reap(&self, max: usize) -> Vec<Vec<u8>> {
        let inner = self.inner.lock();
        inner
            .ordered
            .values()
            .take(max)
            .map(|(_, raw)| raw.clone())
            .collect()
    }

    fn update(&self, applied: &[Vec<u8>]) {
        let mut inner = self.inner.lock();
        let mut removed = 0usize;
        for raw in applied {
            let id = TxId::compute_from_raw(raw);
            if let Some(slot) = inner.slots.remove(&id) {
                inner.ordered.remove(&slot);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("mempool: removed {} applied txs", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(tag: u8) -> Vec<u8> {
        vec![tag, tag, tag]
    }

    #[test]
    fn test_add_and_reap_preserves_insertion_order() {
        let pool = TxPool::new(PoolConfig::default());
        pool.add_tx(raw(3)).unwrap();
        pool.add_tx(raw(1)).unwrap();
        pool.add_tx(raw(2)).unwrap();
        assert_eq!(pool.reap(10), vec![raw(3), raw(1), raw(2)]);
        // reap is non-destructive
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_reap_respects_limit() {
        let pool = TxPool::new(PoolConfig::default());
        for tag in 0..5 {
            pool.add_tx(raw(tag)).unwrap();
        }
        assert_eq!(pool.reap(2), vec![raw(0), raw(1)]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let pool = TxPool::new(PoolConfig::default());
        pool.add_tx(raw(7)).unwrap();
        assert!(matches!(
            pool.add_tx(raw(7)),
            Err(PoolError::DuplicateTx(_))
        ));
    }

    #[test]
    fn test_capacity_bound() {
        let pool = TxPool::new(PoolConfig { max_pool_size: 2 });
        pool.add_tx(raw(0)).unwrap();
        pool.add_tx(raw(1)).unwrap();
        assert!(matches!(pool.add_tx(raw(2)), Err(PoolError::PoolFull(_))));
    }

    #[test]
    fn test_update_removes_exactly_listed() {
        let pool = TxPool::new(PoolConfig::default());
        pool.add_tx(raw(1)).unwrap();
        pool.add_tx(raw(2)).unwrap();
        pool.add_tx(raw(3)).unwrap();
        pool.update(&[raw(2), raw(9)]);
        assert_eq!(pool.reap(10), vec![raw(1), raw(3)]);
        assert!(!pool.contains(&TxId::compute_from_raw(&raw(2))));
    }
}
