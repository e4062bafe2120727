//! A versioned, copy-on-write view over the account store.
//!
//! A view is a committed base snapshot (shared, immutable) plus a private
//! write overlay. The state root is maintained incrementally as the XOR of
//! one hash per live account entry, so two views holding the same logical
//! contents always report the same root no matter how they got there.
//! `commit` is the only operation that touches the backing database: it
//! persists the merged contents under their root hash, which is exactly
//! what `reset_to` later restores.

use crate::error::LedgerError;
use keel_db::{SharedDb, WriteBatch};
use keel_hash::Hash;
use keel_models::account::{Account, AccountDeserializer, AccountSerializer};
use keel_models::address::{Address, AddressDeserializer, AddressSerializer};
use keel_models::transaction::SlashIntent;
use keel_models::ModelsError;
use keel_serialization::{
    DeserializeError, Deserializer, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use std::collections::BTreeMap;
use std::ops::Bound::Included;
use std::sync::Arc;
use tracing::debug;

const SNAPSHOT_KEY_PREFIX: &[u8] = b"state/snapshot/";

fn snapshot_key(root: &Hash) -> Vec<u8> {
    let mut key = SNAPSHOT_KEY_PREFIX.to_vec();
    key.extend(root.to_bytes());
    key
}

/// Copy-on-write account-state view with an incremental root commitment
#[derive(Clone)]
pub struct StoreView {
    db: SharedDb,
    height: u64,
    root: Hash,
    base: Arc<BTreeMap<Address, Account>>,
    overlay: BTreeMap<Address, Account>,
    slash_intents: Vec<SlashIntent>,
}

impl StoreView {
    /// Creates an empty view at height 0 over `db`. Nothing is persisted
    /// until `commit`.
    pub fn new(db: SharedDb) -> Self {
        StoreView {
            db,
            height: 0,
            root: Hash::zero(),
            base: Arc::new(BTreeMap::new()),
            overlay: BTreeMap::new(),
            slash_intents: Vec::new(),
        }
    }

    /// Reads the current value of an account
    pub fn get(&self, address: &Address) -> Option<Account> {
        self.overlay
            .get(address)
            .or_else(|| self.base.get(address))
            .cloned()
    }

    /// Writes an account, updating the root commitment incrementally
    pub fn set(&mut self, address: Address, account: Account) -> Result<(), ModelsError> {
        if let Some(old) = self.get(&address) {
            self.root ^= entry_hash(&address, &old)?;
        }
        self.root ^= entry_hash(&address, &account)?;
        self.overlay.insert(address, account);
        Ok(())
    }

    /// The root commitment over the current logical contents
    pub fn hash(&self) -> Hash {
        self.root
    }

    /// Height of the block this view is working on
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Sets the working height
    pub fn set_height(&mut self, height: u64) {
        self.height = height;
    }

    /// Forks an independent view sharing the committed base; later
    /// mutations of either side do not affect the other
    pub fn copy(&self) -> StoreView {
        self.clone()
    }

    /// Records evidence of validator misbehavior on this view
    pub fn add_slash_intent(&mut self, intent: SlashIntent) {
        self.slash_intents.push(intent);
    }

    /// Slash intents recorded on this view so far
    pub fn get_slash_intents(&self) -> &[SlashIntent] {
        &self.slash_intents
    }

    /// Drops all recorded slash intents
    pub fn clear_slash_intents(&mut self) {
        self.slash_intents.clear();
    }

    /// Persists the merged contents under their root hash and makes them
    /// the new committed base. Returns the committed root.
    pub fn commit(&mut self) -> Result<Hash, LedgerError> {
        let mut merged = (*self.base).clone();
        for (address, account) in std::mem::take(&mut self.overlay) {
            merged.insert(address, account);
        }
        let snapshot = encode_snapshot(&merged)?;
        let mut batch = WriteBatch::new();
        batch.put(snapshot_key(&self.root), snapshot);
        self.db.write_batch(batch)?;
        self.base = Arc::new(merged);
        debug!("committed state root {} at height {}", self.root, self.height);
        Ok(self.root)
    }

    /// Restores the view to a previously committed `(height, root)` pair.
    /// Fails when no snapshot is stored under `root`. Pending overlay
    /// writes and recorded slash intents are discarded.
    pub fn reset_to(&mut self, height: u64, root: Hash) -> Result<(), LedgerError> {
        let raw = self
            .db
            .get(&snapshot_key(&root))?
            .ok_or_else(|| LedgerError::UnknownStateRoot(root.to_string(), height))?;
        let contents = decode_snapshot(&raw)?;
        self.base = Arc::new(contents);
        self.overlay.clear();
        self.slash_intents.clear();
        self.height = height;
        self.root = root;
        Ok(())
    }

    /// Number of live accounts in the view
    pub fn account_count(&self) -> usize {
        let mut count = self.base.len();
        for address in self.overlay.keys() {
            if !self.base.contains_key(address) {
                count += 1;
            }
        }
        count
    }
}

fn entry_hash(address: &Address, account: &Account) -> Result<Hash, ModelsError> {
    let mut buffer = address.to_bytes().to_vec();
    AccountSerializer::new().serialize(account, &mut buffer)?;
    Ok(Hash::compute_from(&buffer))
}

fn encode_snapshot(contents: &BTreeMap<Address, Account>) -> Result<Vec<u8>, LedgerError> {
    let mut buffer = Vec::new();
    U64VarIntSerializer::new()
        .serialize(&(contents.len() as u64), &mut buffer)
        .map_err(ModelsError::from)?;
    let address_serializer = AddressSerializer::new();
    let account_serializer = AccountSerializer::new();
    for (address, account) in contents {
        address_serializer
            .serialize(address, &mut buffer)
            .map_err(ModelsError::from)?;
        account_serializer
            .serialize(account, &mut buffer)
            .map_err(ModelsError::from)?;
    }
    Ok(buffer)
}

fn decode_snapshot(raw: &[u8]) -> Result<BTreeMap<Address, Account>, LedgerError> {
    let (mut rest, count) = U64VarIntDeserializer::new(Included(0), Included(u64::MAX))
        .deserialize::<DeserializeError>(raw)
        .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
    let address_deserializer = AddressDeserializer::new();
    let account_deserializer = AccountDeserializer::new();
    let mut contents = BTreeMap::new();
    for _ in 0..count {
        let (after_address, address) = address_deserializer
            .deserialize::<DeserializeError>(rest)
            .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
        let (after_account, account) = account_deserializer
            .deserialize::<DeserializeError>(after_address)
            .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
        contents.insert(address, account);
        rest = after_account;
    }
    if !rest.is_empty() {
        return Err(LedgerError::ModelsError(ModelsError::DeserializeError(
            "trailing bytes after state snapshot".to_string(),
        )));
    }
    Ok(contents)
}
