use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::id::{IdempotencyKey, PoolId, UserId};
use crate::domain::trade::TradeRecord;
use crate::error::StoreError;
use crate::port::outbound::store::TradeStore;

/// Trade records in a hash map.
#[derive(Default)]
pub struct MemoryTradeStore {
    records: Mutex<HashMap<IdempotencyKey, TradeRecord>>,
}

impl MemoryTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Every stored record, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<TradeRecord> {
        let mut records: Vec<_> = self.records.lock().values().cloned().collect();
        records.sort_by_key(TradeRecord::created_at);
        records
    }
}

impl TradeStore for MemoryTradeStore {
    fn insert_if_absent(&self, record: &TradeRecord) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(record.key()) {
            return Ok(false);
        }
        let mut stored = record.clone();
        stored.set_version(1);
        records.insert(record.key().clone(), stored);
        Ok(true)
    }

    fn get(&self, key: &IdempotencyKey) -> Result<Option<TradeRecord>, StoreError> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn update(&self, record: &TradeRecord) -> Result<u64, StoreError> {
        let mut records = self.records.lock();
        let stored = records
            .get_mut(record.key())
            .ok_or_else(|| StoreError::NotFound(record.key().to_string()))?;
        if stored.version() != record.version() {
            return Err(StoreError::Conflict {
                key: record.key().to_string(),
                expected: record.version(),
                found: stored.version(),
            });
        }
        let version = record.version() + 1;
        let mut next = record.clone();
        next.set_version(version);
        *stored = next;
        Ok(version)
    }

    fn open_for(&self, user: UserId, pool: &PoolId) -> Result<Vec<TradeRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.user() == user && r.pool() == pool && !r.is_terminal())
            .cloned()
            .collect())
    }

    fn for_user(&self, user: UserId) -> Result<Vec<TradeRecord>, StoreError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .values()
            .filter(|r| r.user() == user)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(records)
    }
}
