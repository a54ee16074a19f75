//! Trade store with scripted update failures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::adapter::outbound::memory::MemoryTradeStore;
use crate::domain::id::{IdempotencyKey, PoolId, UserId};
use crate::domain::trade::TradeRecord;
use crate::error::StoreError;
use crate::port::outbound::store::TradeStore;

enum UpdateScript {
    /// Another writer touches the record first, so the update conflicts.
    Race,
    Fail(StoreError),
}

/// In-memory trade store whose next updates can be made to fail.
///
/// Unscripted calls behave exactly like [`MemoryTradeStore`].
#[derive(Default)]
pub struct FlakyTradeStore {
    inner: MemoryTradeStore,
    updates: Mutex<VecDeque<UpdateScript>>,
    update_calls: AtomicU32,
}

impl FlakyTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` updates lose a race with a concurrent writer.
    #[must_use]
    pub fn then_conflicts(self, n: usize) -> Self {
        self.updates
            .lock()
            .extend(std::iter::repeat_with(|| UpdateScript::Race).take(n));
        self
    }

    /// The next `n` updates fail with a backend error and write nothing.
    #[must_use]
    pub fn then_backend_errors(self, n: usize, detail: &str) -> Self {
        self.updates.lock().extend(
            std::iter::repeat_with(|| UpdateScript::Fail(StoreError::Backend(detail.to_string())))
                .take(n),
        );
        self
    }

    #[must_use]
    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Records not yet confirmed or failed.
    #[must_use]
    pub fn open(&self) -> Vec<TradeRecord> {
        self.inner
            .all()
            .into_iter()
            .filter(|r| !r.is_terminal())
            .collect()
    }

    /// Write a record as-is, bypassing the scripts.
    pub fn seed(&self, record: &TradeRecord) {
        let _ = self.inner.insert_if_absent(record);
    }
}

impl TradeStore for FlakyTradeStore {
    fn insert_if_absent(&self, record: &TradeRecord) -> Result<bool, StoreError> {
        self.inner.insert_if_absent(record)
    }

    fn get(&self, key: &IdempotencyKey) -> Result<Option<TradeRecord>, StoreError> {
        self.inner.get(key)
    }

    fn update(&self, record: &TradeRecord) -> Result<u64, StoreError> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        let script = self.updates.lock().pop_front();
        match script {
            None => self.inner.update(record),
            Some(UpdateScript::Fail(err)) => Err(err),
            Some(UpdateScript::Race) => {
                if let Some(stored) = self.inner.get(record.key())? {
                    self.inner.update(&stored)?;
                }
                self.inner.update(record)
            }
        }
    }

    fn open_for(&self, user: UserId, pool: &PoolId) -> Result<Vec<TradeRecord>, StoreError> {
        self.inner.open_for(user, pool)
    }

    fn for_user(&self, user: UserId) -> Result<Vec<TradeRecord>, StoreError> {
        self.inner.for_user(user)
    }
}
