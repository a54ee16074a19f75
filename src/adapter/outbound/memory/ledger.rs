use std::collections::BTreeMap;

use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::exposure::LedgerEntry;
use crate::domain::id::UserId;
use crate::error::StoreError;
use crate::port::outbound::store::LedgerStore;

/// Committed exposure per `(day, user)`.
#[derive(Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<BTreeMap<(NaiveDate, i64), Decimal>>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn add(&self, user: UserId, day: NaiveDate, amount: Decimal) -> Result<(), StoreError> {
        *self
            .entries
            .lock()
            .entry((day, user.value()))
            .or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    fn entries_for_day(&self, day: NaiveDate) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|((d, _), _)| *d == day)
            .map(|((d, user), committed)| LedgerEntry::new(UserId::new(*user), *d, *committed))
            .collect())
    }
}
