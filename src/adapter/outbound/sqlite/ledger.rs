//! SQLite exposure ledger.

use chrono::NaiveDate;
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::database::connection::{checkout, DbPool};
use super::database::model::LedgerRow;
use super::database::schema::exposure_ledger;
use crate::domain::exposure::LedgerEntry;
use crate::domain::id::UserId;
use crate::error::StoreError;
use crate::port::outbound::store::LedgerStore;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Committed exposure per user per day. Amounts are stored as decimal text.
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, StoreError> {
    raw.parse::<Decimal>()
        .map_err(|e| StoreError::Backend(e.to_string()))
}

impl LedgerStore for SqliteLedgerStore {
    fn add(&self, user: UserId, day: NaiveDate, amount: Decimal) -> Result<(), StoreError> {
        let day_key = day.format(DAY_FORMAT).to_string();
        let mut conn = checkout(&self.pool)?;

        conn.immediate_transaction(|conn| {
            let current: Option<String> = exposure_ledger::table
                .find((user.value(), day_key.as_str()))
                .select(exposure_ledger::committed)
                .first(conn)
                .optional()?;
            let total = match current {
                Some(raw) => parse_decimal(&raw)? + amount,
                None => amount,
            };
            diesel::replace_into(exposure_ledger::table)
                .values(&LedgerRow {
                    user_id: user.value(),
                    day: day_key.clone(),
                    committed: total.to_string(),
                })
                .execute(conn)?;
            Ok(())
        })
    }

    fn entries_for_day(&self, day: NaiveDate) -> Result<Vec<LedgerEntry>, StoreError> {
        let day_key = day.format(DAY_FORMAT).to_string();
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<LedgerRow> = exposure_ledger::table
            .filter(exposure_ledger::day.eq(&day_key))
            .order(exposure_ledger::user_id.asc())
            .select(LedgerRow::as_select())
            .load(&mut conn)?;
        rows.into_iter()
            .map(|row| {
                Ok(LedgerEntry::new(
                    UserId::new(row.user_id),
                    day,
                    parse_decimal(&row.committed)?,
                ))
            })
            .collect()
    }
}
