//! SQLite trade store implementation.
//!
//! Records are keyed by idempotency key. Updates are conditional on the
//! stored `version`, so two writers can never silently overwrite each other.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::database::connection::{checkout, DbPool};
use super::database::model::TradeRow;
use super::database::schema::trades;
use crate::domain::id::{IdempotencyKey, PoolId, TradeTrigger, UserId};
use crate::domain::money::Amount;
use crate::domain::subscription::TradeMode;
use crate::domain::trade::{QuoteInfo, TradeRecord, TradeState, TradeStatus};
use crate::error::StoreError;
use crate::port::outbound::store::TradeStore;

/// SQLite-backed trade store.
pub struct SqliteTradeStore {
    pool: DbPool,
}

impl SqliteTradeStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(record: &TradeRecord, version: u64) -> Result<TradeRow, StoreError> {
        Ok(TradeRow {
            key: record.key().to_string(),
            user_id: record.user().value(),
            pool_id: record.pool().to_string(),
            trade_trigger: encode(record.trigger())?,
            mode: record.mode().as_str().to_string(),
            amount: record.amount().value().to_string(),
            status: record.status().to_string(),
            state: encode(record.state())?,
            quote: record.quote().map(encode).transpose()?,
            tx_ref: record.tx_ref().map(str::to_string),
            requotes: i32::try_from(record.requotes()).unwrap_or(i32::MAX),
            version: to_i64(version),
            created_at: format_time(record.created_at()),
            updated_at: format_time(record.updated_at()),
        })
    }

    fn from_row(row: TradeRow) -> Result<TradeRecord, StoreError> {
        let trigger: TradeTrigger = decode(&row.trade_trigger)?;
        let state: TradeState = decode(&row.state)?;
        let quote: Option<QuoteInfo> = row.quote.as_deref().map(decode).transpose()?;
        let mode: TradeMode = row.mode.parse().map_err(StoreError::Backend)?;
        let amount = row
            .amount
            .parse::<Decimal>()
            .map_err(|e| StoreError::Backend(e.to_string()))
            .and_then(|d| Amount::try_new(d).map_err(|e| StoreError::Backend(e.to_string())))?;

        Ok(TradeRecord::restore(
            IdempotencyKey::from_raw(row.key),
            UserId::new(row.user_id),
            PoolId::from(row.pool_id),
            trigger,
            mode,
            amount,
            state,
            quote,
            row.tx_ref,
            u32::try_from(row.requotes).unwrap_or(0),
            u64::try_from(row.version).unwrap_or(0),
            parse_time(&row.created_at)?,
            parse_time(&row.updated_at)?,
        ))
    }
}

pub(super) fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(e.to_string()))
}

pub(super) fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(super) fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn to_i64(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

const TERMINAL: [&str; 2] = ["confirmed", "failed"];

impl TradeStore for SqliteTradeStore {
    fn insert_if_absent(&self, record: &TradeRecord) -> Result<bool, StoreError> {
        let row = Self::to_row(record, 1)?;
        let mut conn = checkout(&self.pool)?;
        let inserted = diesel::insert_or_ignore_into(trades::table)
            .values(&row)
            .execute(&mut conn)?;
        Ok(inserted == 1)
    }

    fn get(&self, key: &IdempotencyKey) -> Result<Option<TradeRecord>, StoreError> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<TradeRow> = trades::table
            .find(key.as_str())
            .select(TradeRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(Self::from_row).transpose()
    }

    fn update(&self, record: &TradeRecord) -> Result<u64, StoreError> {
        let expected = record.version();
        let next = expected + 1;
        let row = Self::to_row(record, next)?;
        let mut conn = checkout(&self.pool)?;

        conn.immediate_transaction(|conn| {
            let updated = diesel::update(
                trades::table
                    .filter(trades::key.eq(record.key().as_str()))
                    .filter(trades::version.eq(to_i64(expected))),
            )
            .set(&row)
            .execute(conn)?;
            if updated == 1 {
                return Ok(next);
            }

            let found: Option<i64> = trades::table
                .find(record.key().as_str())
                .select(trades::version)
                .first(conn)
                .optional()?;
            match found {
                Some(found) => Err(StoreError::Conflict {
                    key: record.key().to_string(),
                    expected,
                    found: u64::try_from(found).unwrap_or(0),
                }),
                None => Err(StoreError::NotFound(record.key().to_string())),
            }
        })
    }

    fn open_for(&self, user: UserId, pool: &PoolId) -> Result<Vec<TradeRecord>, StoreError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<TradeRow> = trades::table
            .filter(trades::user_id.eq(user.value()))
            .filter(trades::pool_id.eq(pool.as_str()))
            .filter(trades::status.ne_all(TERMINAL))
            .select(TradeRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Self::from_row).collect()
    }

    fn for_user(&self, user: UserId) -> Result<Vec<TradeRecord>, StoreError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<TradeRow> = trades::table
            .filter(trades::user_id.eq(user.value()))
            .order(trades::created_at.desc())
            .select(TradeRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
