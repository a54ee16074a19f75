//! SQLite subscription store.

use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use rust_decimal::Decimal;

use super::database::connection::{checkout, DbPool};
use super::database::model::{SubscriptionRow, UserRow};
use super::database::schema::{subscriptions, users};
use super::store::format_time;
use crate::domain::id::UserId;
use crate::domain::money::Amount;
use crate::domain::subscription::{PoolFilter, Subscription, TradeMode};
use crate::error::StoreError;
use crate::port::outbound::store::SubscriptionStore;

pub struct SqliteSubscriptionStore {
    pool: DbPool,
}

impl SqliteSubscriptionStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn to_row(sub: &Subscription) -> SubscriptionRow {
        SubscriptionRow {
            user_id: sub.user.value(),
            pool_filter: sub.filter.to_string(),
            mode: sub.mode.as_str().to_string(),
            amount: sub.amount.map(|a| a.value().to_string()),
            min_apy: sub.min_apy,
            max_daily: sub.max_daily.map(|a| a.value().to_string()),
            active: sub.active,
            updated_at: format_time(Utc::now()),
        }
    }

    fn from_row(row: SubscriptionRow) -> Result<Subscription, StoreError> {
        let mode: TradeMode = row.mode.parse().map_err(StoreError::Backend)?;
        let filter = row
            .pool_filter
            .parse::<PoolFilter>()
            .unwrap_or(PoolFilter::Any);
        let mut sub = Subscription::new(UserId::new(row.user_id), filter, mode);
        sub.amount = row.amount.as_deref().map(parse_amount).transpose()?;
        sub.max_daily = row.max_daily.as_deref().map(parse_amount).transpose()?;
        sub.min_apy = row.min_apy;
        sub.active = row.active;
        Ok(sub)
    }
}

fn parse_amount(raw: &str) -> Result<Amount, StoreError> {
    let value = raw
        .parse::<Decimal>()
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    Amount::try_new(value).map_err(|e| StoreError::Backend(e.to_string()))
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn upsert(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let row = Self::to_row(subscription);
        let user = UserRow {
            id: row.user_id,
            created_at: row.updated_at.clone(),
        };
        let mut conn = checkout(&self.pool)?;
        conn.immediate_transaction(|conn| {
            diesel::insert_or_ignore_into(users::table)
                .values(&user)
                .execute(conn)?;
            diesel::insert_into(subscriptions::table)
                .values(&row)
                .on_conflict((subscriptions::user_id, subscriptions::pool_filter))
                .do_update()
                .set((
                    subscriptions::mode.eq(excluded(subscriptions::mode)),
                    subscriptions::amount.eq(excluded(subscriptions::amount)),
                    subscriptions::min_apy.eq(excluded(subscriptions::min_apy)),
                    subscriptions::max_daily.eq(excluded(subscriptions::max_daily)),
                    subscriptions::active.eq(excluded(subscriptions::active)),
                    subscriptions::updated_at.eq(excluded(subscriptions::updated_at)),
                ))
                .execute(conn)?;
            Ok(())
        })
    }

    fn active(&self) -> Result<Vec<Subscription>, StoreError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<SubscriptionRow> = subscriptions::table
            .filter(subscriptions::active.eq(true))
            .order((subscriptions::user_id.asc(), subscriptions::pool_filter.asc()))
            .select(SubscriptionRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Self::from_row).collect()
    }

    fn for_user(&self, user: UserId) -> Result<Vec<Subscription>, StoreError> {
        let mut conn = checkout(&self.pool)?;
        let rows: Vec<SubscriptionRow> = subscriptions::table
            .filter(subscriptions::user_id.eq(user.value()))
            .order(subscriptions::pool_filter.asc())
            .select(SubscriptionRow::as_select())
            .load(&mut conn)?;
        rows.into_iter().map(Self::from_row).collect()
    }
}
