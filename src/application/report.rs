//! Daily subscriber reports.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::context::AgentContext;
use super::notice;
use super::throttle::Delivery;
use crate::domain::agent::AgentState;
use crate::domain::id::UserId;
use crate::domain::trade::{TradeRecord, TradeState};

/// One user's trading activity on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDay {
    pub confirmed: u32,
    pub simulated: u32,
    pub failed: u32,
    pub open: u32,
    pub committed: Decimal,
}

impl UserDay {
    /// Tally records created on `day`. `committed` comes from the risk guard.
    #[must_use]
    pub fn tally<'a>(
        records: impl IntoIterator<Item = &'a TradeRecord>,
        day: NaiveDate,
        committed: Decimal,
    ) -> Self {
        let mut tally = Self {
            committed,
            ..Self::default()
        };
        for record in records
            .into_iter()
            .filter(|r| r.created_at().date_naive() == day)
        {
            match record.state() {
                TradeState::Confirmed { simulated: true } => tally.simulated += 1,
                TradeState::Confirmed { simulated: false } => tally.confirmed += 1,
                TradeState::Failed { .. } => tally.failed += 1,
                _ => tally.open += 1,
            }
        }
        tally
    }
}

/// Report delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub sent: u32,
    pub failed: u32,
}

/// Send one report to every user with an active subscription.
pub async fn send_daily_reports(ctx: &AgentContext, agent: &AgentState, day: NaiveDate) -> ReportStats {
    let users: BTreeSet<UserId> = match ctx.subscriptions.active() {
        Ok(subs) => subs.into_iter().map(|s| s.user).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load subscriptions for daily reports");
            return ReportStats::default();
        }
    };

    let mut stats = ReportStats::default();
    for user in users {
        let records = match ctx.trades.for_user(user) {
            Ok(records) => records,
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to load trades for daily report");
                stats.failed += 1;
                continue;
            }
        };
        let activity = UserDay::tally(&records, day, ctx.risk.committed(user, day));
        let message = notice::daily_report(day, agent, &activity);
        match ctx.throttler.enqueue(user, message).await {
            Delivery::Delivered => stats.sent += 1,
            Delivery::RateLimited | Delivery::Failed => stats.failed += 1,
        }
    }
    info!(sent = stats.sent, failed = stats.failed, day = %day, "Daily reports sent");
    stats
}
