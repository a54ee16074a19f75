//! User-facing message text.

use std::fmt::Write;

use chrono::NaiveDate;

use super::report::UserDay;
use crate::domain::agent::AgentState;
use crate::domain::assessment;
use crate::domain::money::Amount;
use crate::domain::opportunity::Opportunity;
use crate::domain::trade::{TradeRecord, TradeState};
use crate::port::inbound::manual::ManualInvestRequest;
use crate::port::outbound::messenger::{Button, Message};

/// Opportunities shown per alert.
pub const ALERT_LIMIT: usize = 3;

/// Terminal outcome of a trade.
#[must_use]
pub fn trade_outcome(record: &TradeRecord) -> Message {
    let head = match record.state() {
        TradeState::Confirmed { simulated: true } => "🧪 Simulated trade complete",
        TradeState::Confirmed { simulated: false } => "✅ Trade confirmed",
        TradeState::Failed { .. } => "❌ Trade failed",
        _ => "⏳ Trade in progress",
    };
    let mut text = format!(
        "{head}\nPool: {}\nAmount: {}\nRef: {}",
        record.pool(),
        record.amount(),
        record.key().short()
    );
    if let Some(quote) = record.quote() {
        let _ = write!(text, "\nExpected out: {}", quote.expected_out);
    }
    if let Some(tx) = record.tx_ref() {
        let _ = write!(text, "\nTx: {tx}");
    }
    if let TradeState::Failed { reason } = record.state() {
        let _ = write!(text, "\nReason: {reason}");
    }
    Message::text(text)
}

/// Alert listing the best opportunities with invest buttons.
///
/// `picks` should already be sorted best first; only the first
/// [`ALERT_LIMIT`] are used.
#[must_use]
pub fn opportunity_alert(picks: &[(&Opportunity, Amount)]) -> Message {
    let mut text = String::from("🚀 New pool opportunities");
    let mut buttons = Vec::new();
    for (i, (opp, amount)) in picks.iter().take(ALERT_LIMIT).enumerate() {
        let snap = opp.snapshot();
        let risk = assessment::assess(snap);
        let _ = write!(
            text,
            "\n\n{}. {} ({})\n   APY {:.2}% · TVL ${:.0} · Vol ${:.0}\n   Confidence {:.0}% · Rules {}\n   Risk {} ({:.1})",
            i + 1,
            snap.label(),
            snap.pool_id(),
            snap.apy(),
            snap.tvl(),
            snap.volume_24h(),
            opp.confidence() * 100.0,
            opp.triggered(),
            risk.level,
            risk.score(),
        );
        if !risk.factors.is_empty() {
            let factors: Vec<String> = risk.factors.iter().map(ToString::to_string).collect();
            let _ = write!(text, ": {}", factors.join(", "));
        }
        buttons.push(Button::new(
            format!("Invest {amount} in {}", snap.label()),
            ManualInvestRequest::callback_data(snap.pool_id(), *amount),
        ));
    }
    Message::text(text).with_buttons(buttons)
}

/// Daily summary for one subscriber.
#[must_use]
pub fn daily_report(day: NaiveDate, agent: &AgentState, user: &UserDay) -> Message {
    let mut text = format!("📊 Daily report for {}", day.format("%B %d, %Y"));
    let _ = write!(
        text,
        "\n\nAgent\n   Cycles run: {}\n   Pools last cycle: {}\n   Opportunities last cycle: {}",
        agent.cycle_count, agent.counters.pools_monitored, agent.counters.opportunities,
    );
    let _ = write!(
        text,
        "\n\nYour trades today\n   Confirmed: {}\n   Simulated: {}\n   Failed: {}\n   Committed: ${}",
        user.confirmed, user.simulated, user.failed, user.committed,
    );
    if user.open > 0 {
        let _ = write!(text, "\n   Still open: {}", user.open);
    }
    Message::text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exposure::DenialReason;
    use crate::domain::id::{CycleId, PoolId, TradeTrigger, UserId};
    use crate::domain::rule::RuleSet;
    use crate::domain::snapshot::PoolSnapshot;
    use crate::domain::subscription::TradeMode;
    use crate::domain::trade::FailureReason;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn failure_message_carries_reason() {
        let record = TradeRecord::failed_at_start(
            UserId::new(1),
            PoolId::from("p"),
            TradeTrigger::Cycle(CycleId::new(1)),
            TradeMode::Live,
            Amount::try_new(dec!(600)).unwrap(),
            FailureReason::RiskLimit {
                denial: DenialReason::DailyCapExceeded,
            },
            Utc::now(),
        );
        let msg = trade_outcome(&record);
        assert!(msg.text.contains("Trade failed"));
        assert!(msg.text.contains("daily exposure cap exceeded"));
        assert!(msg.buttons.is_empty());
    }

    #[test]
    fn alert_is_capped_at_three() {
        let opps: Vec<Opportunity> = (0..5)
            .map(|i| {
                let snap = PoolSnapshot::new(
                    PoolId::from(format!("p{i}")),
                    format!("T{i}/USDC"),
                    20.0,
                    2e6,
                    5e5,
                    Utc::now(),
                );
                Opportunity::new(Arc::new(snap), 0.8, RuleSet::empty(), CycleId::new(1))
            })
            .collect();
        let amount = Amount::try_new(dec!(100)).unwrap();
        let picks: Vec<_> = opps.iter().map(|o| (o, amount)).collect();
        let msg = opportunity_alert(&picks);
        assert_eq!(msg.buttons.len(), 3);
        assert_eq!(msg.buttons[0].data, "invest:p0:100");
        assert!(!msg.text.contains("p3"));
        assert!(msg.text.contains("Risk Low"));
    }

    #[test]
    fn alert_lists_risk_factors() {
        let snap = PoolSnapshot::new(PoolId::from("hot"), "HOT/USDC", 150.0, 50_000.0, 100.0, Utc::now());
        let opp = Opportunity::new(Arc::new(snap), 0.7, RuleSet::empty(), CycleId::new(1));
        let amount = Amount::try_new(dec!(10)).unwrap();
        let msg = opportunity_alert(&[(&opp, amount)]);
        assert!(msg.text.contains("Risk High (0.9): low TVL, very high APY, low liquidity"));
    }

    #[test]
    fn daily_report_counts_user_trades() {
        let user = UserDay {
            confirmed: 2,
            simulated: 1,
            failed: 1,
            open: 0,
            committed: dec!(450),
        };
        let mut agent = AgentState::default();
        agent.cycle_count = 8;
        let day = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let msg = daily_report(day, &agent, &user);
        assert!(msg.text.contains("October 17, 2026"));
        assert!(msg.text.contains("Cycles run: 8"));
        assert!(msg.text.contains("Confirmed: 2"));
        assert!(msg.text.contains("Committed: $450"));
        assert!(!msg.text.contains("Still open"));
    }
}
