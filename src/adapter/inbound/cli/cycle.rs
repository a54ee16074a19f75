//! Handler for the `cycle` command.

use std::path::Path;

use crate::adapter::inbound::cli::output::{self, Progress, Table, Tone};
use crate::adapter::inbound::cli::load_and_init_logging;
use crate::application::coordinator::CycleReport;
use crate::application::dispatch::{DispatchOutcome, SkipReason};
use crate::domain::agent::CycleOutcome;
use crate::domain::assessment;
use crate::error::{Error, Result, SnapshotError};
use crate::infrastructure::orchestration;

const COLUMNS: [(&str, usize); 6] = [
    ("Pool", 24),
    ("APY %", 8),
    ("TVL $", 14),
    ("Volume $", 14),
    ("Score", 6),
    ("Risk", 6),
];

/// Run one cycle against the configured collaborators and print a summary.
///
/// # Errors
/// Returns a configuration error, or a market data error when the cycle
/// was skipped or aborted.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_and_init_logging(config_path)?;
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Config", config_path.display());
    output::field("Pool API", &config.market.base_url);

    let progress = Progress::start("Running cycle...");
    let report = orchestration::run_once(&config).await?;
    match report.outcome {
        CycleOutcome::Completed | CycleOutcome::Degraded => {
            progress.succeed(&format!("Cycle {} {}", report.cycle, report.outcome));
        }
        CycleOutcome::Skipped | CycleOutcome::Aborted => {
            progress.fail(&format!("Cycle {} {}", report.cycle, report.outcome));
        }
    }

    print_report(&report);
    outcome_result(&report)
}

fn print_report(report: &CycleReport) {
    let counters = &report.counters;
    output::section("Summary");
    output::field("Pools", counters.pools_monitored);
    output::field("Opportunities", counters.opportunities);
    output::field("Alerts", counters.alerts_sent);
    output::field("Confirmed", output::paint(counters.trades_confirmed, Tone::Good));
    output::field("Failed", output::paint(counters.trades_failed, Tone::Bad));
    output::field("Skipped", counters.trades_skipped);
    if counters.abandoned > 0 {
        output::field("Abandoned", output::paint(counters.abandoned, Tone::Bad));
    }
    if report.fetch_attempts > 1 {
        output::field("Fetch tries", report.fetch_attempts);
    }
    output::field(
        "Elapsed",
        format!(
            "{} ms",
            (report.finished_at - report.started_at).num_milliseconds()
        ),
    );

    if !report.opportunities.is_empty() {
        output::section("Opportunities");
        let table = Table::start(&COLUMNS);
        for opportunity in &report.opportunities {
            let snapshot = opportunity.snapshot();
            table.row(&[
                snapshot.label().to_string(),
                format!("{:.2}", snapshot.apy()),
                format!("{:.0}", snapshot.tvl()),
                format!("{:.0}", snapshot.volume_24h()),
                format!("{:.2}", opportunity.confidence()),
                assessment::assess(snapshot).level.to_string(),
            ]);
        }
    }

    if !report.dispatches.is_empty() {
        output::section("Dispatches");
        for outcome in &report.dispatches {
            let (key, text, good) = describe(outcome);
            output::dispatch(&key, &text, good);
        }
    }

    if let Some(error) = &report.error {
        output::warning(&format!("{}: {}", error.class, error.message));
    }
}

fn outcome_result(report: &CycleReport) -> Result<()> {
    let message = report
        .error
        .as_ref()
        .map_or_else(|| "no detail".to_string(), |e| e.message.clone());
    match report.outcome {
        CycleOutcome::Completed | CycleOutcome::Degraded => Ok(()),
        CycleOutcome::Skipped => Err(Error::Snapshot(SnapshotError::Transient(message))),
        CycleOutcome::Aborted => Err(Error::Snapshot(SnapshotError::Permanent(message))),
    }
}

/// Short key, human text and whether the outcome counts as good.
fn describe(outcome: &DispatchOutcome) -> (String, String, bool) {
    match outcome {
        DispatchOutcome::Confirmed { key, simulated } => {
            let text = if *simulated { "simulated" } else { "confirmed" };
            (key.short().to_string(), text.to_string(), true)
        }
        DispatchOutcome::Failed { key, reason } => {
            (key.short().to_string(), format!("failed: {reason}"), false)
        }
        DispatchOutcome::Skipped(SkipReason::Duplicate) => {
            ("-".to_string(), "skipped: duplicate".to_string(), true)
        }
        DispatchOutcome::Skipped(SkipReason::InFlight) => {
            ("-".to_string(), "skipped: trade in flight".to_string(), true)
        }
        DispatchOutcome::Abandoned { key, reason } => {
            (key.short().to_string(), format!("abandoned: {reason}"), false)
        }
    }
}
