//! Cycle scheduling and coordination.
//!
//! At most one cycle runs at a time. Triggers that arrive while a cycle is
//! running collapse into a single "run again" permit. The cycle deadline
//! bounds the snapshot fetch and the alert fan-out, and stops new dispatch
//! work from starting; dispatches that already started always run to
//! completion. A cycle that overruns its deadline is marked degraded.
//!
//! Between cycles the run loop also checks health, settles trades whose
//! holds lapsed, and sends daily reports.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::context::AgentContext;
use super::dispatch::{AbandonReason, DispatchOutcome, DispatchRequest, SkipReason};
use super::notice;
use super::report;
use super::throttle::Delivery;
use crate::domain::agent::{AgentError, AgentState, CycleCounters, CycleOutcome, ErrorClass};
use crate::domain::id::{CycleId, PoolId, TradeTrigger, UserId};
use crate::domain::money::Amount;
use crate::domain::opportunity::Opportunity;
use crate::domain::subscription::Subscription;
use crate::error::{SnapshotError, StoreError};
use crate::port::inbound::manual::ManualInvestRequest;
use crate::port::outbound::messenger::Message;

/// Summary of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: CycleId,
    pub outcome: CycleOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: CycleCounters,
    pub opportunities: Vec<Opportunity>,
    pub dispatches: Vec<DispatchOutcome>,
    /// Attempts used by the snapshot fetch.
    pub fetch_attempts: u32,
    /// Backoff applied between snapshot fetch attempts.
    pub fetch_delays: Vec<Duration>,
    pub error: Option<AgentError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Deadline,
    Shutdown,
}

enum Job {
    Done(DispatchOutcome),
    NotStarted(Stop),
}

/// Result of a periodic health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// The market data health endpoint answered.
    pub api: bool,
    /// The agent state could be read back from the store.
    pub database: bool,
    /// A cycle finished within the last two intervals.
    pub active: bool,
}

impl HealthReport {
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.api && self.database && self.active
    }
}

/// One planned dispatch with the opportunity that produced it.
struct Planned<'a> {
    opportunity: &'a Opportunity,
    request: DispatchRequest,
}

/// Resolves once `shutdown` carries `true`. Never resolves if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owns cycle timing, the agent state and the manual request intake.
pub struct Coordinator {
    ctx: Arc<AgentContext>,
    state: Mutex<AgentState>,
    cycle_lock: tokio::sync::Mutex<()>,
    rerun: Notify,
    healthy: AtomicBool,
    last_health: Mutex<Option<HealthReport>>,
}

impl Coordinator {
    /// Build a coordinator, resuming persisted agent state when present.
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        let state = match ctx.agent_state.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to load agent state, starting fresh");
                AgentState::default()
            }
        };
        Self {
            ctx,
            state: Mutex::new(state),
            cycle_lock: tokio::sync::Mutex::new(()),
            rerun: Notify::new(),
            healthy: AtomicBool::new(true),
            last_health: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    #[must_use]
    pub fn state(&self) -> AgentState {
        self.state.lock().clone()
    }

    /// False after a permanent market data failure, until a fetch succeeds.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Result of the most recent periodic health check.
    #[must_use]
    pub fn last_health(&self) -> Option<HealthReport> {
        *self.last_health.lock()
    }

    /// Request an extra cycle. Repeated requests before it starts coalesce.
    pub fn trigger(&self) {
        self.rerun.notify_one();
    }

    /// Run one full cycle. Waits if another cycle is in progress.
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let _running = self.cycle_lock.lock().await;
        let cycle = self.state.lock().next_cycle();
        let started_at = Utc::now();
        let deadline = Instant::now() + self.ctx.settings.deadline;
        info!(cycle = %cycle, "Cycle started");

        let mut report = CycleReport {
            cycle,
            outcome: CycleOutcome::Completed,
            started_at,
            finished_at: started_at,
            counters: CycleCounters::default(),
            opportunities: Vec::new(),
            dispatches: Vec::new(),
            fetch_attempts: 0,
            fetch_delays: Vec::new(),
            error: None,
        };

        let fetch = tokio::time::timeout_at(
            deadline,
            self.ctx
                .fetch_retry
                .run("list_pools", || self.ctx.market.list_pools()),
        )
        .await;
        let Ok(fetch) = fetch else {
            warn!(cycle = %cycle, "Deadline passed while fetching snapshots");
            report.counters.errors += 1;
            return self.deadline_passed(report, "snapshot fetch did not finish before the deadline");
        };
        report.fetch_attempts = fetch.attempts;
        report.fetch_delays = fetch.delays;

        let snapshots = match fetch.result {
            Ok(snapshots) => {
                self.healthy.store(true, Ordering::Relaxed);
                snapshots
            }
            Err(e) => return self.fetch_failed(report, &e),
        };
        report.counters.pools_monitored = count(snapshots.len());

        report.opportunities = self.ctx.evaluator.evaluate_all(snapshots, cycle);
        report.counters.opportunities = count(report.opportunities.len());
        debug!(cycle = %cycle, opportunities = report.opportunities.len(), "Evaluation complete");

        let subscriptions = match self.ctx.subscriptions.active() {
            Ok(subs) => subs,
            Err(e) => {
                error!(error = %e, "Failed to load subscriptions");
                report.counters.errors += 1;
                Vec::new()
            }
        };

        let opportunities = std::mem::take(&mut report.opportunities);
        let planned = self.plan(&subscriptions, &opportunities, cycle);
        let mut overran = false;
        if self.ctx.settings.alerts {
            let mut sent = 0;
            let alerts = tokio::time::timeout_at(deadline, self.send_alerts(&planned, &mut sent)).await;
            if alerts.is_err() {
                warn!(cycle = %cycle, sent, "Deadline passed while sending alerts");
                overran = true;
            }
            report.counters.alerts_sent = sent;
        }
        let requests: Vec<DispatchRequest> = planned.into_iter().map(|p| p.request).collect();
        report.opportunities = opportunities;

        let (dispatches, stopped) = self.dispatch_all(requests, deadline, shutdown).await;
        for outcome in &dispatches {
            match outcome {
                DispatchOutcome::Confirmed { .. } => report.counters.trades_confirmed += 1,
                DispatchOutcome::Failed { .. } => report.counters.trades_failed += 1,
                DispatchOutcome::Skipped(_) => report.counters.trades_skipped += 1,
                DispatchOutcome::Abandoned { .. } => {
                    report.counters.abandoned += 1;
                    report.counters.errors += 1;
                }
            }
        }
        report.counters.abandoned += count(stopped.len());

        let conflict = dispatches.iter().find_map(|d| match d {
            DispatchOutcome::Abandoned {
                reason: AbandonReason::Store(e @ StoreError::Conflict { .. }),
                ..
            } => Some(e.to_string()),
            _ => None,
        });
        report.dispatches = dispatches;

        let not_started = stopped.iter().filter(|s| **s == Stop::Deadline).count();
        overran = overran || not_started > 0 || Instant::now() > deadline;
        if overran {
            let message = if not_started > 0 {
                format!("{not_started} dispatches not started before the deadline")
            } else {
                "cycle ran past its deadline".to_string()
            };
            report.error = Some(AgentError {
                class: ErrorClass::DeadlineExceeded,
                message,
                at: Utc::now(),
            });
            report.outcome = CycleOutcome::Degraded;
        } else if let Some(message) = conflict {
            report.error = Some(AgentError {
                class: ErrorClass::PersistenceConflict,
                message,
                at: Utc::now(),
            });
        }
        if report.counters.abandoned > 0 {
            report.outcome = CycleOutcome::Degraded;
        }

        self.settle_lapsed_holds().await;
        self.finish(report)
    }

    fn deadline_passed(&self, mut report: CycleReport, message: &str) -> CycleReport {
        report.outcome = CycleOutcome::Degraded;
        report.error = Some(AgentError {
            class: ErrorClass::DeadlineExceeded,
            message: message.to_string(),
            at: Utc::now(),
        });
        self.finish(report)
    }

    /// Roll back expired holds and settle the trades they covered.
    pub async fn settle_lapsed_holds(&self) -> usize {
        let lapsed = self.ctx.risk.sweep_expired();
        if lapsed.is_empty() {
            return 0;
        }
        warn!(count = lapsed.len(), "Expired reservations rolled back");
        for hold in &lapsed {
            self.ctx.dispatcher.settle_lapsed(hold).await;
        }
        lapsed.len()
    }

    /// Check the market API, the store and cycle liveness.
    pub async fn health_check(&self) -> HealthReport {
        let api = self.ctx.market.health().await;
        let database = match self.ctx.agent_state.load() {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Agent state store unreadable");
                false
            }
        };
        let stale_after = self.ctx.settings.interval.saturating_mul(2);
        let active = self.state.lock().last_cycle_end.is_some_and(|end| {
            (Utc::now() - end)
                .to_std()
                .map_or(true, |age| age < stale_after)
        });

        let health = HealthReport {
            api,
            database,
            active,
        };
        if health.is_healthy() {
            info!("Health check passed");
        } else {
            warn!(api, database, active, "Health check found problems");
        }
        *self.last_health.lock() = Some(health);
        health
    }

    fn fetch_failed(&self, mut report: CycleReport, err: &SnapshotError) -> CycleReport {
        let class = match err {
            SnapshotError::Transient(_) => {
                warn!(
                    cycle = %report.cycle,
                    attempts = report.fetch_attempts,
                    error = %err,
                    "Market data unavailable, skipping cycle"
                );
                report.outcome = CycleOutcome::Skipped;
                ErrorClass::TransientProvider
            }
            SnapshotError::Permanent(_) => {
                error!(cycle = %report.cycle, error = %err, "Market data source rejected request, aborting cycle");
                self.healthy.store(false, Ordering::Relaxed);
                report.outcome = CycleOutcome::Aborted;
                ErrorClass::PermanentConfig
            }
        };
        report.counters.errors += 1;
        report.error = Some(AgentError {
            class,
            message: err.to_string(),
            at: Utc::now(),
        });
        self.finish(report)
    }

    fn finish(&self, mut report: CycleReport) -> CycleReport {
        report.finished_at = Utc::now();
        let snapshot = {
            let mut state = self.state.lock();
            state.record_cycle(
                report.cycle,
                report.started_at,
                report.finished_at,
                report.outcome,
                report.counters,
                report.error.clone(),
            );
            state.clone()
        };
        if let Err(e) = self.ctx.agent_state.save(&snapshot) {
            error!(error = %e, "Failed to persist agent state");
        }
        let c = report.counters;
        info!(
            cycle = %report.cycle,
            outcome = %report.outcome,
            pools = c.pools_monitored,
            opportunities = c.opportunities,
            alerts = c.alerts_sent,
            confirmed = c.trades_confirmed,
            failed = c.trades_failed,
            skipped = c.trades_skipped,
            abandoned = c.abandoned,
            "Cycle finished"
        );
        report
    }

    /// Pair subscriptions with opportunities, one request per user and pool.
    fn plan<'a>(
        &self,
        subscriptions: &[Subscription],
        opportunities: &'a [Opportunity],
        cycle: CycleId,
    ) -> Vec<Planned<'a>> {
        let mut seen: HashSet<(UserId, PoolId)> = HashSet::new();
        let mut planned = Vec::new();
        for sub in subscriptions {
            for opp in opportunities.iter().filter(|opp| sub.matches(opp)) {
                if !seen.insert((sub.user, opp.pool_id().clone())) {
                    continue;
                }
                let Some(amount) = sub.amount.or_else(|| self.ctx.sizer.size(opp.snapshot())) else {
                    debug!(user = %sub.user, pool = %opp.pool_id(), "Position size rounds to zero, skipping");
                    continue;
                };
                planned.push(Planned {
                    opportunity: opp,
                    request: DispatchRequest {
                        user: sub.user,
                        pool: opp.pool_id().clone(),
                        trigger: TradeTrigger::Cycle(cycle),
                        mode: sub.mode,
                        amount,
                        daily_limit: sub.max_daily,
                    },
                });
            }
        }
        planned
    }

    /// One alert per user with their best opportunities. Counts deliveries in `sent`.
    async fn send_alerts(&self, planned: &[Planned<'_>], sent: &mut u32) {
        let mut by_user: HashMap<UserId, Vec<(&Opportunity, Amount)>> = HashMap::new();
        for p in planned {
            by_user
                .entry(p.request.user)
                .or_default()
                .push((p.opportunity, p.request.amount));
        }
        for (user, mut picks) in by_user {
            picks.sort_by(|a, b| {
                b.0.confidence()
                    .total_cmp(&a.0.confidence())
                    .then_with(|| a.0.pool_id().cmp(b.0.pool_id()))
            });
            let delivery = self
                .ctx
                .throttler
                .enqueue(user, notice::opportunity_alert(&picks))
                .await;
            if delivery == Delivery::Delivered {
                *sent += 1;
            }
        }
    }

    /// Fan dispatches out under the concurrency limit.
    ///
    /// Returns finished outcomes and the stop reason for every job that
    /// never started.
    async fn dispatch_all(
        &self,
        requests: Vec<DispatchRequest>,
        deadline: Instant,
        shutdown: &watch::Receiver<bool>,
    ) -> (Vec<DispatchOutcome>, Vec<Stop>) {
        let semaphore = Arc::new(Semaphore::new(self.ctx.settings.concurrency.max(1)));
        let mut jobs = JoinSet::new();
        for request in requests {
            let dispatcher = Arc::clone(&self.ctx.dispatcher);
            let semaphore = Arc::clone(&semaphore);
            let mut shutdown = shutdown.clone();
            jobs.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = wait_for_shutdown(&mut shutdown) => return Job::NotStarted(Stop::Shutdown),
                    () = tokio::time::sleep_until(deadline) => return Job::NotStarted(Stop::Deadline),
                    permit = semaphore.acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    return Job::NotStarted(Stop::Shutdown);
                };
                if *shutdown.borrow() {
                    return Job::NotStarted(Stop::Shutdown);
                }
                if Instant::now() >= deadline {
                    return Job::NotStarted(Stop::Deadline);
                }
                Job::Done(dispatcher.dispatch(request).await)
            });
        }

        let mut outcomes = Vec::new();
        let mut stopped = Vec::new();
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(Job::Done(outcome)) => outcomes.push(outcome),
                Ok(Job::NotStarted(stop)) => stopped.push(stop),
                Err(e) => error!(error = %e, "Dispatch task failed"),
            }
        }
        if !stopped.is_empty() {
            warn!(not_started = stopped.len(), "Dispatch work abandoned for this cycle");
        }
        (outcomes, stopped)
    }

    /// Run a user-triggered invest request through the dispatcher.
    pub async fn handle_manual(&self, request: ManualInvestRequest) -> DispatchOutcome {
        let subscription = match self.ctx.subscriptions.for_user(request.user) {
            Ok(subs) => subs
                .into_iter()
                .find(|s| s.active && s.filter.matches(&request.pool)),
            Err(e) => {
                warn!(user = %request.user, error = %e, "Subscription lookup failed, using default mode");
                None
            }
        };
        let mode = subscription
            .as_ref()
            .map_or(self.ctx.settings.default_mode, |s| s.mode);
        let daily_limit = subscription.and_then(|s| s.max_daily);
        info!(
            user = %request.user,
            pool = %request.pool,
            amount = %request.amount,
            request = %request.request_id,
            mode = %mode,
            "Manual invest request"
        );
        let user = request.user;
        let pool = request.pool.clone();
        let outcome = self
            .ctx
            .dispatcher
            .dispatch(DispatchRequest {
                user,
                pool: request.pool,
                trigger: TradeTrigger::Manual(request.request_id),
                mode,
                amount: request.amount,
                daily_limit,
            })
            .await;
        if outcome == DispatchOutcome::Skipped(SkipReason::InFlight) {
            let text = format!("⏳ A trade in {pool} is already in progress, try again shortly.");
            self.ctx.throttler.enqueue(user, Message::text(text)).await;
        }
        outcome
    }

    /// Run cycles until shutdown, serving manual requests alongside.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        manual: mpsc::Receiver<ManualInvestRequest>,
    ) {
        let intake = tokio::spawn(Arc::clone(&self).serve_manual(shutdown.clone(), manual));

        let settings = &self.ctx.settings;
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut health = tokio::time::interval_at(
            Instant::now() + settings.health_interval,
            settings.health_interval,
        );
        health.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reports = tokio::time::interval_at(
            Instant::now() + settings.report_interval,
            settings.report_interval,
        );
        reports.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_secs = settings.interval.as_secs(),
            health_secs = settings.health_interval.as_secs(),
            daily_reports = settings.daily_reports,
            "Coordinator running"
        );

        loop {
            tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown) => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {}
                () = self.rerun.notified() => {
                    debug!("Running requested cycle");
                }
                _ = health.tick() => {
                    self.health_check().await;
                    self.settle_lapsed_holds().await;
                    continue;
                }
                _ = reports.tick(), if settings.daily_reports => {
                    let day = Utc::now().date_naive();
                    report::send_daily_reports(&self.ctx, &self.state(), day).await;
                    continue;
                }
            }
            let report = self.run_cycle(&shutdown).await;
            if report.outcome == CycleOutcome::Aborted {
                error!(cycle = %report.cycle, "Market data source unhealthy");
            }
        }

        if let Err(e) = intake.await {
            error!(error = %e, "Manual intake task failed");
        }
        info!("Coordinator stopped");
    }

    async fn serve_manual(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        mut manual: mpsc::Receiver<ManualInvestRequest>,
    ) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown) => break,
                request = manual.recv() => {
                    let Some(request) = request else { break };
                    let this = Arc::clone(&self);
                    in_flight.spawn(async move { this.handle_manual(request).await });
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }
        while in_flight.join_next().await.is_some() {}
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
