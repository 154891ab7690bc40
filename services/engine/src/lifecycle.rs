//! Simulated bet lifecycle
//!
//! Drives every bet in a submission batch through
//! `Sent -> Acked -> {Succeeded, Failed}` on staggered, cancellable timers.
//! Acknowledgements preserve submission order; resolutions fire
//! independently inside a randomized window, so completion order across a
//! batch is not deterministic. Terminal states absorb: nothing transitions
//! out of them, and a failed bet never disturbs its siblings.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use shared::constants::FAILURE_REASONS;
use shared::errors::{EngineError, Result};
use shared::types::AmericanOdds;

use crate::accounts::Account;
use crate::config::LifecycleConfig;
use crate::diagnostics::{render_failure_artifact, FailureContext};
use crate::distributor::AllocationResult;
use crate::history::{HistoryPatch, HistoryStatus, HistoryStore, NewHistoryRecord};
use crate::scheduler::BatchScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Sent,
    Acked,
    Succeeded,
    Failed,
}

impl BetStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BetStatus::Succeeded | BetStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInfo {
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub market: String,
    pub odds: AmericanOdds,
}

impl MatchInfo {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

/// One account's share of a submission, copied out of the live allocation
/// map at send time so later resets cannot touch it.
#[derive(Debug, Clone)]
pub struct BetSelection {
    pub account: Account,
    pub amount: f64,
}

/// Pair an allocation result back with its accounts, dropping zero amounts.
pub fn selections_from_allocation(
    accounts: &[Account],
    allocation: &AllocationResult,
) -> Vec<BetSelection> {
    accounts
        .iter()
        .filter_map(|account| {
            let amount = allocation.amount_for(&account.id)?;
            (amount > 0.0).then(|| BetSelection {
                account: account.clone(),
                amount,
            })
        })
        .collect()
}

/// Live view of one bet in a batch. `elapsed_ms` is display-only and is
/// refreshed by the ticker until the bet turns terminal.
#[derive(Debug, Clone)]
pub struct TrackedBet {
    pub record_id: Uuid,
    pub account_id: String,
    pub account_name: String,
    pub amount: f64,
    pub status: BetStatus,
    pub payout: Option<f64>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    /// Milliseconds after submission at which the acknowledgement landed.
    pub acked_at_ms: Option<u64>,
    started_at: Instant,
}

struct BatchShared {
    bets: RwLock<Vec<TrackedBet>>,
    dismissed: AtomicBool,
    settled_tx: watch::Sender<usize>,
}

/// Owned, disposable handle to one submission batch. Dropping it leaves the
/// simulation running; `cancel()` tears the whole batch down atomically.
pub struct BatchHandle {
    shared: Arc<BatchShared>,
    scheduler: BatchScheduler,
    settled_rx: watch::Receiver<usize>,
    len: usize,
    batch_id: Uuid,
}

impl BatchHandle {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub async fn snapshot(&self) -> Vec<TrackedBet> {
        self.shared.bets.read().await.clone()
    }

    pub async fn is_settled(&self) -> bool {
        self.shared
            .bets
            .read()
            .await
            .iter()
            .all(|bet| bet.status.is_terminal())
    }

    /// Cancel every pending transition in the batch. Idempotent; records
    /// keep whatever status they had when the token flipped.
    pub fn cancel(&self) {
        self.scheduler.cancel();
        tracing::info!(batch_id = %self.batch_id, "Batch cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.scheduler.is_cancelled()
    }

    /// True once the batch auto-dismissed (all bets won) or the user
    /// dismissed it.
    pub fn is_dismissed(&self) -> bool {
        self.shared.dismissed.load(Ordering::SeqCst)
    }

    pub fn dismiss(&self) {
        self.shared.dismissed.store(true, Ordering::SeqCst);
    }

    /// Wait until every bet is terminal. Returns false if the batch was
    /// cancelled first.
    pub async fn wait_settled(&self) -> bool {
        let mut rx = self.settled_rx.clone();
        loop {
            if *rx.borrow() >= self.len {
                return true;
            }
            tokio::select! {
                _ = self.scheduler.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

pub struct BetLifecycle {
    config: LifecycleConfig,
    history: Arc<dyn HistoryStore>,
}

impl BetLifecycle {
    pub fn new(config: LifecycleConfig, history: Arc<dyn HistoryStore>) -> Self {
        Self { config, history }
    }

    /// Submit a batch. Pending history records are written before this
    /// returns; everything after runs on the batch's own timers.
    ///
    /// # Errors
    /// `InvalidInput` when no selection carries a positive amount; nothing
    /// is written in that case.
    pub async fn submit(
        &self,
        platform: &str,
        match_info: &MatchInfo,
        selections: Vec<BetSelection>,
    ) -> Result<BatchHandle> {
        let selections: Vec<BetSelection> = selections
            .into_iter()
            .filter(|s| s.amount > 0.0)
            .collect();
        if selections.is_empty() {
            return Err(EngineError::InvalidInput(
                "No selections with a positive amount".to_string(),
            ));
        }

        let batch_id = Uuid::new_v4();
        let submitted_at = Instant::now();
        let mut bets = Vec::with_capacity(selections.len());

        for selection in &selections {
            let record_id = self
                .history
                .add_record(NewHistoryRecord {
                    platform: platform.to_string(),
                    account_id: selection.account.id.clone(),
                    account_name: selection.account.name.clone(),
                    match_label: match_info.label(),
                    league: match_info.league.clone(),
                    market: match_info.market.clone(),
                    odds: match_info.odds.to_string(),
                    amount: selection.amount,
                })
                .await?;

            bets.push(TrackedBet {
                record_id,
                account_id: selection.account.id.clone(),
                account_name: selection.account.name.clone(),
                amount: selection.amount,
                status: BetStatus::Sent,
                payout: None,
                error: None,
                elapsed_ms: 0,
                acked_at_ms: None,
                started_at: submitted_at,
            });
        }

        let n = bets.len();
        tracing::info!(
            batch_id = %batch_id,
            bet_count = n,
            platform,
            match_label = %match_info.label(),
            "Batch submitted"
        );
        metrics::counter!("bets_submitted_total").increment(n as u64);

        let (settled_tx, settled_rx) = watch::channel(0usize);
        let shared = Arc::new(BatchShared {
            bets: RwLock::new(bets),
            dismissed: AtomicBool::new(false),
            settled_tx,
        });
        let scheduler = BatchScheduler::new();

        self.schedule_acknowledgements(&shared, &scheduler, n);
        self.schedule_resolutions(&shared, &scheduler, platform, match_info, batch_id, n);
        self.spawn_ticker(&shared, &scheduler);

        Ok(BatchHandle {
            shared,
            scheduler,
            settled_rx,
            len: n,
            batch_id,
        })
    }

    /// Phase 1: the i-th bet acknowledges at `base + i * stagger`, keeping
    /// submission order.
    fn schedule_acknowledgements(
        &self,
        shared: &Arc<BatchShared>,
        scheduler: &BatchScheduler,
        n: usize,
    ) {
        for i in 0..n {
            let delay = Duration::from_millis(
                self.config.ack_base_delay_ms + i as u64 * self.config.ack_stagger_ms,
            );
            let shared = shared.clone();
            scheduler.schedule(delay, async move {
                let mut bets = shared.bets.write().await;
                let bet = &mut bets[i];
                if bet.status == BetStatus::Sent {
                    bet.status = BetStatus::Acked;
                    bet.acked_at_ms = Some(bet.started_at.elapsed().as_millis() as u64);
                    tracing::debug!(record_id = %bet.record_id, index = i, "Bet acknowledged");
                }
            });
        }
    }

    /// Phase 2: at the end of the acknowledgement window, each acked bet
    /// draws its own resolution delay and outcome and settles independently.
    fn schedule_resolutions(
        &self,
        shared: &Arc<BatchShared>,
        scheduler: &BatchScheduler,
        platform: &str,
        match_info: &MatchInfo,
        batch_id: Uuid,
        n: usize,
    ) {
        let window_end = Duration::from_millis(self.config.ack_window_end_ms(n));
        let config = self.config.clone();
        let history = self.history.clone();
        let shared = shared.clone();
        let scheduler_handle = scheduler.clone();
        let platform = platform.to_string();
        let match_info = match_info.clone();

        scheduler.schedule(window_end, async move {
            let acked: Vec<usize> = {
                let bets = shared.bets.read().await;
                bets.iter()
                    .enumerate()
                    .filter(|(_, bet)| bet.status == BetStatus::Acked)
                    .map(|(i, _)| i)
                    .collect()
            };

            let decisions: Vec<(usize, u64, bool, &'static str)> = {
                let mut rng = rand::thread_rng();
                acked
                    .into_iter()
                    .map(|i| {
                        let delay_ms = if config.resolve_delay_min_ms < config.resolve_delay_max_ms
                        {
                            rng.gen_range(
                                config.resolve_delay_min_ms..config.resolve_delay_max_ms,
                            )
                        } else {
                            config.resolve_delay_min_ms
                        };
                        let won = rng.gen_bool(config.success_probability.clamp(0.0, 1.0));
                        let reason = FAILURE_REASONS[rng.gen_range(0..FAILURE_REASONS.len())];
                        (i, delay_ms, won, reason)
                    })
                    .collect()
            };

            for (index, delay_ms, won, reason) in decisions {
                let shared = shared.clone();
                let history = history.clone();
                let scheduler = scheduler_handle.clone();
                let platform = platform.clone();
                let match_info = match_info.clone();
                let auto_dismiss_ms = config.auto_dismiss_ms;
                scheduler_handle.schedule(Duration::from_millis(delay_ms), async move {
                    resolve_bet(
                        shared,
                        history,
                        scheduler,
                        platform,
                        match_info,
                        auto_dismiss_ms,
                        batch_id,
                        index,
                        won,
                        reason,
                    )
                    .await;
                });
            }
        });
    }

    /// Display-only elapsed ticker; never transitions a status and stops as
    /// soon as every bet is terminal.
    fn spawn_ticker(&self, shared: &Arc<BatchShared>, scheduler: &BatchScheduler) {
        let shared = shared.clone();
        let interval_ms = self.config.ticker_interval_ms;
        scheduler.spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut bets = shared.bets.write().await;
                let mut any_open = false;
                for bet in bets.iter_mut() {
                    if !bet.status.is_terminal() {
                        bet.elapsed_ms = bet.started_at.elapsed().as_millis() as u64;
                        any_open = true;
                    }
                }
                if !any_open {
                    break;
                }
            }
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn resolve_bet(
    shared: Arc<BatchShared>,
    history: Arc<dyn HistoryStore>,
    scheduler: BatchScheduler,
    platform: String,
    match_info: MatchInfo,
    auto_dismiss_ms: u64,
    batch_id: Uuid,
    index: usize,
    won: bool,
    reason: &'static str,
) {
    let (record_id, patch, all_settled, all_won) = {
        let mut bets = shared.bets.write().await;
        let bet = &mut bets[index];
        if bet.status != BetStatus::Acked {
            // Stale fire after cancellation or a duplicate; leave the record
            // untouched.
            return;
        }

        let elapsed_ms = bet.started_at.elapsed().as_millis() as u64;
        bet.elapsed_ms = elapsed_ms;
        let completed_at = chrono::Utc::now();

        let patch = if won {
            let payout = match_info.odds.payout(bet.amount);
            bet.status = BetStatus::Succeeded;
            bet.payout = Some(payout);
            tracing::info!(
                record_id = %bet.record_id,
                account = %bet.account_name,
                payout,
                elapsed_ms,
                "Bet succeeded"
            );
            metrics::counter!("bets_won_total").increment(1);
            HistoryPatch {
                status: Some(HistoryStatus::Won),
                payout: Some(payout),
                completed_at: Some(completed_at),
                elapsed_ms: Some(elapsed_ms),
                ..Default::default()
            }
        } else {
            bet.status = BetStatus::Failed;
            bet.error = Some(reason.to_string());
            let artifact = render_failure_artifact(&FailureContext {
                platform: &platform,
                match_label: &match_info.label(),
                market: &match_info.market,
                odds: &match_info.odds.to_string(),
                amount: bet.amount,
                account_name: &bet.account_name,
                error: reason,
            });
            tracing::info!(
                record_id = %bet.record_id,
                account = %bet.account_name,
                error = reason,
                elapsed_ms,
                "Bet failed"
            );
            metrics::counter!("bets_lost_total").increment(1);
            HistoryPatch {
                status: Some(HistoryStatus::Lost),
                error: Some(reason.to_string()),
                error_artifact: Some(artifact),
                completed_at: Some(completed_at),
                elapsed_ms: Some(elapsed_ms),
                ..Default::default()
            }
        };
        metrics::histogram!("bet_settle_duration_seconds").record(elapsed_ms as f64 / 1000.0);

        let all_settled = bets.iter().all(|b| b.status.is_terminal());
        let all_won = bets.iter().all(|b| b.status == BetStatus::Succeeded);
        (bets[index].record_id, patch, all_settled, all_won)
    };

    shared.settled_tx.send_modify(|count| *count += 1);

    if let Err(e) = history.update_record(record_id, patch).await {
        tracing::error!(record_id = %record_id, error = %e, "History update failed");
    }

    if all_settled {
        if all_won {
            tracing::info!(batch_id = %batch_id, "Batch fully succeeded, scheduling auto-dismiss");
            let shared = shared.clone();
            scheduler.schedule(Duration::from_millis(auto_dismiss_ms), async move {
                shared.dismissed.store(true, Ordering::SeqCst);
                tracing::debug!(batch_id = %batch_id, "Batch auto-dismissed");
            });
        } else {
            tracing::info!(
                batch_id = %batch_id,
                "Batch settled with failures, awaiting manual dismissal"
            );
        }
    }
}
