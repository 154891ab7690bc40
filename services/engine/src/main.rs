use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engine::accounts::{AccountProvider, MockAccountProvider};
use engine::config::Config;
use engine::distributor::{distribute, CappedAccount, DistributionMode};
use engine::history::{HistoryStore, JsonFileHistoryStore};
use engine::lifecycle::{selections_from_allocation, BetLifecycle, MatchInfo};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging with JSON formatting (configurable via env)
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "text".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "engine=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "engine",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting wagerdeck engine"
    );

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        quick_amounts = ?config.quick_amounts,
        history_path = %config.history.path.display(),
        success_probability = config.lifecycle.success_probability,
        "Configuration loaded"
    );

    let provider = MockAccountProvider::with_demo_data();
    let history: Arc<dyn HistoryStore> = Arc::new(
        JsonFileHistoryStore::open(&config.history.path)
            .await
            .context("Failed to open history store")?,
    );

    let platform = "betkings";
    let accounts = provider.eligible_accounts(platform);
    tracing::info!(
        platform,
        eligible_count = accounts.len(),
        "Eligible accounts resolved"
    );

    let caps: Vec<CappedAccount> = accounts.iter().map(CappedAccount::from_account).collect();
    let total = config.quick_amounts.first().copied().unwrap_or(500.0);

    let mut rng = rand::thread_rng();
    let allocation = distribute(
        total,
        &caps,
        DistributionMode::Noisy,
        &config.distribution,
        &mut rng,
    )
    .context("Distribution failed")?;

    for entry in &allocation.allocations {
        tracing::info!(
            account_id = %entry.account_id,
            amount = entry.amount,
            "Stake allocated"
        );
    }
    if allocation.shortfall > 0.0 {
        tracing::warn!(
            shortfall = allocation.shortfall,
            "Requested total exceeded aggregate capacity"
        );
    }

    let match_info = MatchInfo {
        home_team: "Riverton FC".to_string(),
        away_team: "Harbor City".to_string(),
        league: "Premier League".to_string(),
        market: "Moneyline".to_string(),
        odds: "+150".parse().context("Invalid demo odds")?,
    };

    let lifecycle = BetLifecycle::new(config.lifecycle.clone(), history.clone());
    let selections = selections_from_allocation(&accounts, &allocation);
    let handle = lifecycle
        .submit(platform, &match_info, selections)
        .await
        .context("Submission failed")?;

    tracing::info!(batch_id = %handle.batch_id(), bet_count = handle.len(), "Batch in flight");

    tokio::select! {
        settled = handle.wait_settled() => {
            if settled {
                tracing::info!(batch_id = %handle.batch_id(), "Batch settled");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            handle.cancel();
        }
    }

    for record in history.recent(handle.len()).await? {
        tracing::info!(
            record_id = %record.id,
            account = %record.account_name,
            amount = record.amount,
            status = ?record.status,
            payout = ?record.payout,
            error = ?record.error,
            elapsed_ms = ?record.elapsed_ms,
            "History record"
        );
    }

    tracing::info!("Engine stopped");

    Ok(())
}
