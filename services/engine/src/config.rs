use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use shared::constants;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lifecycle: LifecycleConfig,
    pub distribution: DistributionConfig,
    pub history: HistoryConfig,
    /// Preset totals offered for one-click distribution.
    pub quick_amounts: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    pub ack_base_delay_ms: u64,
    pub ack_stagger_ms: u64,
    pub ack_grace_ms: u64,
    pub resolve_delay_min_ms: u64,
    pub resolve_delay_max_ms: u64,
    pub success_probability: f64,
    pub auto_dismiss_ms: u64,
    pub ticker_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub max_passes: usize,
    pub noise_min: f64,
    pub noise_max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    pub path: PathBuf,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ack_base_delay_ms: constants::ACK_BASE_DELAY_MS,
            ack_stagger_ms: constants::ACK_STAGGER_MS,
            ack_grace_ms: constants::ACK_GRACE_MS,
            resolve_delay_min_ms: constants::RESOLVE_DELAY_MIN_MS,
            resolve_delay_max_ms: constants::RESOLVE_DELAY_MAX_MS,
            success_probability: constants::SUCCESS_PROBABILITY,
            auto_dismiss_ms: constants::AUTO_DISMISS_MS,
            ticker_interval_ms: constants::TICKER_INTERVAL_MS,
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_passes: constants::MAX_DISTRIBUTION_PASSES,
            noise_min: constants::NOISE_FACTOR_MIN,
            noise_max: constants::NOISE_FACTOR_MAX,
        }
    }
}

impl LifecycleConfig {
    /// End of the acknowledgement window for a batch of `n` selections, in
    /// milliseconds after submission. Resolutions are scheduled from here.
    pub fn ack_window_end_ms(&self, n: usize) -> u64 {
        self.ack_base_delay_ms + (n as u64) * self.ack_stagger_ms + self.ack_grace_ms
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            lifecycle: LifecycleConfig {
                ack_base_delay_ms: env_or("ENGINE_ACK_BASE_DELAY_MS", constants::ACK_BASE_DELAY_MS)?,
                ack_stagger_ms: env_or("ENGINE_ACK_STAGGER_MS", constants::ACK_STAGGER_MS)?,
                ack_grace_ms: env_or("ENGINE_ACK_GRACE_MS", constants::ACK_GRACE_MS)?,
                resolve_delay_min_ms: env_or(
                    "ENGINE_RESOLVE_DELAY_MIN_MS",
                    constants::RESOLVE_DELAY_MIN_MS,
                )?,
                resolve_delay_max_ms: env_or(
                    "ENGINE_RESOLVE_DELAY_MAX_MS",
                    constants::RESOLVE_DELAY_MAX_MS,
                )?,
                success_probability: env_or(
                    "ENGINE_SUCCESS_PROBABILITY",
                    constants::SUCCESS_PROBABILITY,
                )?,
                auto_dismiss_ms: env_or("ENGINE_AUTO_DISMISS_MS", constants::AUTO_DISMISS_MS)?,
                ticker_interval_ms: env_or(
                    "ENGINE_TICKER_INTERVAL_MS",
                    constants::TICKER_INTERVAL_MS,
                )?,
            },
            distribution: DistributionConfig {
                max_passes: env_or(
                    "ENGINE_MAX_DISTRIBUTION_PASSES",
                    constants::MAX_DISTRIBUTION_PASSES,
                )?,
                noise_min: env_or("ENGINE_NOISE_FACTOR_MIN", constants::NOISE_FACTOR_MIN)?,
                noise_max: env_or("ENGINE_NOISE_FACTOR_MAX", constants::NOISE_FACTOR_MAX)?,
            },
            history: HistoryConfig {
                path: PathBuf::from(
                    env::var("ENGINE_HISTORY_PATH")
                        .unwrap_or_else(|_| "wagerdeck-history.json".to_string()),
                ),
            },
            quick_amounts: parse_quick_amounts(
                &env::var("ENGINE_QUICK_AMOUNTS").unwrap_or_else(|_| "100,500,1000".to_string()),
            )?,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.parse()?),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of positive preset amounts.
fn parse_quick_amounts(raw: &str) -> anyhow::Result<Vec<f64>> {
    let mut amounts = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let amount: f64 = part.parse()?;
        if !amount.is_finite() || amount <= 0.0 {
            anyhow::bail!("Quick amount must be positive, got {part:?}");
        }
        amounts.push(amount);
    }
    Ok(amounts)
}
