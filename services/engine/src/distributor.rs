//! Stake distribution across capped accounts
//!
//! Splits a total stake over the eligible accounts of a platform, respecting
//! each account's cap, redistributing remainder in bounded passes, and
//! reporting anything irrecoverable as an explicit shortfall.

use rand::Rng;
use serde::{Deserialize, Serialize};

use shared::constants::{
    AMOUNT_TOLERANCE, MIN_ALLOCATION, NOISE_SIG_DIGITS, RECONCILE_SIG_DIGITS,
};
use shared::errors::EngineError;

use crate::accounts::Account;
use crate::config::DistributionConfig;
use crate::rounding::round_to_sig_digits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    /// Deterministic even split with remainder redistribution.
    Even,
    /// Even split with randomized per-increment noise and significant-digit
    /// rounding; used for quick-amount presets.
    Noisy,
}

/// An account's identity and its hard stake ceiling, as seen by the
/// distributor. The caller filters out ineligible accounts beforehand.
#[derive(Debug, Clone)]
pub struct CappedAccount {
    pub account_id: String,
    pub max_bet: f64,
}

impl CappedAccount {
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            max_bet: account.max_bet(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub account_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct AllocationResult {
    /// Per-account amounts, in the caller's account order.
    pub allocations: Vec<Allocation>,
    /// Requested total minus the sum actually placed. Non-zero when the
    /// request exceeds aggregate capacity; never an error.
    pub shortfall: f64,
}

impl AllocationResult {
    pub fn total_allocated(&self) -> f64 {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    pub fn amount_for(&self, account_id: &str) -> Option<f64> {
        self.allocations
            .iter()
            .find(|a| a.account_id == account_id)
            .map(|a| a.amount)
    }
}

/// Distribute `total` across `accounts`, respecting each `max_bet`.
///
/// Invariants on the result:
/// - every amount is in `[0, max_bet]` (0.01 tolerance);
/// - the sum never exceeds `total` by more than 0.01;
/// - when `total <= sum(max_bet)`, the sum lands within 0.01 of `total`;
///   otherwise every account is filled to its cap and the excess is
///   reported as `shortfall`;
/// - the redistribution loop terminates within `config.max_passes`.
///
/// # Errors
/// `InvalidInput` for a non-finite or non-positive total,
/// `NoEligibleAccounts` for an empty account list. Neither leaves partial
/// state behind.
pub fn distribute<R: Rng>(
    total: f64,
    accounts: &[CappedAccount],
    mode: DistributionMode,
    config: &DistributionConfig,
    rng: &mut R,
) -> Result<AllocationResult, EngineError> {
    if !total.is_finite() || total <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "Distribution total must be positive, got {total}"
        )));
    }
    if accounts.is_empty() {
        return Err(EngineError::NoEligibleAccounts);
    }

    let n = accounts.len();
    let caps: Vec<f64> = accounts.iter().map(|a| a.max_bet.max(0.0)).collect();
    let mut amounts = vec![0.0_f64; n];
    let mut remainder = total;

    // First pass: an even share per account, noise-scaled in noisy mode,
    // clamped to the cap and to the budget still unassigned.
    let base_share = total / n as f64;
    for i in 0..n {
        let share = scaled_share(base_share, mode, config, rng);
        let increment = share.min(caps[i] - amounts[i]).min(remainder).max(0.0);
        amounts[i] += increment;
        remainder -= increment;
    }

    // Redistribution: spread what is left over the accounts still below
    // their cap. Stops when the remainder is negligible, the pass budget is
    // spent, or a pass adds nothing (no headroom anywhere).
    let mut passes = 0;
    while remainder > AMOUNT_TOLERANCE && passes < config.max_passes {
        let open: Vec<usize> = (0..n)
            .filter(|&i| caps[i] - amounts[i] > f64::EPSILON)
            .collect();
        if open.is_empty() {
            break;
        }

        let share = remainder / open.len() as f64;
        let mut added = 0.0;
        for &i in &open {
            if remainder <= AMOUNT_TOLERANCE {
                break;
            }
            let scaled = scaled_share(share, mode, config, rng);
            let increment = scaled.min(caps[i] - amounts[i]).min(remainder).max(0.0);
            amounts[i] += increment;
            remainder -= increment;
            added += increment;
        }

        if added <= f64::EPSILON {
            break;
        }
        passes += 1;
    }

    // Noisy rounding can leave a residual gap the loop cannot close; settle
    // it on the last account with headroom, floor 0.01, clamped to its cap.
    if mode == DistributionMode::Noisy && remainder > AMOUNT_TOLERANCE {
        if let Some(i) = (0..n)
            .rev()
            .find(|&i| caps[i] - amounts[i] > f64::EPSILON)
        {
            let headroom = caps[i] - amounts[i];
            let target = remainder.min(headroom);
            let increment = reconcile_increment(target, headroom);
            if increment > 0.0 {
                amounts[i] += increment;
                remainder -= increment;
            }
        }
    }

    let shortfall = remainder.max(0.0);
    if shortfall > AMOUNT_TOLERANCE {
        tracing::debug!(
            total,
            shortfall,
            passes,
            account_count = n,
            "Distribution left an undistributed remainder"
        );
    }

    Ok(AllocationResult {
        allocations: accounts
            .iter()
            .zip(amounts)
            .map(|(account, amount)| Allocation {
                account_id: account.account_id.clone(),
                amount,
            })
            .collect(),
        shortfall,
    })
}

fn scaled_share<R: Rng>(
    share: f64,
    mode: DistributionMode,
    config: &DistributionConfig,
    rng: &mut R,
) -> f64 {
    match mode {
        DistributionMode::Even => share,
        DistributionMode::Noisy => {
            let factor = if config.noise_min < config.noise_max {
                rng.gen_range(config.noise_min..config.noise_max)
            } else {
                config.noise_min
            };
            round_to_sig_digits(share * factor, NOISE_SIG_DIGITS)
        }
    }
}

/// Best-effort nice rounding for the reconciliation increment: two
/// significant digits when that still closes the gap, three as a fallback,
/// the exact residual otherwise. The conservation tolerance is the contract;
/// the rounding is cosmetic.
fn reconcile_increment(target: f64, headroom: f64) -> f64 {
    for digits in [NOISE_SIG_DIGITS, RECONCILE_SIG_DIGITS] {
        let rounded = round_to_sig_digits(target, digits);
        if rounded >= MIN_ALLOCATION
            && rounded <= headroom + f64::EPSILON
            && (target - rounded).abs() <= AMOUNT_TOLERANCE
        {
            return rounded.min(headroom);
        }
    }
    target.clamp(0.0, headroom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn capped(entries: &[(&str, f64)]) -> Vec<CappedAccount> {
        entries
            .iter()
            .map(|(id, max_bet)| CappedAccount {
                account_id: id.to_string(),
                max_bet: *max_bet,
            })
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_even_split_uncapped() {
        let accounts = capped(&[("a", 1_000.0), ("b", 1_000.0), ("c", 1_000.0)]);
        let result = distribute(
            300.0,
            &accounts,
            DistributionMode::Even,
            &DistributionConfig::default(),
            &mut rng(),
        )
        .unwrap();

        for allocation in &result.allocations {
            assert!((allocation.amount - 100.0).abs() < AMOUNT_TOLERANCE);
        }
        assert!((result.total_allocated() - 300.0).abs() <= AMOUNT_TOLERANCE);
        assert!(result.shortfall <= AMOUNT_TOLERANCE);
    }

    #[test]
    fn test_capped_accounts_receive_redistributed_excess() {
        // 1000 across caps [400, 1000000, 200]: the tight caps fill and the
        // excess lands on the unbounded account.
        let accounts = capped(&[("a", 400.0), ("b", 1_000_000.0), ("c", 200.0)]);
        let result = distribute(
            1_000.0,
            &accounts,
            DistributionMode::Even,
            &DistributionConfig::default(),
            &mut rng(),
        )
        .unwrap();

        assert!((result.total_allocated() - 1_000.0).abs() <= AMOUNT_TOLERANCE);
        assert!(result.amount_for("a").unwrap() <= 400.0 + AMOUNT_TOLERANCE);
        assert!(result.amount_for("c").unwrap() <= 200.0 + AMOUNT_TOLERANCE);
        assert!((result.amount_for("c").unwrap() - 200.0).abs() <= AMOUNT_TOLERANCE);
        assert!(result.amount_for("b").unwrap() > 300.0);
        assert!(result.shortfall <= AMOUNT_TOLERANCE);
    }

    #[test]
    fn test_total_exceeding_capacity_fills_caps_and_reports_shortfall() {
        let accounts = capped(&[("a", 100.0), ("b", 50.0)]);
        let result = distribute(
            500.0,
            &accounts,
            DistributionMode::Even,
            &DistributionConfig::default(),
            &mut rng(),
        )
        .unwrap();

        assert!((result.amount_for("a").unwrap() - 100.0).abs() <= AMOUNT_TOLERANCE);
        assert!((result.amount_for("b").unwrap() - 50.0).abs() <= AMOUNT_TOLERANCE);
        assert!((result.shortfall - 350.0).abs() <= AMOUNT_TOLERANCE);
    }

    #[test]
    fn test_all_zero_caps_allocates_nothing() {
        let accounts = capped(&[("a", 0.0), ("b", 0.0)]);
        let result = distribute(
            250.0,
            &accounts,
            DistributionMode::Even,
            &DistributionConfig::default(),
            &mut rng(),
        )
        .unwrap();

        assert!(result.allocations.iter().all(|a| a.amount == 0.0));
        assert!((result.shortfall - 250.0).abs() <= AMOUNT_TOLERANCE);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let accounts = capped(&[("a", 100.0)]);
        let config = DistributionConfig::default();

        assert!(matches!(
            distribute(0.0, &accounts, DistributionMode::Even, &config, &mut rng()),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            distribute(-10.0, &accounts, DistributionMode::Even, &config, &mut rng()),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            distribute(f64::NAN, &accounts, DistributionMode::Even, &config, &mut rng()),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            distribute(100.0, &[], DistributionMode::Even, &config, &mut rng()),
            Err(EngineError::NoEligibleAccounts)
        ));
    }

    #[test]
    fn test_noisy_mode_conserves_total() {
        let accounts = capped(&[
            ("a", 400.0),
            ("b", 800.0),
            ("c", 150.0),
            ("d", 2_500.0),
            ("e", 75.0),
        ]);

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = distribute(
                1_000.0,
                &accounts,
                DistributionMode::Noisy,
                &DistributionConfig::default(),
                &mut rng,
            )
            .unwrap();

            let sum = result.total_allocated();
            assert!(
                sum <= 1_000.0 + AMOUNT_TOLERANCE,
                "seed {seed}: sum {sum} exceeds total"
            );
            assert!(
                (sum - 1_000.0).abs() <= AMOUNT_TOLERANCE,
                "seed {seed}: sum {sum} not conserved"
            );
            for (allocation, account) in result.allocations.iter().zip(&accounts) {
                assert!(allocation.amount >= 0.0);
                assert!(
                    allocation.amount <= account.max_bet + AMOUNT_TOLERANCE,
                    "seed {seed}: {} over cap",
                    allocation.account_id
                );
            }
        }
    }

    #[test]
    fn test_termination_with_uneven_caps() {
        // 50 accounts with wildly uneven caps must stay inside the pass
        // budget and still respect every invariant.
        let accounts: Vec<CappedAccount> = (0..50)
            .map(|i| CappedAccount {
                account_id: format!("acct-{i}"),
                max_bet: match i % 5 {
                    0 => 0.0,
                    1 => 3.5,
                    2 => 10_000.0,
                    3 => 42.0,
                    _ => 0.07,
                },
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(7);
        let result = distribute(
            5_000.0,
            &accounts,
            DistributionMode::Noisy,
            &DistributionConfig::default(),
            &mut rng,
        )
        .unwrap();

        let capacity: f64 = accounts.iter().map(|a| a.max_bet).sum();
        assert!(capacity > 5_000.0);
        assert!((result.total_allocated() - 5_000.0).abs() <= AMOUNT_TOLERANCE);
        for (allocation, account) in result.allocations.iter().zip(&accounts) {
            assert!(allocation.amount <= account.max_bet + AMOUNT_TOLERANCE);
            assert!(allocation.amount >= 0.0);
        }
    }

    #[test]
    fn test_single_account_takes_whole_total() {
        let accounts = capped(&[("solo", 10_000.0)]);
        let result = distribute(
            750.0,
            &accounts,
            DistributionMode::Even,
            &DistributionConfig::default(),
            &mut rng(),
        )
        .unwrap();

        assert!((result.amount_for("solo").unwrap() - 750.0).abs() <= AMOUNT_TOLERANCE);
        assert!(result.shortfall <= AMOUNT_TOLERANCE);
    }
}
