/// Shared constants for the wagerdeck engine
///
/// Centralizes tolerances, timing defaults and the simulated failure set so
/// the distributor, lifecycle simulator and tests agree on the same values.

/// Absolute tolerance for allocation sums and per-account caps.
///
/// An allocation is conserved when `|total - sum|` stays within this bound,
/// and an account is within its cap when `allocated <= max_bet + tolerance`.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// Smallest amount the reconciliation pass will assign to an account.
pub const MIN_ALLOCATION: f64 = 0.01;

/// Hard ceiling on redistribution passes.
///
/// The redistribution loop must terminate within this budget regardless of
/// input shape.
pub const MAX_DISTRIBUTION_PASSES: usize = 100;

/// Noise multiplier bounds for noisy-mode distribution, applied to each
/// increment before capping.
pub const NOISE_FACTOR_MIN: f64 = 0.85;
pub const NOISE_FACTOR_MAX: f64 = 1.15;

/// Significant digits for noisy-mode rounding.
pub const NOISE_SIG_DIGITS: u32 = 2;

/// Significant digits allowed in the final reconciliation pass when two
/// digits cannot close the gap to the requested total.
pub const RECONCILE_SIG_DIGITS: u32 = 3;

/// Base delay before the first acknowledgement fires.
pub const ACK_BASE_DELAY_MS: u64 = 500;

/// Additional acknowledgement delay per submission index.
///
/// Staggering by index preserves submission order across the batch.
pub const ACK_STAGGER_MS: u64 = 200;

/// Grace period between the last scheduled acknowledgement and the start of
/// the resolution window.
pub const ACK_GRACE_MS: u64 = 1_000;

/// Uniform resolution delay window, half-open: `[min, max)`.
pub const RESOLVE_DELAY_MIN_MS: u64 = 1_000;
pub const RESOLVE_DELAY_MAX_MS: u64 = 3_000;

/// Probability that a simulated bet settles as won.
pub const SUCCESS_PROBABILITY: f64 = 0.8;

/// Delay before a fully-successful batch dismisses itself.
///
/// A batch with any failed bet never auto-dismisses.
pub const AUTO_DISMISS_MS: u64 = 3_000;

/// Interval for the display-only elapsed ticker.
pub const TICKER_INTERVAL_MS: u64 = 100;

/// Fixed set of simulated failure reasons, drawn uniformly at resolution.
pub const FAILURE_REASONS: [&str; 6] = [
    "Insufficient funds",
    "Bet limit exceeded",
    "Connection timeout",
    "Invalid bet amount",
    "Account temporarily unavailable",
    "Network error",
];
