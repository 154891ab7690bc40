/// Type-safe wrappers for domain primitives
///
/// These types enforce validation at construction time so downstream code
/// never handles a non-positive stake or a malformed odds string.
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Stake must be positive, got {0}")]
    NonPositiveStake(f64),

    #[error("Stake is not a finite number")]
    NonFiniteStake,

    #[error("Stake could not be parsed: {0:?}")]
    UnparsableStake(String),

    #[error("Invalid odds string: {0:?}")]
    InvalidOddsFormat(String),

    #[error("Odds value must be non-zero")]
    ZeroOdds,
}

/// A validated stake amount in account currency.
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Stake(f64);

impl Stake {
    pub fn new(amount: f64) -> Result<Self, ValidationError> {
        if !amount.is_finite() {
            return Err(ValidationError::NonFiniteStake);
        }
        if amount <= 0.0 {
            return Err(ValidationError::NonPositiveStake(amount));
        }
        Ok(Self(amount))
    }

    /// Parse a free-form amount field.
    ///
    /// Rejects non-numeric, non-finite and non-positive input without side
    /// effects; whitespace is tolerated.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let amount: f64 = trimmed
            .parse()
            .map_err(|_| ValidationError::UnparsableStake(input.to_string()))?;
        Self::new(amount)
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Stake {
    type Error = ValidationError;

    fn try_from(amount: f64) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl std::fmt::Display for Stake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// American-style odds, parsed from strings like `"+150"` or `"-120"`.
///
/// Positive odds quote the profit on a 100 stake; negative odds quote the
/// stake required to profit 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmericanOdds(i32);

impl AmericanOdds {
    pub fn new(value: i32) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::ZeroOdds);
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Total return (stake plus profit) for a winning bet of `amount`.
    ///
    /// `+O`: amount + amount * O / 100. `-O`: amount + amount * 100 / |O|.
    pub fn payout(&self, amount: f64) -> f64 {
        if self.0 > 0 {
            amount + amount * f64::from(self.0) / 100.0
        } else {
            amount + amount * 100.0 / f64::from(self.0.abs())
        }
    }
}

impl std::str::FromStr for AmericanOdds {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidOddsFormat(s.to_string()));
        }
        // "+150" parses as 150; "-120" as -120. A bare "150" is taken as
        // positive odds, matching the sign convention of the odds feed.
        let value: i32 = trimmed
            .parse()
            .map_err(|_| ValidationError::InvalidOddsFormat(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<&str> for AmericanOdds {
    type Error = ValidationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for AmericanOdds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 > 0 {
            write!(f, "+{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
