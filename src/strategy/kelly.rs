//! Kelly criterion stake sizing.
//!
//! Fractional Kelly on decimal odds, capped at a share of bankroll that
//! grows linearly with the estimated win probability.

use rust_decimal::prelude::*;
use tracing::debug;

use crate::config::StakingConfig;
use crate::types::BettingError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Stake cap configuration.
#[derive(Debug, Clone)]
pub struct StakeConfig {
    /// Cap as a fraction of bankroll at probability 0.
    pub min_cap_ratio: f64,
    /// Cap as a fraction of bankroll at probability 1.
    pub max_cap_ratio: f64,
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            min_cap_ratio: 0.01,
            max_cap_ratio: 0.05,
        }
    }
}

impl From<&StakingConfig> for StakeConfig {
    fn from(cfg: &StakingConfig) -> Self {
        Self {
            min_cap_ratio: cfg.min_cap_ratio,
            max_cap_ratio: cfg.max_cap_ratio,
        }
    }
}

// ---------------------------------------------------------------------------
// Sizer
// ---------------------------------------------------------------------------

/// Stake recommendation with the intermediate quantities.
#[derive(Debug, Clone)]
pub struct SizedStake {
    pub edge: f64,
    pub raw_stake: f64,
    pub cap: f64,
    /// Final stake, 2 dp, never negative.
    pub stake: Decimal,
}

pub struct StakeSizer {
    config: StakeConfig,
}

impl StakeSizer {
    pub fn new(config: StakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StakeConfig {
        &self.config
    }

    /// Kelly edge on decimal odds: `(o*p - 1) / (o - 1)`.
    pub fn edge(odds: f64, probability: f64) -> Result<f64, BettingError> {
        if !odds.is_finite() || odds <= 1.0 {
            return Err(BettingError::InvalidOdds(odds));
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(BettingError::InvalidProbability(probability));
        }
        Ok((odds * probability - 1.0) / (odds - 1.0))
    }

    /// Share of bankroll the stake is capped at for a win probability.
    pub fn cap_ratio(&self, probability: f64) -> f64 {
        let p = probability.clamp(0.0, 1.0);
        self.config.min_cap_ratio + (self.config.max_cap_ratio - self.config.min_cap_ratio) * p
    }

    /// Size a stake: `max(0, round(min(bankroll*edge*f, bankroll*cap_ratio(p)), 2))`.
    pub fn size(
        &self,
        bankroll: Decimal,
        odds: f64,
        probability: f64,
        kelly_fraction: f64,
    ) -> Result<SizedStake, BettingError> {
        if !(kelly_fraction > 0.0 && kelly_fraction <= 1.0) {
            return Err(BettingError::InvalidKellyFraction(kelly_fraction));
        }
        let bankroll_f = bankroll
            .to_f64()
            .filter(|b| *b > 0.0)
            .ok_or(BettingError::InvalidBankroll(bankroll))?;

        let edge = Self::edge(odds, probability)?;
        let raw_stake = bankroll_f * edge * kelly_fraction;
        let cap = bankroll_f * self.cap_ratio(probability);

        let stake = Decimal::from_f64(raw_stake.min(cap))
            .unwrap_or(Decimal::ZERO)
            .round_dp(2)
            .max(Decimal::ZERO);

        debug!(
            odds,
            probability = format!("{:.1}%", probability * 100.0),
            edge = format!("{:.2}%", edge * 100.0),
            raw = format!("{:.2}", raw_stake),
            cap = format!("{:.2}", cap),
            stake = %stake,
            "Stake sized"
        );

        Ok(SizedStake {
            edge,
            raw_stake,
            cap,
            stake,
        })
    }

    /// Final stake only.
    pub fn stake(
        &self,
        bankroll: Decimal,
        odds: f64,
        probability: f64,
        kelly_fraction: f64,
    ) -> Result<Decimal, BettingError> {
        Ok(self.size(bankroll, odds, probability, kelly_fraction)?.stake)
    }
}

impl Default for StakeSizer {
    fn default() -> Self {
        Self::new(StakeConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
