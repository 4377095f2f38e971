//! Strategy engine: probability adjustment, value-bet scoring, Kelly
//! stake sizing and the day's staked propositions.

pub mod adjust;
pub mod edge;
pub mod kelly;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::types::{BetResult, BettingError, Proposition, ValueBetRow};
use kelly::StakeSizer;

/// Player column of a combined bet.
pub const COMBINED_PLAYER: &str = "Combiné";
/// Type column of a combined bet.
pub const COMBINED_TYPE: &str = "COMBINE";
/// Bookmaker column of a combined bet.
pub const COMBINED_BOOKMAKER: &str = "Custom";

fn round_to(x: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (x * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Combined bets
// ---------------------------------------------------------------------------

/// Priced and staked combination of propositions, before it is added to
/// the day's list.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedBet {
    /// Product of leg odds, 2 dp.
    pub odds: f64,
    /// Product of leg probabilities, 4 dp.
    pub probability: f64,
    pub value: f64,
    pub stake: Decimal,
    /// `"A o8.5 + B o4.5"`
    pub details: String,
    pub legs: usize,
}

/// Resolve selected indices into legs, in selection order.
pub fn pick_legs(propositions: &[Proposition], indices: &[usize]) -> Result<Vec<Proposition>, BettingError> {
    indices
        .iter()
        .map(|&i| {
            propositions
                .get(i)
                .cloned()
                .ok_or(BettingError::PropositionNotFound(i))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Turns value-bet rows into the day's staked propositions.
pub struct PropositionBuilder {
    sizer: StakeSizer,
}

impl PropositionBuilder {
    pub fn new(sizer: StakeSizer) -> Self {
        Self { sizer }
    }

    pub fn sizer(&self) -> &StakeSizer {
        &self.sizer
    }

    /// Stake every row at `kelly_fraction` of full Kelly; rows with odds
    /// at or below 1 or a zero stake are dropped.
    ///
    /// The stake is sized on the unrounded probability; the stored
    /// probability and value are rounded to 3 dp.
    pub fn build(
        &self,
        rows: &[ValueBetRow],
        bankroll: Decimal,
        kelly_fraction: f64,
        date: NaiveDate,
    ) -> Result<Vec<Proposition>, BettingError> {
        if !(kelly_fraction > 0.0 && kelly_fraction <= 1.0) {
            return Err(BettingError::InvalidKellyFraction(kelly_fraction));
        }
        let mut propositions = Vec::new();

        for row in rows {
            let probability = row.adjusted_probability.min(1.0);
            if !row.odds.is_finite() || row.odds <= 1.0 || !probability.is_finite() {
                debug!(player = %row.player, odds = row.odds, "Skipping row with unusable odds");
                continue;
            }

            let stake = match self.sizer.stake(bankroll, row.odds, probability, kelly_fraction) {
                Ok(stake) => stake,
                Err(e @ (BettingError::InvalidKellyFraction(_) | BettingError::InvalidBankroll(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    debug!(player = %row.player, error = %e, "Skipping unsizable row");
                    continue;
                }
            };
            if stake <= Decimal::ZERO {
                continue;
            }

            propositions.push(Proposition {
                date,
                player: row.player.clone(),
                prop_type: row.prop_type.clone(),
                line: Some(row.line),
                odds: row.odds,
                probability: round_to(probability, 3),
                value: round_to(row.adjusted_value, 3),
                stake,
                mean: row.mean,
                std_dev: row.std_dev,
                defense_rank: Some(row.defense_rank),
                result: BetResult::Pending,
                profit: Decimal::ZERO,
                bankroll_after: bankroll,
                bookmaker: Some(row.bookmaker.clone()),
                details: None,
            });
        }

        info!(
            rows = rows.len(),
            propositions = propositions.len(),
            kelly_fraction,
            bankroll = %bankroll,
            "Propositions built"
        );
        Ok(propositions)
    }

    /// Price and stake a combination of legs.
    pub fn preview_combined(
        &self,
        legs: &[Proposition],
        bankroll: Decimal,
        kelly_fraction: f64,
    ) -> Result<CombinedBet, BettingError> {
        if legs.is_empty() {
            return Err(BettingError::EmptyCombination);
        }

        let odds = round_to(legs.iter().map(|l| l.odds).product(), 2);
        let probability = round_to(legs.iter().map(|l| l.probability).product(), 4);
        let value = odds * probability - 1.0;
        let stake = self.sizer.stake(bankroll, odds, probability, kelly_fraction)?;
        let details = legs
            .iter()
            .map(Proposition::label)
            .collect::<Vec<_>>()
            .join(" + ");

        Ok(CombinedBet {
            odds,
            probability,
            value,
            stake,
            details,
            legs: legs.len(),
        })
    }

    /// Combined bet as a proposition row.
    pub fn combine(
        &self,
        legs: &[Proposition],
        bankroll: Decimal,
        kelly_fraction: f64,
        date: NaiveDate,
    ) -> Result<Proposition, BettingError> {
        let combined = self.preview_combined(legs, bankroll, kelly_fraction)?;
        info!(
            legs = combined.legs,
            odds = combined.odds,
            probability = format!("{:.2}%", combined.probability * 100.0),
            stake = %combined.stake,
            "Combined bet created"
        );

        Ok(Proposition {
            date,
            player: COMBINED_PLAYER.to_string(),
            prop_type: COMBINED_TYPE.to_string(),
            line: None,
            odds: combined.odds,
            probability: combined.probability,
            value: combined.value,
            stake: combined.stake,
            mean: None,
            std_dev: None,
            defense_rank: None,
            result: BetResult::Pending,
            profit: Decimal::ZERO,
            bankroll_after: bankroll,
            bookmaker: Some(COMBINED_BOOKMAKER.to_string()),
            details: Some(combined.details),
        })
    }
}

impl Default for PropositionBuilder {
    fn default() -> Self {
        Self::new(StakeSizer::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn row(player: &str, line: f64, odds: f64, probability: f64) -> ValueBetRow {
        ValueBetRow {
            player: player.into(),
            matchup: "Boston Celtics @ Los Angeles Lakers".into(),
            prop_type: "POINTS".into(),
            line,
            odds,
            bookmaker: "Unibet".into(),
            position: "SF".into(),
            team: "LAL".into(),
            opponent: "BOS".into(),
            opponent_name: "Boston Celtics".into(),
            defense_rank: 22,
            mean: Some(24.2),
            std_dev: Some(3.1),
            hit_rate: probability,
            adjusted_probability: probability,
            adjusted_value: probability * odds - 1.0,
        }
    }

    fn leg(player: &str, line: f64, odds: f64, probability: f64) -> Proposition {
        Proposition {
            date: today(),
            player: player.into(),
            prop_type: "POINTS".into(),
            line: Some(line),
            odds,
            probability,
            value: probability * odds - 1.0,
            stake: dec!(5),
            mean: None,
            std_dev: None,
            defense_rank: None,
            result: BetResult::Pending,
            profit: Decimal::ZERO,
            bankroll_after: dec!(500),
            bookmaker: None,
            details: None,
        }
    }

    #[test]
    fn test_build_proposition_fields() {
        let builder = PropositionBuilder::default();
        let props = builder
            .build(&[row("LeBron James", 24.5, 2.0, 0.6)], dec!(500), 1.0, today())
            .unwrap();

        assert_eq!(props.len(), 1);
        let p = &props[0];
        assert_eq!(p.stake, dec!(17.00));
        assert_eq!(p.result, BetResult::Pending);
        assert_eq!(p.profit, Decimal::ZERO);
        assert_eq!(p.bankroll_after, dec!(500));
        assert_eq!(p.line, Some(24.5));
        assert_eq!(p.defense_rank, Some(22));
        assert_eq!(p.bookmaker.as_deref(), Some("Unibet"));
        assert_eq!(p.date, today());
    }

    #[test]
    fn test_build_rounds_probability_and_value() {
        let builder = PropositionBuilder::default();
        let props = builder
            .build(&[row("Jalen Brunson", 6.5, 2.0, 0.6666)], dec!(500), 1.0, today())
            .unwrap();
        assert_eq!(props[0].probability, 0.667);
        assert_eq!(props[0].value, 0.333);
        assert_eq!(props[0].mean, Some(24.2));
    }

    #[test]
    fn test_combined_uses_rounded_leg_probabilities() {
        let builder = PropositionBuilder::default();
        let rows = [
            row("Jalen Brunson", 6.5, 2.0, 0.6666),
            row("Josh Hart", 8.5, 2.0, 0.6666),
        ];
        let legs = builder.build(&rows, dec!(500), 1.0, today()).unwrap();
        let combined = builder.preview_combined(&legs, dec!(500), 1.0).unwrap();
        // 0.667 * 0.667 = 0.444889, not 0.6666^2 = 0.44435556
        assert_eq!(combined.probability, 0.4449);
        assert_eq!(combined.odds, 4.0);
    }

    #[test]
    fn test_build_clamps_probability() {
        let builder = PropositionBuilder::default();
        let props = builder
            .build(&[row("LeBron James", 24.5, 1.5, 1.2)], dec!(500), 1.0, today())
            .unwrap();
        assert_eq!(props[0].probability, 1.0);
        // Cap at p = 1 is 5% of bankroll.
        assert_eq!(props[0].stake, dec!(25.00));
    }

    #[test]
    fn test_build_skips_bad_odds_and_zero_stakes() {
        let builder = PropositionBuilder::default();
        let rows = vec![
            row("Odds One", 10.5, 1.0, 0.9),
            row("Negative Edge", 10.5, 1.5, 0.5),
            row("Good", 10.5, 2.2, 0.6),
        ];
        let props = builder.build(&rows, dec!(500), 0.5, today()).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].player, "Good");
    }

    #[test]
    fn test_build_rejects_bad_fraction() {
        let builder = PropositionBuilder::default();
        let result = builder.build(&[row("A", 1.5, 2.0, 0.6)], dec!(500), 0.0, today());
        assert!(matches!(result, Err(BettingError::InvalidKellyFraction(_))));
    }

    #[test]
    fn test_kelly_fraction_scales_stake() {
        let builder = PropositionBuilder::default();
        let rows = [row("A", 1.5, 2.0, 0.6)];
        let low = builder.build(&rows, dec!(500), 0.1, today()).unwrap();
        let high = builder.build(&rows, dec!(500), 1.0, today()).unwrap();
        assert!(low[0].stake < high[0].stake);
    }

    #[test]
    fn test_combined_bet_pricing() {
        let builder = PropositionBuilder::default();
        let legs = vec![
            leg("Jayson Tatum", 8.5, 1.80, 0.55),
            leg("Derrick White", 4.5, 2.10, 0.50),
        ];
        let combined = builder.preview_combined(&legs, dec!(500), 1.0).unwrap();

        assert_eq!(combined.odds, 3.78);
        assert_eq!(combined.probability, 0.275);
        assert!((combined.value - 0.0395).abs() < 1e-9);
        assert_eq!(combined.stake, dec!(7.10));
        assert_eq!(combined.details, "Jayson Tatum o8.5 + Derrick White o4.5");
        assert_eq!(combined.legs, 2);
    }

    #[test]
    fn test_combine_proposition_row() {
        let builder = PropositionBuilder::default();
        let legs = vec![
            leg("Jayson Tatum", 8.5, 1.80, 0.55),
            leg("Derrick White", 4.5, 2.10, 0.50),
        ];
        let p = builder.combine(&legs, dec!(500), 1.0, today()).unwrap();
        assert_eq!(p.player, COMBINED_PLAYER);
        assert_eq!(p.prop_type, COMBINED_TYPE);
        assert_eq!(p.bookmaker.as_deref(), Some(COMBINED_BOOKMAKER));
        assert_eq!(p.line, None);
        assert_eq!(p.label(), "Combiné");
        assert!(p.details.unwrap().contains(" + "));
    }

    #[test]
    fn test_empty_combination_rejected() {
        let builder = PropositionBuilder::default();
        assert!(matches!(
            builder.preview_combined(&[], dec!(500), 1.0),
            Err(BettingError::EmptyCombination)
        ));
    }

    #[test]
    fn test_pick_legs() {
        let props = vec![leg("A", 1.5, 2.0, 0.6), leg("B", 2.5, 2.0, 0.6)];
        let legs = pick_legs(&props, &[1, 0]).unwrap();
        assert_eq!(legs[0].player, "B");
        assert!(matches!(
            pick_legs(&props, &[0, 5]),
            Err(BettingError::PropositionNotFound(5))
        ));
    }
}
