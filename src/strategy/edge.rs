//! Value-bet scoring.
//!
//! Joins each prop with the player's position, recent-form summary and the
//! opponent's defensive rank, adjusts the historical hit-rate and keeps
//! the props whose adjusted value `p * odds - 1` is positive.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use super::adjust::adjust_probability;
use crate::data::tables::{DefenseTable, PositionTable, StatsTable};
use crate::data::teams::{full_name_for, normalize_name, resolve_opponent};
use crate::types::{Prop, StatCategory, ValueBetRow};

// ---------------------------------------------------------------------------
// Exclusions
// ---------------------------------------------------------------------------

/// Why a prop did not become a value bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExclusionReason {
    /// Stat type outside points/rebounds/assists/threes.
    UnsupportedStatType,
    MissingPosition,
    /// Player absent from the stats file, so no team.
    MissingTeam,
    /// Matchup malformed, or the player's team plays on neither side.
    UnresolvedOpponent,
    MissingDefenseRank,
    /// Line not tabulated in the stats file.
    MissingHitRate,
    NonPositiveValue,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExclusionReason::UnsupportedStatType => "unsupported stat type",
            ExclusionReason::MissingPosition => "missing position",
            ExclusionReason::MissingTeam => "missing team",
            ExclusionReason::UnresolvedOpponent => "unresolved opponent",
            ExclusionReason::MissingDefenseRank => "missing defense rank",
            ExclusionReason::MissingHitRate => "missing hit rate",
            ExclusionReason::NonPositiveValue => "non-positive value",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub prop: Prop,
    pub reason: ExclusionReason,
}

/// Outcome of a scoring run: value bets (best first) and every excluded prop.
#[derive(Debug, Clone, Default)]
pub struct ScoreReport {
    pub value_bets: Vec<ValueBetRow>,
    pub exclusions: Vec<Exclusion>,
}

impl ScoreReport {
    pub fn total(&self) -> usize {
        self.value_bets.len() + self.exclusions.len()
    }

    /// Exclusion count per reason.
    pub fn exclusion_counts(&self) -> BTreeMap<ExclusionReason, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.exclusions {
            *counts.entry(e.reason).or_insert(0) += 1;
        }
        counts
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Scores props against the three reference tables.
pub struct ValueBetScorer {
    positions: PositionTable,
    stats: StatsTable,
    defense: DefenseTable,
}

impl ValueBetScorer {
    pub fn new(positions: PositionTable, stats: StatsTable, defense: DefenseTable) -> Self {
        Self {
            positions,
            stats,
            defense,
        }
    }

    /// Score every prop. Value bets are sorted by adjusted value, highest
    /// first; equal values keep input order.
    pub fn score(&self, props: &[Prop]) -> ScoreReport {
        let mut report = ScoreReport::default();

        for prop in props {
            match self.evaluate(prop) {
                Ok(row) => report.value_bets.push(row),
                Err(reason) => {
                    debug!(prop = %prop, reason = %reason, "Prop excluded");
                    report.exclusions.push(Exclusion {
                        prop: prop.clone(),
                        reason,
                    });
                }
            }
        }

        report.value_bets.sort_by(|a, b| {
            b.adjusted_value
                .partial_cmp(&a.adjusted_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            props = props.len(),
            value_bets = report.value_bets.len(),
            excluded = report.exclusions.len(),
            "Scoring complete"
        );
        report
    }

    /// Join and score a single prop.
    pub fn evaluate(&self, prop: &Prop) -> Result<ValueBetRow, ExclusionReason> {
        let category = StatCategory::from_prop_type(&prop.prop_type)
            .ok_or(ExclusionReason::UnsupportedStatType)?;
        let key = normalize_name(&prop.player);

        let position = self
            .positions
            .position(&key)
            .ok_or(ExclusionReason::MissingPosition)?;
        let summary = self.stats.get(&key).ok_or(ExclusionReason::MissingTeam)?;
        if summary.team.trim().is_empty() {
            return Err(ExclusionReason::MissingTeam);
        }

        let opponent = resolve_opponent(&prop.matchup, &summary.team)
            .ok_or(ExclusionReason::UnresolvedOpponent)?;
        let opponent_name = full_name_for(opponent).ok_or(ExclusionReason::UnresolvedOpponent)?;

        let rank = self
            .defense
            .rank(opponent_name, category, position)
            .ok_or(ExclusionReason::MissingDefenseRank)?;
        // Mean and std-dev are informational; a value bet does not need them.
        let stat_line = summary.stat_line(category);
        let hit_rate = summary
            .hit_rate(category, prop.line)
            .ok_or(ExclusionReason::MissingHitRate)?;

        let probability =
            adjust_probability(Some(hit_rate), Some(rank)).ok_or(ExclusionReason::MissingHitRate)?;
        let value = probability * prop.odds - 1.0;
        if !(value > 0.0) {
            return Err(ExclusionReason::NonPositiveValue);
        }

        debug!(
            player = %prop.player,
            prop_type = %prop.prop_type,
            line = prop.line,
            opponent,
            rank,
            hit_rate = format!("{:.0}%", hit_rate * 100.0),
            value = format!("{:+.3}", value),
            "Value bet found"
        );

        Ok(ValueBetRow {
            player: prop.player.clone(),
            matchup: prop.matchup.clone(),
            prop_type: prop.prop_type.clone(),
            line: prop.line,
            odds: prop.odds,
            bookmaker: prop.bookmaker.clone(),
            position: position.to_string(),
            team: summary.team.clone(),
            opponent: opponent.to_string(),
            opponent_name: opponent_name.to_string(),
            defense_rank: rank,
            mean: stat_line.map(|l| l.mean),
            std_dev: stat_line.map(|l| l.std_dev),
            hit_rate,
            adjusted_probability: probability,
            adjusted_value: value,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DefenseRanking, PlayerPosition, PlayerStatSummary, StatLine, ThresholdHits};

    const LAL_BOS: &str = "Boston Celtics @ Los Angeles Lakers";

    fn prop(player: &str, prop_type: &str, line: f64, odds: f64) -> Prop {
        Prop {
            player: player.into(),
            matchup: LAL_BOS.into(),
            prop_type: prop_type.into(),
            line,
            odds,
            bookmaker: "Unibet".into(),
        }
    }

    fn summary(player: &str, team: &str, hits: &[(StatCategory, f64, u32)]) -> PlayerStatSummary {
        let line = StatLine { mean: 20.0, std_dev: 4.0 };
        PlayerStatSummary {
            player: player.into(),
            team: team.into(),
            points: Some(line),
            rebounds: Some(line),
            assists: Some(line),
            threes: None,
            thresholds: hits
                .iter()
                .map(|&(category, line, hits)| ThresholdHits { category, line, hits })
                .collect(),
        }
    }

    fn ranking(team: &str, ranks: &[(&str, u32)]) -> DefenseRanking {
        DefenseRanking {
            team: team.into(),
            ranks: ranks.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
        }
    }

    fn scorer() -> ValueBetScorer {
        let positions = PositionTable::from_rows(vec![
            PlayerPosition { player: "LeBron James".into(), position: "SF".into() },
            PlayerPosition { player: "Jayson Tatum".into(), position: "SF".into() },
            PlayerPosition { player: "Anthony Davis".into(), position: "C".into() },
            PlayerPosition { player: "Derrick White".into(), position: "SG".into() },
            PlayerPosition { player: "Austin Reaves".into(), position: "SG".into() },
            PlayerPosition { player: "Bronny James".into(), position: "PG".into() },
        ]);
        let stats = StatsTable::from_summaries(vec![
            summary("LeBron James", "LAL", &[
                (StatCategory::Points, 24.5, 4),
                (StatCategory::Assists, 7.5, 3),
            ]),
            summary("Jayson Tatum", "BOS", &[(StatCategory::Points, 26.5, 3)]),
            summary("Anthony Davis", "LAL", &[(StatCategory::Rebounds, 11.5, 2)]),
            summary("Derrick White", "BOS", &[(StatCategory::Threes, 2.5, 4)]),
            summary("Bronny James", " ", &[(StatCategory::Points, 4.5, 2)]),
        ]);
        let defense = DefenseTable::from_rankings(vec![
            // LAL players face Boston.
            ranking("Boston Celtics", &[("SF_PTS", 28), ("SF_AST", 15), ("C_REB", 3)]),
            ranking("Los Angeles Lakers", &[("SF_PTS", 12), ("SG_3P", 22)]),
        ]);
        ValueBetScorer::new(positions, stats, defense)
    }

    #[test]
    fn test_value_bet_row_fields() {
        let row = scorer().evaluate(&prop("LeBron James", "POINTS", 24.5, 1.9)).unwrap();
        assert_eq!(row.team, "LAL");
        assert_eq!(row.opponent, "BOS");
        assert_eq!(row.opponent_name, "Boston Celtics");
        assert_eq!(row.position, "SF");
        assert_eq!(row.defense_rank, 28);
        assert_eq!(row.hit_rate, 0.8);
        assert!((row.adjusted_probability - 0.96).abs() < 1e-9);
        assert!((row.adjusted_value - (0.96 * 1.9 - 1.0)).abs() < 1e-9);
        assert_eq!(row.mean, Some(20.0));
        assert_eq!(row.std_dev, Some(4.0));
    }

    #[test]
    fn test_exclusion_reasons() {
        let s = scorer();
        let reason = |p: Prop| s.evaluate(&p).unwrap_err();

        assert_eq!(reason(prop("LeBron James", "STEALS", 1.5, 2.0)), ExclusionReason::UnsupportedStatType);
        assert_eq!(reason(prop("Unknown Guy", "POINTS", 10.5, 2.0)), ExclusionReason::MissingPosition);
        // Tabulated line missing.
        assert_eq!(reason(prop("LeBron James", "POINTS", 25.5, 2.0)), ExclusionReason::MissingHitRate);
        // No SF_REB column for Boston.
        assert_eq!(reason(prop("LeBron James", "REBOUNDS", 7.5, 2.0)), ExclusionReason::MissingDefenseRank);
        // Rank 3 against Davis: 0.4 * 0.8 * 2.0 - 1 < 0
        assert_eq!(reason(prop("Anthony Davis", "REBOUNDS", 11.5, 2.0)), ExclusionReason::NonPositiveValue);
        // Position row but no stats row.
        assert_eq!(reason(prop("Austin Reaves", "POINTS", 14.5, 2.0)), ExclusionReason::MissingTeam);
        // Stats row with a blank team.
        assert_eq!(reason(prop("Bronny James", "POINTS", 4.5, 2.0)), ExclusionReason::MissingTeam);
    }

    #[test]
    fn test_value_bet_without_stat_line() {
        // No threes mean/std-dev for White; rank 22 lifts 0.8 to 0.88.
        let row = scorer().evaluate(&prop("Derrick White", "THREES", 2.5, 2.0)).unwrap();
        assert_eq!(row.mean, None);
        assert_eq!(row.std_dev, None);
        assert_eq!(row.defense_rank, 22);
        assert!((row.adjusted_value - (0.88 * 2.0 - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unresolved_opponent() {
        let s = scorer();
        let mut p = prop("LeBron James", "POINTS", 24.5, 1.9);
        p.matchup = "Miami Heat @ New York Knicks".into();
        assert_eq!(s.evaluate(&p).unwrap_err(), ExclusionReason::UnresolvedOpponent);

        p.matchup = "Lakers vs Celtics".into();
        assert_eq!(s.evaluate(&p).unwrap_err(), ExclusionReason::UnresolvedOpponent);
    }

    #[test]
    fn test_player_key_is_normalized() {
        let row = scorer().evaluate(&prop("  lebron JAMES ", "POINTS", 24.5, 1.9));
        assert!(row.is_ok());
    }

    #[test]
    fn test_score_sorted_and_positive_only() {
        let props = vec![
            prop("LeBron James", "ASSISTS", 7.5, 1.8),  // 0.6 * 1.0 * 1.8 - 1 = 0.08
            prop("Anthony Davis", "REBOUNDS", 11.5, 2.0), // negative
            prop("LeBron James", "POINTS", 24.5, 1.9),  // 0.96 * 1.9 - 1 = 0.824
            prop("Jayson Tatum", "POINTS", 26.5, 1.85), // 0.6 * 1.0 * 1.85 - 1 = 0.11
            prop("LeBron James", "BLOCKS", 0.5, 3.0),
        ];
        let report = scorer().score(&props);

        assert_eq!(report.total(), 5);
        assert_eq!(report.value_bets.len(), 3);
        assert!(report.value_bets.iter().all(|r| r.adjusted_value > 0.0));
        assert!(report
            .value_bets
            .windows(2)
            .all(|w| w[0].adjusted_value >= w[1].adjusted_value));
        assert_eq!(report.value_bets[0].prop_type, "POINTS");
        assert_eq!(report.value_bets[0].player, "LeBron James");

        let counts = report.exclusion_counts();
        assert_eq!(counts.get(&ExclusionReason::NonPositiveValue), Some(&1));
        assert_eq!(counts.get(&ExclusionReason::UnsupportedStatType), Some(&1));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let props = vec![
            Prop { bookmaker: "Unibet".into(), ..prop("LeBron James", "POINTS", 24.5, 1.9) },
            Prop { bookmaker: "Betclic".into(), ..prop("LeBron James", "POINTS", 24.5, 1.9) },
        ];
        let report = scorer().score(&props);
        assert_eq!(report.value_bets[0].bookmaker, "Unibet");
        assert_eq!(report.value_bets[1].bookmaker, "Betclic");
    }

    #[test]
    fn test_empty_tables_exclude_everything() {
        let s = ValueBetScorer::new(
            PositionTable::default(),
            StatsTable::default(),
            DefenseTable::default(),
        );
        let report = s.score(&[prop("LeBron James", "POINTS", 24.5, 1.9)]);
        assert!(report.value_bets.is_empty());
        assert_eq!(report.exclusions[0].reason, ExclusionReason::MissingPosition);
    }
}
