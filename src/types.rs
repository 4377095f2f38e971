//! Shared types for PROPEDGE.
//!
//! Records for every table the pipeline reads or writes, the stat
//! categories the scorer understands, and the domain error type.
//! CSV column names are the French headers used by the data files.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of recent games a hit count is tabulated over.
pub const HIT_WINDOW: u32 = 5;

// ---------------------------------------------------------------------------
// Stat categories
// ---------------------------------------------------------------------------

/// Player stat categories with historical hit-rates and defense ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatCategory {
    Points,
    Rebounds,
    Assists,
    Threes,
}

impl StatCategory {
    pub const ALL: &'static [StatCategory] = &[
        StatCategory::Points,
        StatCategory::Rebounds,
        StatCategory::Assists,
        StatCategory::Threes,
    ];

    /// Parse the prop `Type` column (`POINTS`, `REBOUNDS`, ...).
    /// Returns `None` for markets the stats file does not cover (steals, blocks).
    pub fn from_prop_type(prop_type: &str) -> Option<Self> {
        match prop_type.trim().to_uppercase().as_str() {
            "POINTS" => Some(StatCategory::Points),
            "REBOUNDS" => Some(StatCategory::Rebounds),
            "ASSISTS" => Some(StatCategory::Assists),
            "THREES" => Some(StatCategory::Threes),
            _ => None,
        }
    }

    pub fn prop_type(&self) -> &'static str {
        match self {
            StatCategory::Points => "POINTS",
            StatCategory::Rebounds => "REBOUNDS",
            StatCategory::Assists => "ASSISTS",
            StatCategory::Threes => "THREES",
        }
    }

    /// Suffix of the defense table columns: `"{position}_{suffix}"`.
    pub fn defense_suffix(&self) -> &'static str {
        match self {
            StatCategory::Points => "PTS",
            StatCategory::Rebounds => "REB",
            StatCategory::Assists => "AST",
            StatCategory::Threes => "3P",
        }
    }

    /// Suffix of the hit-count columns: `"{line} {suffix}"`.
    pub fn threshold_suffix(&self) -> &'static str {
        match self {
            StatCategory::Points => "pts",
            StatCategory::Rebounds => "reb",
            StatCategory::Assists => "ast",
            StatCategory::Threes => "3pm",
        }
    }

    /// Suffix of the mean / std-dev columns: `Moy_{suffix}`, `STD_{suffix}`.
    pub fn summary_suffix(&self) -> &'static str {
        match self {
            StatCategory::Points => "PTS",
            StatCategory::Rebounds => "REB",
            StatCategory::Assists => "AST",
            StatCategory::Threes => "3PM",
        }
    }

    fn from_threshold_suffix(suffix: &str) -> Option<Self> {
        StatCategory::ALL
            .iter()
            .copied()
            .find(|c| c.threshold_suffix() == suffix)
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prop_type())
    }
}

impl std::str::FromStr for StatCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatCategory::from_prop_type(s).ok_or_else(|| anyhow::anyhow!("Unknown stat category: {s}"))
    }
}

/// Column label of a hit-count threshold, e.g. `"8.5 pts"`.
///
/// Whole-number lines keep one decimal (`"8.0 pts"`), matching how the
/// stats file writes its headers.
pub fn threshold_label(line: f64, category: StatCategory) -> String {
    if line.fract() == 0.0 {
        format!("{line:.1} {}", category.threshold_suffix())
    } else {
        format!("{line} {}", category.threshold_suffix())
    }
}

/// Parse a hit-count column label back into its line and category.
pub fn parse_threshold_label(label: &str) -> Option<(f64, StatCategory)> {
    let (line, suffix) = label.trim().split_once(' ')?;
    let line: f64 = line.parse().ok()?;
    let category = StatCategory::from_threshold_suffix(suffix.trim())?;
    Some((line, category))
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// One bookmaker offer on a player stat line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    #[serde(rename = "Joueur")]
    pub player: String,
    /// `"<Away full name> @ <Home full name>"`
    #[serde(rename = "Match")]
    pub matchup: String,
    #[serde(rename = "Type")]
    pub prop_type: String,
    #[serde(rename = "Ligne")]
    pub line: f64,
    /// Decimal odds.
    #[serde(rename = "Cote")]
    pub odds: f64,
    #[serde(rename = "Bookmaker")]
    pub bookmaker: String,
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} o{} @ {:.2} [{}]",
            self.player, self.prop_type, self.line, self.odds, self.bookmaker
        )
    }
}

/// Player position row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPosition {
    #[serde(rename = "Joueur")]
    pub player: String,
    #[serde(rename = "Poste")]
    pub position: String,
}

/// Mean and population standard deviation of a stat over the recent games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatLine {
    pub mean: f64,
    pub std_dev: f64,
}

/// Number of recent games in which a stat met or exceeded `line`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdHits {
    pub category: StatCategory,
    pub line: f64,
    pub hits: u32,
}

impl ThresholdHits {
    pub fn label(&self) -> String {
        threshold_label(self.line, self.category)
    }

    /// Cell value as written in the stats file: `"k/5"`.
    pub fn cell(&self) -> String {
        format!("{}/{HIT_WINDOW}", self.hits)
    }

    /// Parse a `"k/5"` cell.
    pub fn parse_cell(cell: &str) -> Option<u32> {
        let (hits, window) = cell.trim().split_once('/')?;
        if window.trim().parse::<u32>().ok()? != HIT_WINDOW {
            return None;
        }
        let hits: u32 = hits.trim().parse().ok()?;
        (hits <= HIT_WINDOW).then_some(hits)
    }

    pub fn rate(&self) -> f64 {
        self.hits as f64 / HIT_WINDOW as f64
    }
}

/// Recent-form summary of one player, one row of the stats file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatSummary {
    pub player: String,
    /// 3-letter team code.
    pub team: String,
    pub points: Option<StatLine>,
    pub rebounds: Option<StatLine>,
    pub assists: Option<StatLine>,
    pub threes: Option<StatLine>,
    /// Hit counts in column order.
    pub thresholds: Vec<ThresholdHits>,
}

impl PlayerStatSummary {
    pub fn stat_line(&self, category: StatCategory) -> Option<StatLine> {
        match category {
            StatCategory::Points => self.points,
            StatCategory::Rebounds => self.rebounds,
            StatCategory::Assists => self.assists,
            StatCategory::Threes => self.threes,
        }
    }

    pub fn set_stat_line(&mut self, category: StatCategory, line: StatLine) {
        let slot = match category {
            StatCategory::Points => &mut self.points,
            StatCategory::Rebounds => &mut self.rebounds,
            StatCategory::Assists => &mut self.assists,
            StatCategory::Threes => &mut self.threes,
        };
        *slot = Some(line);
    }

    /// Historical hit-rate for an exact tabulated line. No interpolation.
    pub fn hit_rate(&self, category: StatCategory, line: f64) -> Option<f64> {
        let label = threshold_label(line, category);
        self.thresholds
            .iter()
            .find(|t| t.category == category && t.label() == label)
            .map(ThresholdHits::rate)
    }
}

/// Defensive ranks of one team (1 = best defense), keyed by
/// `"{position}_{PTS|REB|AST|3P}"` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefenseRanking {
    /// Full franchise name.
    pub team: String,
    pub ranks: HashMap<String, u32>,
}

impl DefenseRanking {
    pub fn column(position: &str, category: StatCategory) -> String {
        format!("{}_{}", position.trim(), category.defense_suffix())
    }

    pub fn rank(&self, category: StatCategory, position: &str) -> Option<u32> {
        self.ranks.get(&Self::column(position, category)).copied()
    }
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

/// A prop that survived scoring with a positive adjusted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBetRow {
    #[serde(rename = "Joueur")]
    pub player: String,
    #[serde(rename = "Match")]
    pub matchup: String,
    #[serde(rename = "Type")]
    pub prop_type: String,
    #[serde(rename = "Ligne")]
    pub line: f64,
    #[serde(rename = "Cote")]
    pub odds: f64,
    #[serde(rename = "Bookmaker")]
    pub bookmaker: String,
    #[serde(rename = "Poste")]
    pub position: String,
    #[serde(rename = "Équipe")]
    pub team: String,
    #[serde(rename = "Équipe adverse")]
    pub opponent: String,
    #[serde(rename = "Équipe adverse nom complet")]
    pub opponent_name: String,
    #[serde(rename = "Classement Déf")]
    pub defense_rank: u32,
    /// `None` when the stats file has no mean for the category.
    #[serde(rename = "Moyenne", default, deserialize_with = "csv::invalid_option")]
    pub mean: Option<f64>,
    #[serde(rename = "Écart-type", default, deserialize_with = "csv::invalid_option")]
    pub std_dev: Option<f64>,
    #[serde(rename = "Fréquence 5 matchs")]
    pub hit_rate: f64,
    #[serde(rename = "Proba ajustée", alias = "Proba")]
    pub adjusted_probability: f64,
    #[serde(rename = "Value ajustée", alias = "Value")]
    pub adjusted_value: f64,
}

impl fmt::Display for ValueBetRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} o{} @ {:.2} vs {} (rank {}) | hit={:.0}% adj={:.1}% value={:+.3}",
            self.player,
            self.prop_type,
            self.line,
            self.odds,
            self.opponent,
            self.defense_rank,
            self.hit_rate * 100.0,
            self.adjusted_probability * 100.0,
            self.adjusted_value,
        )
    }
}

/// Settlement state of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BetResult {
    #[default]
    #[serde(rename = "en attente")]
    Pending,
    #[serde(rename = "win")]
    Win,
    #[serde(rename = "loss")]
    Loss,
}

impl BetResult {
    pub fn is_settled(&self) -> bool {
        !matches!(self, BetResult::Pending)
    }
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetResult::Pending => write!(f, "en attente"),
            BetResult::Win => write!(f, "win"),
            BetResult::Loss => write!(f, "loss"),
        }
    }
}

impl std::str::FromStr for BetResult {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en attente" | "pending" => Ok(BetResult::Pending),
            "win" | "won" => Ok(BetResult::Win),
            "loss" | "lost" => Ok(BetResult::Loss),
            _ => Err(anyhow::anyhow!("Unknown bet result: {s}")),
        }
    }
}

/// A staked suggestion for today, single or combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Joueur")]
    pub player: String,
    #[serde(rename = "Type")]
    pub prop_type: String,
    /// `None` for combined bets.
    #[serde(rename = "Ligne", default, deserialize_with = "csv::invalid_option")]
    pub line: Option<f64>,
    #[serde(rename = "Cote")]
    pub odds: f64,
    #[serde(rename = "Proba")]
    pub probability: f64,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Mise")]
    pub stake: Decimal,
    #[serde(rename = "Moyenne", default, deserialize_with = "csv::invalid_option")]
    pub mean: Option<f64>,
    #[serde(rename = "Écart-type", default, deserialize_with = "csv::invalid_option")]
    pub std_dev: Option<f64>,
    #[serde(rename = "Classement Déf", default, deserialize_with = "csv::invalid_option")]
    pub defense_rank: Option<u32>,
    #[serde(rename = "Résultat")]
    pub result: BetResult,
    #[serde(rename = "Profit")]
    pub profit: Decimal,
    #[serde(rename = "Bankroll_après")]
    pub bankroll_after: Decimal,
    #[serde(rename = "Bookmaker")]
    pub bookmaker: Option<String>,
    #[serde(rename = "Détails combiné")]
    pub details: Option<String>,
}

impl Proposition {
    /// Short label used in selectors and combined-bet details: `"Name o8.5"`.
    pub fn label(&self) -> String {
        match self.line {
            Some(line) => format!("{} o{line}", self.player),
            None => self.player.clone(),
        }
    }
}

impl fmt::Display for Proposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} @ {:.2} | p={:.1}% value={:+.3} | stake={:.2}",
            self.label(),
            self.prop_type,
            self.odds,
            self.probability * 100.0,
            self.value,
            self.stake,
        )
    }
}

/// A settled proposition, one row of the append-only history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Joueur")]
    pub player: String,
    #[serde(rename = "Type")]
    pub prop_type: String,
    #[serde(rename = "Ligne", default, deserialize_with = "csv::invalid_option")]
    pub line: Option<f64>,
    #[serde(rename = "Cote")]
    pub odds: f64,
    #[serde(rename = "Proba")]
    pub probability: f64,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Mise")]
    pub stake: Decimal,
    #[serde(rename = "Moyenne", default, deserialize_with = "csv::invalid_option")]
    pub mean: Option<f64>,
    #[serde(rename = "Écart-type", default, deserialize_with = "csv::invalid_option")]
    pub std_dev: Option<f64>,
    #[serde(rename = "Classement Déf", default, deserialize_with = "csv::invalid_option")]
    pub defense_rank: Option<u32>,
    #[serde(rename = "Résultat")]
    pub result: BetResult,
    #[serde(rename = "Profit")]
    pub profit: Decimal,
    #[serde(rename = "Bankroll_après")]
    pub bankroll_after: Decimal,
    #[serde(rename = "Bookmaker")]
    pub bookmaker: Option<String>,
    #[serde(rename = "Détails combiné")]
    pub details: Option<String>,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {:.2} stake={:.2} {} profit={:.2} bankroll={:.2}",
            self.date,
            self.player,
            self.prop_type,
            self.odds,
            self.stake,
            self.result,
            self.profit,
            self.bankroll_after,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PROPEDGE.
#[derive(Debug, thiserror::Error)]
pub enum BettingError {
    #[error("Invalid odds {0}: decimal odds must be greater than 1")]
    InvalidOdds(f64),

    #[error("Invalid probability {0}: must be within [0, 1]")]
    InvalidProbability(f64),

    #[error("Invalid Kelly fraction {0}: must be within (0, 1]")]
    InvalidKellyFraction(f64),

    #[error("Invalid bankroll {0}: must be positive")]
    InvalidBankroll(Decimal),

    #[error("A combined bet needs at least one leg")]
    EmptyCombination,

    #[error("Proposition not found: index {0}")]
    PropositionNotFound(usize),

    #[error("Upstream error ({provider}): {message}")]
    Upstream { provider: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_category_from_prop_type() {
        assert_eq!(StatCategory::from_prop_type("POINTS"), Some(StatCategory::Points));
        assert_eq!(StatCategory::from_prop_type(" threes "), Some(StatCategory::Threes));
        assert_eq!(StatCategory::from_prop_type("STEALS"), None);
        assert_eq!(StatCategory::from_prop_type("BLOCKS"), None);
    }

    #[test]
    fn test_category_suffixes() {
        assert_eq!(StatCategory::Threes.defense_suffix(), "3P");
        assert_eq!(StatCategory::Threes.threshold_suffix(), "3pm");
        assert_eq!(StatCategory::Threes.summary_suffix(), "3PM");
        assert_eq!(StatCategory::Rebounds.defense_suffix(), "REB");
    }

    #[test]
    fn test_threshold_label() {
        assert_eq!(threshold_label(8.5, StatCategory::Points), "8.5 pts");
        assert_eq!(threshold_label(10.5, StatCategory::Assists), "10.5 ast");
        assert_eq!(threshold_label(8.0, StatCategory::Rebounds), "8.0 reb");
        assert_eq!(threshold_label(0.5, StatCategory::Threes), "0.5 3pm");
    }

    #[test]
    fn test_parse_threshold_label() {
        assert_eq!(parse_threshold_label("8.5 pts"), Some((8.5, StatCategory::Points)));
        assert_eq!(parse_threshold_label("2.5 3pm"), Some((2.5, StatCategory::Threes)));
        assert_eq!(parse_threshold_label("Moy_PTS"), None);
        assert_eq!(parse_threshold_label("8.5 stl"), None);
    }

    #[test]
    fn test_parse_hit_cell() {
        assert_eq!(ThresholdHits::parse_cell("3/5"), Some(3));
        assert_eq!(ThresholdHits::parse_cell(" 0/5 "), Some(0));
        assert_eq!(ThresholdHits::parse_cell("6/5"), None);
        assert_eq!(ThresholdHits::parse_cell("3/4"), None);
        assert_eq!(ThresholdHits::parse_cell("nan"), None);
    }

    #[test]
    fn test_summary_hit_rate_exact_match_only() {
        let summary = PlayerStatSummary {
            player: "Jayson Tatum".into(),
            team: "BOS".into(),
            points: Some(StatLine { mean: 27.4, std_dev: 4.1 }),
            rebounds: None,
            assists: None,
            threes: None,
            thresholds: vec![
                ThresholdHits { category: StatCategory::Points, line: 24.5, hits: 4 },
                ThresholdHits { category: StatCategory::Points, line: 25.5, hits: 3 },
            ],
        };
        assert_eq!(summary.hit_rate(StatCategory::Points, 24.5), Some(0.8));
        assert_eq!(summary.hit_rate(StatCategory::Points, 25.5), Some(0.6));
        assert_eq!(summary.hit_rate(StatCategory::Points, 25.0), None);
        assert_eq!(summary.hit_rate(StatCategory::Rebounds, 24.5), None);
        assert!(summary.stat_line(StatCategory::Rebounds).is_none());
    }

    #[test]
    fn test_defense_ranking_column() {
        let mut ranking = DefenseRanking { team: "Boston Celtics".into(), ..Default::default() };
        ranking.ranks.insert("PG_3P".into(), 4);
        assert_eq!(DefenseRanking::column("PG", StatCategory::Threes), "PG_3P");
        assert_eq!(ranking.rank(StatCategory::Threes, "PG"), Some(4));
        assert_eq!(ranking.rank(StatCategory::Points, "PG"), None);
        assert_eq!(ranking.rank(StatCategory::Threes, "C"), None);
    }

    #[test]
    fn test_bet_result_display_and_parse() {
        assert_eq!(format!("{}", BetResult::Pending), "en attente");
        assert_eq!("win".parse::<BetResult>().unwrap(), BetResult::Win);
        assert_eq!("LOSS".parse::<BetResult>().unwrap(), BetResult::Loss);
        assert!("push".parse::<BetResult>().is_err());
        assert!(!BetResult::default().is_settled());
    }

    #[test]
    fn test_proposition_label() {
        let p = Proposition {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            player: "Nikola Jokic".into(),
            prop_type: "ASSISTS".into(),
            line: Some(9.5),
            odds: 1.9,
            probability: 0.6,
            value: 0.14,
            stake: dec!(12.5),
            mean: None,
            std_dev: None,
            defense_rank: None,
            result: BetResult::Pending,
            profit: Decimal::ZERO,
            bankroll_after: dec!(500),
            bookmaker: None,
            details: None,
        };
        assert_eq!(p.label(), "Nikola Jokic o9.5");
        assert!(format!("{p}").contains("ASSISTS"));
    }

    #[test]
    fn test_error_display() {
        let e = BettingError::InvalidOdds(1.0);
        assert!(e.to_string().contains("greater than 1"));
        let e = BettingError::Upstream { provider: "odds-api".into(), message: "401".into() };
        assert_eq!(e.to_string(), "Upstream error (odds-api): 401");
    }
}
