//! Input tables.
//!
//! Loads the props, positions, player-stats and defense CSV files into
//! typed lookup tables keyed the way the scorer joins them. A missing file
//! is an empty table, a malformed row is skipped with a warning.
//!
//! The stats and defense files have data-driven columns (one per threshold
//! or per position/stat), so they are read through their header row rather
//! than a fixed serde record.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use super::teams::normalize_name;
use crate::types::{
    parse_threshold_label, DefenseRanking, PlayerPosition, PlayerStatSummary, Prop, StatCategory,
    StatLine, ThresholdHits,
};

const PLAYER_COLUMN: &str = "Joueur";
const TEAM_COLUMN: &str = "Équipe";
const DEFENSE_TEAM_COLUMN: &str = "Team";

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

/// Player position by normalized name. The first row wins on duplicates.
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    positions: HashMap<String, String>,
}

impl PositionTable {
    pub fn from_rows(rows: impl IntoIterator<Item = PlayerPosition>) -> Self {
        let mut positions = HashMap::new();
        for row in rows {
            let position = row.position.trim();
            if position.is_empty() {
                continue;
            }
            positions
                .entry(normalize_name(&row.player))
                .or_insert_with(|| position.to_string());
        }
        Self { positions }
    }

    pub fn position(&self, key: &str) -> Option<&str> {
        self.positions.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Player stat summaries by normalized name. The first row wins on duplicates.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    players: HashMap<String, PlayerStatSummary>,
}

impl StatsTable {
    pub fn from_summaries(summaries: impl IntoIterator<Item = PlayerStatSummary>) -> Self {
        let mut players = HashMap::new();
        for summary in summaries {
            players.entry(normalize_name(&summary.player)).or_insert(summary);
        }
        Self { players }
    }

    pub fn get(&self, key: &str) -> Option<&PlayerStatSummary> {
        self.players.get(key)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Defensive rankings by full team name.
#[derive(Debug, Clone, Default)]
pub struct DefenseTable {
    teams: HashMap<String, DefenseRanking>,
}

impl DefenseTable {
    pub fn from_rankings(rankings: impl IntoIterator<Item = DefenseRanking>) -> Self {
        let mut teams = HashMap::new();
        for ranking in rankings {
            teams.entry(ranking.team.trim().to_string()).or_insert(ranking);
        }
        Self { teams }
    }

    /// Rank of `team` (full name) against `position` for `category`.
    pub fn rank(&self, team: &str, category: StatCategory, position: &str) -> Option<u32> {
        self.teams.get(team.trim())?.rank(category, position)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open an input table, treating a missing file as absent.
fn open_table(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Input table not found, using an empty table");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to open {}", path.display())),
    }
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(rdr)
}

/// Parse a numeric cell; empty, `nan` and infinite cells are missing.
fn parse_number(cell: &str) -> Option<f64> {
    let value: f64 = cell.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parse an integer rank cell. Accepts `"12"` and `"12.0"`.
fn parse_rank(cell: &str) -> Option<u32> {
    let cell = cell.trim();
    if let Ok(rank) = cell.parse::<u32>() {
        return Some(rank);
    }
    let value = parse_number(cell)?;
    (value >= 0.0 && value.fract() == 0.0).then_some(value as u32)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

pub fn load_props_from_reader<R: Read>(rdr: R) -> Result<Vec<Prop>> {
    let mut reader = reader(rdr);
    let mut props = Vec::new();
    for result in reader.deserialize::<Prop>() {
        match result {
            Ok(prop) => {
                if !prop.line.is_finite() || !prop.odds.is_finite() {
                    warn!(player = %prop.player, "Skipping prop with non-finite line or odds");
                    continue;
                }
                props.push(prop);
            }
            Err(e) => warn!(error = %e, "Skipping malformed prop row"),
        }
    }
    Ok(props)
}

pub fn load_positions_from_reader<R: Read>(rdr: R) -> Result<PositionTable> {
    let mut reader = reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<PlayerPosition>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!(error = %e, "Skipping malformed position row"),
        }
    }
    Ok(PositionTable::from_rows(rows))
}

/// Column layout of a stats file, resolved once from its header row.
struct StatsColumns {
    player: usize,
    team: Option<usize>,
    lines: Vec<(StatCategory, Option<usize>, Option<usize>)>,
    thresholds: Vec<(usize, f64, StatCategory)>,
}

impl StatsColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let Some(player) = column_index(headers, PLAYER_COLUMN) else {
            bail!("Player stats file has no '{PLAYER_COLUMN}' column");
        };
        let lines = StatCategory::ALL
            .iter()
            .map(|&c| {
                let suffix = c.summary_suffix();
                (
                    c,
                    column_index(headers, &format!("Moy_{suffix}")),
                    column_index(headers, &format!("STD_{suffix}")),
                )
            })
            .collect();
        let thresholds = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| parse_threshold_label(h).map(|(line, c)| (i, line, c)))
            .collect();

        Ok(Self {
            player,
            team: column_index(headers, TEAM_COLUMN),
            lines,
            thresholds,
        })
    }

    fn summary(&self, record: &csv::StringRecord) -> Option<PlayerStatSummary> {
        let player = record.get(self.player)?.trim();
        if player.is_empty() {
            return None;
        }
        let team = self
            .team
            .and_then(|i| record.get(i))
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        let mut summary = PlayerStatSummary {
            player: player.to_string(),
            team,
            points: None,
            rebounds: None,
            assists: None,
            threes: None,
            thresholds: Vec::with_capacity(self.thresholds.len()),
        };

        for &(category, mean_col, std_col) in &self.lines {
            let mean = mean_col.and_then(|i| record.get(i)).and_then(parse_number);
            let std_dev = std_col.and_then(|i| record.get(i)).and_then(parse_number);
            if let (Some(mean), Some(std_dev)) = (mean, std_dev) {
                summary.set_stat_line(category, StatLine { mean, std_dev });
            }
        }

        for &(i, line, category) in &self.thresholds {
            if let Some(hits) = record.get(i).and_then(ThresholdHits::parse_cell) {
                summary.thresholds.push(ThresholdHits { category, line, hits });
            }
        }

        Some(summary)
    }
}

pub fn load_player_stats_from_reader<R: Read>(rdr: R) -> Result<StatsTable> {
    let mut reader = reader(rdr);
    let headers = reader.headers().context("Failed to read player stats header")?.clone();
    if headers.is_empty() {
        return Ok(StatsTable::default());
    }
    let columns = StatsColumns::from_headers(&headers)?;
    debug!(thresholds = columns.thresholds.len(), "Player stats columns resolved");

    let mut summaries = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => match columns.summary(&record) {
                Some(summary) => summaries.push(summary),
                None => warn!("Skipping player stats row without a player name"),
            },
            Err(e) => warn!(error = %e, "Skipping malformed player stats row"),
        }
    }
    Ok(StatsTable::from_summaries(summaries))
}

pub fn load_defense_from_reader<R: Read>(rdr: R) -> Result<DefenseTable> {
    let mut reader = reader(rdr);
    let headers = reader.headers().context("Failed to read defense header")?.clone();
    if headers.is_empty() {
        return Ok(DefenseTable::default());
    }
    let Some(team_col) = column_index(&headers, DEFENSE_TEAM_COLUMN) else {
        bail!("Defense file has no '{DEFENSE_TEAM_COLUMN}' column");
    };

    let mut rankings = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed defense row");
                continue;
            }
        };
        let Some(team) = record.get(team_col).map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        let ranks = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, _)| *i != team_col)
            .filter_map(|(_, (column, cell))| parse_rank(cell).map(|r| (column.to_string(), r)))
            .collect();
        rankings.push(DefenseRanking { team: team.to_string(), ranks });
    }
    Ok(DefenseTable::from_rankings(rankings))
}

// ---------------------------------------------------------------------------
// Path-based loaders
// ---------------------------------------------------------------------------

pub fn load_props(path: &Path) -> Result<Vec<Prop>> {
    let Some(file) = open_table(path)? else {
        return Ok(Vec::new());
    };
    let props = load_props_from_reader(file)
        .with_context(|| format!("Failed to load props from {}", path.display()))?;
    info!(path = %path.display(), rows = props.len(), "Props loaded");
    Ok(props)
}

pub fn load_positions(path: &Path) -> Result<PositionTable> {
    let Some(file) = open_table(path)? else {
        return Ok(PositionTable::default());
    };
    let table = load_positions_from_reader(file)
        .with_context(|| format!("Failed to load positions from {}", path.display()))?;
    info!(path = %path.display(), players = table.len(), "Positions loaded");
    Ok(table)
}

pub fn load_player_stats(path: &Path) -> Result<StatsTable> {
    let Some(file) = open_table(path)? else {
        return Ok(StatsTable::default());
    };
    let table = load_player_stats_from_reader(file)
        .with_context(|| format!("Failed to load player stats from {}", path.display()))?;
    info!(path = %path.display(), players = table.len(), "Player stats loaded");
    Ok(table)
}

pub fn load_defense(path: &Path) -> Result<DefenseTable> {
    let Some(file) = open_table(path)? else {
        return Ok(DefenseTable::default());
    };
    let table = load_defense_from_reader(file)
        .with_context(|| format!("Failed to load defense rankings from {}", path.display()))?;
    info!(path = %path.display(), teams = table.len(), "Defense rankings loaded");
    Ok(table)
}

// ---------------------------------------------------------------------------
// Writers (collector outputs)
// ---------------------------------------------------------------------------

pub fn write_props_to_writer<W: Write>(wtr: W, props: &[Prop]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(wtr);
    for prop in props {
        writer.serialize(prop).context("Failed to serialise prop")?;
    }
    writer.flush().context("Failed to flush props")?;
    Ok(())
}

/// Header row of a stats file: fixed columns, then every threshold label
/// in order of first appearance.
fn stats_headers(summaries: &[PlayerStatSummary]) -> Vec<String> {
    let mut headers = vec![PLAYER_COLUMN.to_string(), TEAM_COLUMN.to_string()];
    for c in StatCategory::ALL {
        headers.push(format!("Moy_{}", c.summary_suffix()));
        headers.push(format!("STD_{}", c.summary_suffix()));
    }
    let fixed = headers.len();
    for summary in summaries {
        for t in &summary.thresholds {
            let label = t.label();
            if !headers[fixed..].contains(&label) {
                headers.push(label);
            }
        }
    }
    headers
}

pub fn write_player_stats_to_writer<W: Write>(wtr: W, summaries: &[PlayerStatSummary]) -> Result<()> {
    let headers = stats_headers(summaries);
    let mut writer = csv::Writer::from_writer(wtr);
    writer.write_record(&headers).context("Failed to write stats header")?;

    for summary in summaries {
        let mut row = vec![summary.player.clone(), summary.team.clone()];
        for &c in StatCategory::ALL {
            match summary.stat_line(c) {
                Some(line) => {
                    row.push(line.mean.to_string());
                    row.push(line.std_dev.to_string());
                }
                None => row.extend([String::new(), String::new()]),
            }
        }
        for label in &headers[row.len()..] {
            let cell = summary
                .thresholds
                .iter()
                .find(|t| &t.label() == label)
                .map(ThresholdHits::cell)
                .unwrap_or_default();
            row.push(cell);
        }
        writer.write_record(&row).context("Failed to write stats row")?;
    }
    writer.flush().context("Failed to flush player stats")?;
    Ok(())
}

pub fn write_props(path: &Path, props: &[Prop]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_props_to_writer(file, props)?;
    info!(path = %path.display(), rows = props.len(), "Props written");
    Ok(())
}

pub fn write_player_stats(path: &Path, summaries: &[PlayerStatSummary]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_player_stats_to_writer(file, summaries)?;
    info!(path = %path.display(), players = summaries.len(), "Player stats written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
