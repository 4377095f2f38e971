//! Player game-log provider (stats.nba.com).
//!
//! Pulls the active roster and each player's season game log, then
//! reduces the last five games to the summary row the scorer joins on:
//! mean, population std-dev and `k/5` hit counts per threshold.
//!
//! API: `https://stats.nba.com/stats/` (undocumented, tabular `resultSets`
//! JSON). Requests without browser-like headers are dropped by the server.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::GameLogSource;
use crate::config::StatsApiConfig;
use crate::types::{BettingError, PlayerStatSummary, StatCategory, StatLine, ThresholdHits};

const PROVIDER_NAME: &str = "stats.nba.com";

/// Games a summary is computed over (most recent first).
pub const RECENT_GAMES: usize = 5;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Domain rows
// ---------------------------------------------------------------------------

/// An active player as listed by the roster endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRef {
    pub id: u64,
    pub name: String,
}

/// Box-score line of one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameLine {
    /// e.g. `"BOS vs. LAL"` or `"BOS @ LAL"`, player's team first.
    pub matchup: String,
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub threes: f64,
}

impl GameLine {
    pub fn stat(&self, category: StatCategory) -> f64 {
        match category {
            StatCategory::Points => self.points,
            StatCategory::Rebounds => self.rebounds,
            StatCategory::Assists => self.assists,
            StatCategory::Threes => self.threes,
        }
    }
}

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StatsResponse {
    #[serde(rename = "resultSets", default)]
    pub result_sets: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub name: String,
    pub headers: Vec<String>,
    #[serde(rename = "rowSet", default)]
    pub row_set: Vec<Vec<serde_json::Value>>,
}

impl ResultSet {
    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("Result set '{}' has no {name} column", self.name))
    }
}

impl StatsResponse {
    fn first_set(&self) -> Result<&ResultSet> {
        self.result_sets
            .first()
            .context("stats.nba.com response has no result sets")
    }
}

fn cell_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cell_str(value: Option<&serde_json::Value>) -> Option<&str> {
    value?.as_str()
}

/// Active players from a `commonallplayers` response.
pub fn parse_players(resp: &StatsResponse) -> Result<Vec<PlayerRef>> {
    let set = resp.first_set()?;
    let id_col = set.column("PERSON_ID")?;
    let name_col = set.column("DISPLAY_FIRST_LAST")?;
    let status_col = set.column("ROSTERSTATUS").ok();

    let players = set
        .row_set
        .iter()
        .filter(|row| match status_col {
            Some(col) => cell_f64(row.get(col)) == Some(1.0),
            None => true,
        })
        .filter_map(|row| {
            let id = cell_f64(row.get(id_col))?;
            let name = cell_str(row.get(name_col))?.trim();
            (id > 0.0 && !name.is_empty()).then(|| PlayerRef {
                id: id as u64,
                name: name.to_string(),
            })
        })
        .collect();

    Ok(players)
}

/// Game lines from a `playergamelog` response, in response order.
pub fn parse_game_log(resp: &StatsResponse) -> Result<Vec<GameLine>> {
    let set = resp.first_set()?;
    let matchup_col = set.column("MATCHUP")?;
    let pts_col = set.column("PTS")?;
    let reb_col = set.column("REB")?;
    let ast_col = set.column("AST")?;
    let fg3m_col = set.column("FG3M")?;

    let mut games = Vec::with_capacity(set.row_set.len());
    for row in &set.row_set {
        let (Some(matchup), Some(points), Some(rebounds), Some(assists), Some(threes)) = (
            cell_str(row.get(matchup_col)),
            cell_f64(row.get(pts_col)),
            cell_f64(row.get(reb_col)),
            cell_f64(row.get(ast_col)),
            cell_f64(row.get(fg3m_col)),
        ) else {
            debug!("Skipping incomplete game log row");
            continue;
        };
        games.push(GameLine {
            matchup: matchup.to_string(),
            points,
            rebounds,
            assists,
            threes,
        });
    }
    Ok(games)
}

// ---------------------------------------------------------------------------
// Summarisation
// ---------------------------------------------------------------------------

/// Tabulated lines per category: `start + 0.5` for `count` consecutive values.
fn threshold_lines(category: StatCategory) -> impl Iterator<Item = f64> {
    let (start, end) = match category {
        StatCategory::Points => (5u32, 35u32),
        StatCategory::Rebounds => (1, 21),
        StatCategory::Assists => (1, 21),
        StatCategory::Threes => (0, 11),
    };
    (start..end).map(|t| t as f64 + 0.5)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn stat_line(values: &[f64]) -> StatLine {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    StatLine {
        mean: round2(mean),
        std_dev: round2(variance.sqrt()),
    }
}

/// Reduce a game log (most recent first) to the summary row.
///
/// Returns `None` when the player has not played.
pub fn summarize(player: &str, games: &[GameLine]) -> Option<PlayerStatSummary> {
    let recent = &games[..games.len().min(RECENT_GAMES)];
    let latest = recent.first()?;
    let team = latest
        .matchup
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    let mut summary = PlayerStatSummary {
        player: player.to_string(),
        team,
        points: None,
        rebounds: None,
        assists: None,
        threes: None,
        thresholds: Vec::new(),
    };

    for &category in StatCategory::ALL {
        let values: Vec<f64> = recent.iter().map(|g| g.stat(category)).collect();
        summary.set_stat_line(category, stat_line(&values));

        for line in threshold_lines(category) {
            let hits = values.iter().filter(|v| **v >= line).count() as u32;
            summary.thresholds.push(ThresholdHits { category, line, hits });
        }
    }

    Some(summary)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct NbaStatsClient {
    http: Client,
    base_url: String,
    season: String,
    season_type: String,
}

impl NbaStatsClient {
    pub fn new(config: &StatsApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("Failed to build stats.nba.com HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            season: config.season.clone(),
            season_type: config.season_type.clone(),
        })
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<StatsResponse> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(url = %url, "Fetching stats data");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .header("Accept", "application/json, text/plain, */*")
            .header("Referer", "https://www.nba.com/")
            .header("Origin", "https://www.nba.com")
            .header("x-nba-stats-origin", "stats")
            .header("x-nba-stats-token", "true")
            .send()
            .await
            .with_context(|| format!("stats.nba.com {endpoint} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BettingError::Upstream {
                provider: PROVIDER_NAME.to_string(),
                message: format!("{endpoint} {status}: {body}"),
            }
            .into());
        }

        resp.json::<StatsResponse>()
            .await
            .with_context(|| format!("Failed to parse stats.nba.com {endpoint} response"))
    }
}

#[async_trait]
impl GameLogSource for NbaStatsClient {
    async fn active_players(&self) -> Result<Vec<PlayerRef>> {
        let resp = self
            .get(
                "commonallplayers",
                &[
                    ("LeagueID", "00"),
                    ("Season", self.season.as_str()),
                    ("IsOnlyCurrentSeason", "1"),
                ],
            )
            .await?;
        let players = parse_players(&resp)?;
        if players.is_empty() {
            bail!("stats.nba.com returned no active players for {}", self.season);
        }
        Ok(players)
    }

    async fn recent_games(&self, player_id: u64) -> Result<Vec<GameLine>> {
        let id = player_id.to_string();
        let resp = self
            .get(
                "playergamelog",
                &[
                    ("PlayerID", id.as_str()),
                    ("Season", self.season.as_str()),
                    ("SeasonType", self.season_type.as_str()),
                ],
            )
            .await?;
        parse_game_log(&resp)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Summarise every active player's recent games.
///
/// Failing to list players aborts; a failed player is logged and skipped.
pub async fn collect_summaries(
    source: &dyn GameLogSource,
    pause: Duration,
) -> Result<Vec<PlayerStatSummary>> {
    let players = source
        .active_players()
        .await
        .with_context(|| format!("Failed to list active players from {}", source.name()))?;
    info!(provider = source.name(), players = players.len(), "Active players found");

    let mut summaries = Vec::new();
    let (mut failed, mut idle) = (0usize, 0usize);

    for (i, player) in players.iter().enumerate() {
        match source.recent_games(player.id).await {
            Ok(games) => match summarize(&player.name, &games) {
                Some(summary) => {
                    debug!(player = %player.name, team = %summary.team, "Player summarised");
                    summaries.push(summary);
                }
                None => idle += 1,
            },
            Err(e) => {
                failed += 1;
                warn!(player = %player.name, error = %e, "Failed to fetch game log, skipping");
            }
        }

        if !pause.is_zero() && i + 1 < players.len() {
            tokio::time::sleep(pause).await;
        }
    }

    info!(
        provider = source.name(),
        summaries = summaries.len(),
        without_games = idle,
        failed,
        "Stat collection complete"
    );
    Ok(summaries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
