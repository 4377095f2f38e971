//! Batch jobs behind the CLI subcommands.
//!
//! Each job reads its inputs, runs one stage and writes its output file.
//! Collectors take their source as a trait object so the jobs run
//! unchanged against mocks.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::FilesConfig;
use crate::data::nba_stats::collect_summaries;
use crate::data::odds::collect_props;
use crate::data::tables;
use crate::data::{GameLogSource, OddsSource};
use crate::storage;
use crate::strategy::edge::{ScoreReport, ValueBetScorer};

/// Load the four input tables, score every prop and write the value bets.
pub fn run_value_bets(files: &FilesConfig) -> Result<ScoreReport> {
    let props = tables::load_props(&files.props)?;
    let positions = tables::load_positions(&files.positions)?;
    let stats = tables::load_player_stats(&files.player_stats)?;
    let defense = tables::load_defense(&files.defense)?;

    let scorer = ValueBetScorer::new(positions, stats, defense);
    let report = scorer.score(&props);

    for (reason, count) in report.exclusion_counts() {
        info!(reason = %reason, count, "Props excluded");
    }
    storage::save_value_bets(&files.value_bets, &report.value_bets)
        .context("Failed to write value bets")?;

    if let Some(best) = report.value_bets.first() {
        info!(best = %best, "Top value bet");
    }
    Ok(report)
}

/// Collect today's player props and write the props file.
pub async fn fetch_props(source: &dyn OddsSource, pause: Duration, out: &Path) -> Result<usize> {
    let props = collect_props(source, pause).await?;
    tables::write_props(out, &props)?;
    Ok(props.len())
}

/// Collect recent-form summaries and write the player-stats file.
pub async fn fetch_stats(source: &dyn GameLogSource, pause: Duration, out: &Path) -> Result<usize> {
    let summaries = collect_summaries(source, pause).await?;
    tables::write_player_stats(out, &summaries)?;
    Ok(summaries.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::nba_stats::{GameLine, PlayerRef};
    use crate::data::odds::{EventOdds, OddsEvent};
    use crate::data::{MockGameLogSource, MockOddsSource};
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("propedge_pipeline_{name}_{}.csv", uuid::Uuid::new_v4()));
        p
    }

    #[tokio::test]
    async fn test_fetch_props_writes_file() {
        let mut source = MockOddsSource::new();
        source.expect_name().return_const("mock-odds");
        source.expect_events().returning(|| {
            Ok(vec![OddsEvent {
                id: "e1".into(),
                home_team: "Miami Heat".into(),
                away_team: "New York Knicks".into(),
                commence_time: None,
            }])
        });
        source.expect_event_odds().returning(|_| {
            Ok(serde_json::from_str::<EventOdds>(
                r#"{"bookmakers":[{"title":"Betclic","markets":[{"key":"player_assists",
                    "outcomes":[{"name":"Over","description":"Jalen Brunson","price":1.95,"point":6.5}]}]}]}"#,
            )
            .unwrap())
        });

        let out = temp_path("props");
        let n = fetch_props(&source, Duration::ZERO, &out).await.unwrap();
        assert_eq!(n, 1);

        let props = tables::load_props(&out).unwrap();
        assert_eq!(props[0].player, "Jalen Brunson");
        assert_eq!(props[0].matchup, "New York Knicks @ Miami Heat");
        assert_eq!(props[0].prop_type, "ASSISTS");
        std::fs::remove_file(&out).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_stats_writes_file() {
        let mut source = MockGameLogSource::new();
        source.expect_name().return_const("mock-stats");
        source
            .expect_active_players()
            .returning(|| Ok(vec![PlayerRef { id: 7, name: "Jalen Brunson".into() }]));
        source.expect_recent_games().returning(|_| {
            Ok(vec![GameLine {
                matchup: "NYK @ MIA".into(),
                points: 28.0,
                rebounds: 3.0,
                assists: 8.0,
                threes: 2.0,
            }])
        });

        let out = temp_path("stats");
        let n = fetch_stats(&source, Duration::ZERO, &out).await.unwrap();
        assert_eq!(n, 1);

        let stats = tables::load_player_stats(&out).unwrap();
        let summary = stats.get("jalen brunson").unwrap();
        assert_eq!(summary.team, "NYK");
        assert_eq!(
            summary.hit_rate(crate::types::StatCategory::Assists, 6.5),
            Some(0.2)
        );
        std::fs::remove_file(&out).unwrap();
    }

    #[test]
    fn test_run_value_bets_missing_inputs() {
        let files = FilesConfig {
            props: temp_path("no_props"),
            positions: temp_path("no_positions"),
            player_stats: temp_path("no_stats"),
            defense: temp_path("no_defense"),
            value_bets: temp_path("value_bets"),
            propositions: temp_path("no_propositions"),
            history: temp_path("no_history"),
        };
        let report = run_value_bets(&files).unwrap();
        assert_eq!(report.total(), 0);
        assert!(files.value_bets.exists());
        std::fs::remove_file(&files.value_bets).unwrap();
    }
}
