//! Data sources.
//!
//! Static team reference, the CSV input tables, and the two external
//! collaborators that produce them: the odds provider (player props) and
//! the stats provider (recent game logs).

pub mod teams;
pub mod tables;
pub mod odds;
pub mod nba_stats;

use anyhow::Result;
use async_trait::async_trait;

use nba_stats::{GameLine, PlayerRef};
use odds::{EventOdds, OddsEvent};

/// Abstraction over a bookmaker odds feed.
///
/// Listing events is the only call whose failure aborts a collection run;
/// a failed per-event fetch is skipped by the collector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Upcoming events for the configured sport.
    async fn events(&self) -> Result<Vec<OddsEvent>>;

    /// Player-prop odds of one event, all bookmakers.
    async fn event_odds(&self, event_id: &str) -> Result<EventOdds>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Abstraction over a player game-log provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameLogSource: Send + Sync {
    /// Players on an active roster this season.
    async fn active_players(&self) -> Result<Vec<PlayerRef>>;

    /// Game log of one player, most recent game first.
    async fn recent_games(&self, player_id: u64) -> Result<Vec<GameLine>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
