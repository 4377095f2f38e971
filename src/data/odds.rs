//! Odds provider integration (The Odds API v4).
//!
//! Lists the day's NBA events, then fetches player-prop markets event by
//! event and flattens every bookmaker offer into a `Prop` row.
//!
//! API docs: https://the-odds-api.com/liveapi/guides/v4/
//! Auth: `apiKey` query parameter. Quota is per request, hence the pause
//! between event fetches.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::teams;
use super::OddsSource;
use crate::config::OddsApiConfig;
use crate::types::{BettingError, Prop};

const PROVIDER_NAME: &str = "the-odds-api";

/// Player name used when an outcome carries neither description nor name.
const UNKNOWN_PLAYER: &str = "INCONNU";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// One scheduled game from `/sports/{sport}/events/`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
}

impl OddsEvent {
    /// `"{away} @ {home}"`, the matchup format the scorer resolves.
    pub fn matchup(&self) -> String {
        teams::matchup(&self.away_team, &self.home_team)
    }
}

/// Response of `/sports/{sport}/events/{id}/odds/`. Only the fields we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventOdds {
    #[serde(default)]
    pub bookmakers: Vec<BookmakerOdds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookmakerOdds {
    #[serde(default)]
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub markets: Vec<MarketOdds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketOdds {
    /// e.g. `player_points`
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

/// A single priced outcome. For player props `name` is Over/Under and
/// `description` is the player.
#[derive(Debug, Clone, Deserialize)]
pub struct Outcome {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub point: Option<f64>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// `player_points` → `POINTS`.
pub fn prop_type_for_market(market_key: &str) -> String {
    market_key.replace("player_", "").to_uppercase()
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Flatten one event's bookmaker offers into prop rows.
///
/// Only the Over side of each line is kept; outcomes without a line or
/// with a zero price are dropped.
pub fn props_from_event(matchup: &str, odds: &EventOdds) -> Vec<Prop> {
    let mut props = Vec::new();

    for bookmaker in &odds.bookmakers {
        for market in &bookmaker.markets {
            let prop_type = prop_type_for_market(&market.key);

            for outcome in &market.outcomes {
                if non_empty(&outcome.name).is_some_and(|n| n.eq_ignore_ascii_case("under")) {
                    continue;
                }
                let (Some(line), Some(price)) = (outcome.point, outcome.price) else {
                    continue;
                };
                if price == 0.0 || !price.is_finite() || !line.is_finite() {
                    continue;
                }
                let player = non_empty(&outcome.description)
                    .or_else(|| non_empty(&outcome.name))
                    .unwrap_or(UNKNOWN_PLAYER);

                props.push(Prop {
                    player: player.to_string(),
                    matchup: matchup.to_string(),
                    prop_type: prop_type.clone(),
                    line,
                    odds: price,
                    bookmaker: bookmaker.title.clone(),
                });
            }
        }
    }

    props
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// The Odds API client.
pub struct OddsApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    sport: String,
    regions: String,
    markets: String,
}

impl OddsApiClient {
    pub fn new(config: &OddsApiConfig, api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("PROPEDGE/0.1.0")
            .build()
            .context("Failed to build HTTP client for The Odds API")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            sport: config.sport.clone(),
            regions: config.regions.clone(),
            markets: config.markets.join(","),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!(url = %url, "Fetching odds data");

        let resp = self
            .http
            .get(url)
            .query(&[("apiKey", self.api_key.expose_secret().as_str())])
            .query(query)
            .send()
            .await
            .context("The Odds API request failed")?;

        if let Some(remaining) = resp.headers().get("x-requests-remaining") {
            debug!(remaining = ?remaining, "Odds API quota");
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BettingError::Upstream {
                provider: PROVIDER_NAME.to_string(),
                message: format!("{status}: {body}"),
            }
            .into());
        }

        resp.json::<T>()
            .await
            .context("Failed to parse The Odds API response")
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn events(&self) -> Result<Vec<OddsEvent>> {
        let url = format!("{}/sports/{}/events/", self.base_url, self.sport);
        self.get_json(&url, &[]).await
    }

    async fn event_odds(&self, event_id: &str) -> Result<EventOdds> {
        let url = format!(
            "{}/sports/{}/events/{}/odds/",
            self.base_url,
            self.sport,
            urlencoding::encode(event_id),
        );
        self.get_json(
            &url,
            &[
                ("markets", self.markets.as_str()),
                ("regions", self.regions.as_str()),
                ("oddsFormat", "decimal"),
            ],
        )
        .await
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Fetch every event's player props.
///
/// Failing to list events aborts; a failed event is logged and skipped.
pub async fn collect_props(source: &dyn OddsSource, pause: Duration) -> Result<Vec<Prop>> {
    let events = source
        .events()
        .await
        .with_context(|| format!("Failed to list events from {}", source.name()))?;
    info!(provider = source.name(), events = events.len(), "Events found");

    let mut props = Vec::new();
    let mut failed = 0usize;

    for (i, event) in events.iter().enumerate() {
        let matchup = event.matchup();
        match source.event_odds(&event.id).await {
            Ok(odds) => {
                let event_props = props_from_event(&matchup, &odds);
                debug!(matchup = %matchup, props = event_props.len(), "Event props collected");
                props.extend(event_props);
            }
            Err(e) => {
                failed += 1;
                warn!(matchup = %matchup, error = %e, "Failed to fetch event odds, skipping");
            }
        }

        if !pause.is_zero() && i + 1 < events.len() {
            tokio::time::sleep(pause).await;
        }
    }

    info!(
        provider = source.name(),
        props = props.len(),
        failed_events = failed,
        "Prop collection complete"
    );
    Ok(props)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockOddsSource;

    const EVENT_ODDS_JSON: &str = r#"{
        "id": "e1",
        "home_team": "Los Angeles Lakers",
        "away_team": "Boston Celtics",
        "bookmakers": [
            {
                "key": "unibet_eu",
                "title": "Unibet",
                "markets": [
                    {
                        "key": "player_points",
                        "outcomes": [
                            {"name": "Over", "description": "Jayson Tatum", "price": 1.85, "point": 26.5},
                            {"name": "Under", "description": "Jayson Tatum", "price": 1.95, "point": 26.5},
                            {"name": "Over", "description": "LeBron James", "price": 0, "point": 24.5},
                            {"name": "Over", "description": "Anthony Davis", "price": 1.9}
                        ]
                    },
                    {
                        "key": "player_threes",
                        "outcomes": [
                            {"name": "Derrick White", "price": 2.2, "point": 2.5}
                        ]
                    }
                ]
            }
        ]
    }"#;

    fn event(id: &str) -> OddsEvent {
        OddsEvent {
            id: id.to_string(),
            home_team: "Los Angeles Lakers".into(),
            away_team: "Boston Celtics".into(),
            commence_time: None,
        }
    }

    #[test]
    fn test_prop_type_for_market() {
        assert_eq!(prop_type_for_market("player_points"), "POINTS");
        assert_eq!(prop_type_for_market("player_threes"), "THREES");
        assert_eq!(prop_type_for_market("player_blocks"), "BLOCKS");
    }

    #[test]
    fn test_event_matchup() {
        assert_eq!(event("e1").matchup(), "Boston Celtics @ Los Angeles Lakers");
    }

    #[test]
    fn test_props_from_event() {
        let odds: EventOdds = serde_json::from_str(EVENT_ODDS_JSON).unwrap();
        let props = props_from_event("Boston Celtics @ Los Angeles Lakers", &odds);

        assert_eq!(props.len(), 2);
        assert_eq!(props[0].player, "Jayson Tatum");
        assert_eq!(props[0].prop_type, "POINTS");
        assert_eq!(props[0].line, 26.5);
        assert_eq!(props[0].odds, 1.85);
        assert_eq!(props[0].bookmaker, "Unibet");

        // No description: the outcome name is the player.
        assert_eq!(props[1].player, "Derrick White");
        assert_eq!(props[1].prop_type, "THREES");
    }

    #[test]
    fn test_props_from_empty_event() {
        let odds = EventOdds::default();
        assert!(props_from_event("A @ B", &odds).is_empty());
    }

    #[tokio::test]
    async fn test_collect_props_skips_failed_event() {
        let mut source = MockOddsSource::new();
        source.expect_name().return_const(PROVIDER_NAME);
        source
            .expect_events()
            .returning(|| Ok(vec![event("bad"), event("good")]));
        source
            .expect_event_odds()
            .withf(|id| id == "bad")
            .returning(|_| Err(anyhow::anyhow!("HTTP 500")));
        source
            .expect_event_odds()
            .withf(|id| id == "good")
            .returning(|_| Ok(serde_json::from_str(EVENT_ODDS_JSON).unwrap()));

        let props = collect_props(&source, Duration::ZERO).await.unwrap();
        assert_eq!(props.len(), 2);
        assert!(props.iter().all(|p| p.matchup == "Boston Celtics @ Los Angeles Lakers"));
    }

    #[tokio::test]
    async fn test_collect_props_aborts_when_listing_fails() {
        let mut source = MockOddsSource::new();
        source.expect_name().return_const(PROVIDER_NAME);
        source
            .expect_events()
            .returning(|| Err(anyhow::anyhow!("401 Unauthorized")));
        source.expect_event_odds().never();

        let result = collect_props(&source, Duration::ZERO).await;
        assert!(result.is_err());
    }
}
