//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a partial (or missing) file still
//! yields a usable configuration. Secrets (API keys) are referenced by
//! env-var name in the config and resolved at runtime.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bankroll: BankrollConfig,
    pub files: FilesConfig,
    pub staking: StakingConfig,
    pub odds_api: OddsApiConfig,
    pub stats_api: StatsApiConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BankrollConfig {
    /// Bankroll used while the history file is empty.
    pub initial: Decimal,
    pub currency: String,
}

impl Default for BankrollConfig {
    fn default() -> Self {
        Self {
            initial: dec!(500),
            currency: "€".to_string(),
        }
    }
}

/// Locations of every CSV the pipeline reads or writes.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilesConfig {
    pub props: PathBuf,
    pub positions: PathBuf,
    pub player_stats: PathBuf,
    pub defense: PathBuf,
    pub value_bets: PathBuf,
    pub propositions: PathBuf,
    pub history: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            props: PathBuf::from("player_props.csv"),
            positions: PathBuf::from("NBA_Positions_.csv"),
            player_stats: PathBuf::from("nba_players_last5_paliers.csv"),
            defense: PathBuf::from("defense_vs_positions.csv"),
            value_bets: PathBuf::from("value_bets_resultats.csv"),
            propositions: PathBuf::from("propositions_du_jour.csv"),
            history: PathBuf::from("historique_paris.csv"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StakingConfig {
    /// Fraction of full Kelly used when the dashboard does not specify one.
    pub default_kelly_fraction: f64,
    /// Stake cap as a share of bankroll at probability 0.
    pub min_cap_ratio: f64,
    /// Stake cap as a share of bankroll at probability 1.
    pub max_cap_ratio: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            default_kelly_fraction: 1.0,
            min_cap_ratio: 0.01,
            max_cap_ratio: 0.05,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OddsApiConfig {
    pub base_url: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub sport: String,
    pub regions: String,
    pub markets: Vec<String>,
    /// Pause between per-event requests.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for OddsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.the-odds-api.com/v4".to_string(),
            api_key_env: "ODDS_API_KEY".to_string(),
            sport: "basketball_nba".to_string(),
            regions: "eu".to_string(),
            markets: [
                "player_points",
                "player_rebounds",
                "player_assists",
                "player_threes",
                "player_steals",
                "player_blocks",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            request_delay_ms: 1000,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatsApiConfig {
    pub base_url: String,
    /// Season identifier, e.g. `2024-25`.
    pub season: String,
    pub season_type: String,
    /// Pause between per-player requests.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for StatsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://stats.nba.com/stats".to_string(),
            season: "2024-25".to_string(),
            season_type: "Regular Season".to_string(),
            request_delay_ms: 700,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!(path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Reject values the stake sizer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.bankroll.initial <= Decimal::ZERO {
            bail!("bankroll.initial must be positive, got {}", self.bankroll.initial);
        }
        let f = self.staking.default_kelly_fraction;
        if !(f > 0.0 && f <= 1.0) {
            bail!("staking.default_kelly_fraction must be within (0, 1], got {f}");
        }
        let (lo, hi) = (self.staking.min_cap_ratio, self.staking.max_cap_ratio);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            bail!("staking cap ratios must satisfy 0 <= min <= max <= 1, got {lo}..{hi}");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve a secret (API key) referenced by env-var name.
    pub fn resolve_secret(env_name: &str) -> Result<SecretString> {
        Self::resolve_env(env_name).map(SecretString::new)
    }
}
