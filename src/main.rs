//! PROPEDGE: NBA player-prop value bets.
//!
//! Entry point. Loads configuration, initialises structured logging and
//! dispatches to one pipeline stage per subcommand.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use propedge::config::AppConfig;
use propedge::dashboard;
use propedge::dashboard::routes::DashboardState;
use propedge::data::nba_stats::NbaStatsClient;
use propedge::data::odds::OddsApiClient;
use propedge::engine::accountant::Ledger;
use propedge::engine::pipeline;

const BANNER: &str = r#"
 ____  ____   ___  ____  _____ ____   ____ _____
|  _ \|  _ \ / _ \|  _ \| ____|  _ \ / ___| ____|
| |_) | |_) | | | | |_) |  _| | | | | |  _|  _|
|  __/|  _ <| |_| |  __/| |___| |_| | |_| | |___
|_|   |_| \_\\___/|_|   |_____|____/ \____|_____|

  NBA player props · value bets · Kelly staking
"#;

#[derive(Parser)]
#[command(name = "propedge", version, about = "NBA player-prop value bets and bankroll ledger")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download today's Over player props from the odds API.
    FetchProps,
    /// Download recent game logs and write the per-player summaries.
    FetchStats,
    /// Score props against positions, form and defense; write value bets.
    Score,
    /// Serve the bankroll dashboard.
    Dashboard {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the current bankroll and ledger statistics.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(&cli.config)?;

    init_logging();
    println!("{BANNER}");

    match cli.command {
        Command::FetchProps => {
            let api_key = AppConfig::resolve_secret(&cfg.odds_api.api_key_env)?;
            let client = OddsApiClient::new(&cfg.odds_api, api_key)?;
            let pause = Duration::from_millis(cfg.odds_api.request_delay_ms);
            let n = pipeline::fetch_props(&client, pause, &cfg.files.props).await?;
            info!(props = n, path = %cfg.files.props.display(), "Props saved");
        }
        Command::FetchStats => {
            let client = NbaStatsClient::new(&cfg.stats_api)?;
            let pause = Duration::from_millis(cfg.stats_api.request_delay_ms);
            let n = pipeline::fetch_stats(&client, pause, &cfg.files.player_stats).await?;
            info!(players = n, path = %cfg.files.player_stats.display(), "Player stats saved");
        }
        Command::Score => {
            let report = pipeline::run_value_bets(&cfg.files)?;
            info!(
                props = report.total(),
                value_bets = report.value_bets.len(),
                excluded = report.exclusions.len(),
                path = %cfg.files.value_bets.display(),
                "Scoring complete"
            );
        }
        Command::Dashboard { port } => {
            let host = cfg.dashboard.host.clone();
            let port = port.unwrap_or(cfg.dashboard.port);
            let state = Arc::new(DashboardState::load(cfg)?);
            dashboard::serve(state, &host, port).await?;
        }
        Command::Status => {
            let ledger = Ledger::load(&cfg.files.history, cfg.bankroll.initial)?;
            let stats = ledger.stats();
            if stats.total_bets == 0 {
                warn!("No settled bets yet");
            }
            info!(
                bankroll = %ledger.current_bankroll(),
                currency = %cfg.bankroll.currency,
                bets = stats.total_bets,
                wins = stats.wins,
                losses = stats.losses,
                profit = %stats.total_profit,
                roi = format!("{:.2}%", stats.roi_pct),
                win_rate = format!("{:.2}%", stats.win_rate_pct),
                "Ledger status"
            );
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("propedge=info"));

    let json_logging = std::env::var("PROPEDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
