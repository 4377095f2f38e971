//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`;
//! every request recomputes from the in-memory tables.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::engine::accountant::{BankrollPoint, Ledger, LedgerStats, RECENT_ROWS};
use crate::storage;
use crate::strategy::kelly::{StakeConfig, StakeSizer};
use crate::strategy::{pick_legs, CombinedBet, PropositionBuilder};
use crate::types::{BetResult, BettingError, HistoryEntry, Proposition, ValueBetRow};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub config: AppConfig,
    pub builder: PropositionBuilder,
    pub value_bets: RwLock<Vec<ValueBetRow>>,
    /// Combined bets added this session, appended after the single bets.
    pub combined: RwLock<Vec<Proposition>>,
    pub ledger: RwLock<Ledger>,
}

impl DashboardState {
    pub fn new(config: AppConfig, value_bets: Vec<ValueBetRow>, ledger: Ledger) -> Self {
        let builder = PropositionBuilder::new(StakeSizer::new(StakeConfig::from(&config.staking)));
        Self {
            config,
            builder,
            value_bets: RwLock::new(value_bets),
            combined: RwLock::new(Vec::new()),
            ledger: RwLock::new(ledger),
        }
    }

    /// Load the value bets and the history from the configured files.
    pub fn load(config: AppConfig) -> anyhow::Result<Self> {
        let value_bets = storage::load_value_bets(&config.files.value_bets)?;
        let ledger = Ledger::load(&config.files.history, config.bankroll.initial)?;
        info!(
            value_bets = value_bets.len(),
            history = ledger.entries().len(),
            bankroll = %ledger.current_bankroll(),
            "Dashboard state loaded"
        );
        Ok(Self::new(config, value_bets, ledger))
    }

    /// Single bets staked at `kelly_fraction`, then the session's combined bets.
    pub async fn propositions(&self, kelly_fraction: f64) -> Result<Vec<Proposition>, BettingError> {
        let bankroll = self.ledger.read().await.current_bankroll();
        let mut propositions = {
            let rows = self.value_bets.read().await;
            self.builder
                .build(&rows, bankroll, kelly_fraction, Local::now().date_naive())?
        };
        propositions.extend(self.combined.read().await.iter().cloned());
        Ok(propositions)
    }

    fn kelly_or_default(&self, kelly: Option<f64>) -> f64 {
        kelly.unwrap_or(self.config.staking.default_kelly_fraction)
    }
}

pub type AppState = Arc<DashboardState>;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn bad_request(e: impl fmt::Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "Dashboard request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct KellyParams {
    pub kelly: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CombinedRequest {
    /// Indices into the current proposition list.
    pub indices: Vec<usize>,
    #[serde(default)]
    pub kelly: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ResultsRequest {
    /// One result per exported proposition, in file order. Missing
    /// trailing entries count as pending.
    pub results: Vec<BetResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BankrollResponse {
    pub bankroll: Decimal,
    pub initial: Decimal,
    pub currency: String,
    pub settled_bets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropositionsResponse {
    pub kelly_fraction: f64,
    pub bankroll: Decimal,
    pub count: usize,
    pub propositions: Vec<Proposition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResponse {
    pub exported: usize,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    pub recorded: usize,
    pub bankroll: Decimal,
    pub entries: Vec<HistoryEntry>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/bankroll
pub async fn get_bankroll(State(state): State<AppState>) -> Json<BankrollResponse> {
    let ledger = state.ledger.read().await;
    Json(BankrollResponse {
        bankroll: ledger.current_bankroll(),
        initial: ledger.initial(),
        currency: state.config.bankroll.currency.clone(),
        settled_bets: ledger.entries().len(),
    })
}

/// GET /api/propositions?kelly=0.5
pub async fn get_propositions(
    State(state): State<AppState>,
    Query(params): Query<KellyParams>,
) -> ApiResult<PropositionsResponse> {
    let kelly_fraction = state.kelly_or_default(params.kelly);
    let propositions = state.propositions(kelly_fraction).await.map_err(bad_request)?;
    let bankroll = state.ledger.read().await.current_bankroll();

    Ok(Json(PropositionsResponse {
        kelly_fraction,
        bankroll,
        count: propositions.len(),
        propositions,
    }))
}

async fn price_combined(state: &DashboardState, req: &CombinedRequest) -> Result<(Vec<Proposition>, f64), BettingError> {
    let kelly_fraction = state.kelly_or_default(req.kelly);
    let propositions = state.propositions(kelly_fraction).await?;
    let legs = pick_legs(&propositions, &req.indices)?;
    Ok((legs, kelly_fraction))
}

/// POST /api/combined/preview
pub async fn preview_combined(
    State(state): State<AppState>,
    Json(req): Json<CombinedRequest>,
) -> ApiResult<CombinedBet> {
    let (legs, kelly_fraction) = price_combined(&state, &req).await.map_err(bad_request)?;
    let bankroll = state.ledger.read().await.current_bankroll();
    let combined = state
        .builder
        .preview_combined(&legs, bankroll, kelly_fraction)
        .map_err(bad_request)?;
    Ok(Json(combined))
}

/// POST /api/combined
pub async fn add_combined(
    State(state): State<AppState>,
    Json(req): Json<CombinedRequest>,
) -> ApiResult<Proposition> {
    let (legs, kelly_fraction) = price_combined(&state, &req).await.map_err(bad_request)?;
    let bankroll = state.ledger.read().await.current_bankroll();
    let proposition = state
        .builder
        .combine(&legs, bankroll, kelly_fraction, Local::now().date_naive())
        .map_err(bad_request)?;

    state.combined.write().await.push(proposition.clone());
    Ok(Json(proposition))
}

/// DELETE /api/combined
pub async fn clear_combined(State(state): State<AppState>) -> StatusCode {
    state.combined.write().await.clear();
    StatusCode::NO_CONTENT
}

/// POST /api/export?kelly=0.5
pub async fn export_propositions(
    State(state): State<AppState>,
    Query(params): Query<KellyParams>,
) -> ApiResult<ExportResponse> {
    let kelly_fraction = state.kelly_or_default(params.kelly);
    let propositions = state.propositions(kelly_fraction).await.map_err(bad_request)?;
    let path = &state.config.files.propositions;
    storage::save_propositions(path, &propositions).map_err(internal)?;

    Ok(Json(ExportResponse {
        exported: propositions.len(),
        path: path.display().to_string(),
    }))
}

/// GET /api/exported
pub async fn get_exported(State(state): State<AppState>) -> ApiResult<Vec<Proposition>> {
    let propositions =
        storage::load_propositions(&state.config.files.propositions).map_err(internal)?;
    Ok(Json(propositions))
}

fn pair_results(exported: Vec<Proposition>, results: &[BetResult]) -> Result<Vec<(Proposition, BetResult)>, (StatusCode, String)> {
    if results.len() > exported.len() {
        return Err(bad_request(format!(
            "{} results for {} exported propositions",
            results.len(),
            exported.len()
        )));
    }
    Ok(exported
        .into_iter()
        .enumerate()
        .map(|(i, p)| (p, results.get(i).copied().unwrap_or_default()))
        .collect())
}

/// POST /api/results/preview
pub async fn preview_results(
    State(state): State<AppState>,
    Json(req): Json<ResultsRequest>,
) -> ApiResult<Vec<HistoryEntry>> {
    let exported =
        storage::load_propositions(&state.config.files.propositions).map_err(internal)?;
    let settlements = pair_results(exported, &req.results)?;
    let entries = state
        .ledger
        .read()
        .await
        .preview(&settlements)
        .map_err(bad_request)?;
    Ok(Json(entries))
}

/// POST /api/results
pub async fn save_results(
    State(state): State<AppState>,
    Json(req): Json<ResultsRequest>,
) -> ApiResult<ResultsResponse> {
    let exported =
        storage::load_propositions(&state.config.files.propositions).map_err(internal)?;
    let settlements = pair_results(exported, &req.results)?;

    // The write guard serialises saves; the file append runs off the runtime.
    let mut ledger = state.ledger.write().await;
    let entries = ledger.preview(&settlements).map_err(bad_request)?;
    let path = state.config.files.history.clone();
    let rows = entries.clone();
    tokio::task::spawn_blocking(move || storage::append_history(&path, &rows))
        .await
        .map_err(|e| internal(e.into()))?
        .map_err(internal)?;
    ledger.settle_all(&settlements).map_err(bad_request)?;

    Ok(Json(ResultsResponse {
        recorded: entries.len(),
        bankroll: ledger.current_bankroll(),
        entries,
    }))
}

/// GET /api/history
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let ledger = state.ledger.read().await;
    Json(ledger.recent(RECENT_ROWS).to_vec())
}

/// GET /api/bankroll-curve
pub async fn get_bankroll_curve(State(state): State<AppState>) -> Json<Vec<BankrollPoint>> {
    Json(state.ledger.read().await.bankroll_curve())
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<LedgerStats> {
    Json(state.ledger.read().await.stats())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
