//! Accountant: bankroll ledger, bet settlement and performance stats.
//!
//! The history is append-only. The recorded `Bankroll_après` of the last
//! entry is the current bankroll; `replay` recomputes the same series as a
//! fold over profits so the two can be audited against each other.

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::storage;
use crate::types::{BetResult, BettingError, HistoryEntry, Proposition};

/// Rows shown in the "recent bets" view.
pub const RECENT_ROWS: usize = 10;

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Global performance over the whole history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_profit: Decimal,
    pub total_staked: Decimal,
    /// Profit over staked, percent. 0 when nothing was staked.
    pub roi_pct: f64,
    /// Wins over total bets, percent.
    pub win_rate_pct: f64,
}

/// One point of the bankroll curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankrollPoint {
    pub date: NaiveDate,
    pub bankroll: Decimal,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Ledger {
    initial: Decimal,
    entries: Vec<HistoryEntry>,
}

impl Ledger {
    pub fn new(initial: Decimal, entries: Vec<HistoryEntry>) -> Self {
        Self { initial, entries }
    }

    /// Load the history file; an absent file is an empty ledger.
    pub fn load(path: &Path, initial: Decimal) -> anyhow::Result<Self> {
        let ledger = Self::new(initial, storage::load_history(path)?);
        ledger.audit();
        Ok(ledger)
    }

    pub fn initial(&self) -> Decimal {
        self.initial
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Bankroll after the last settled bet, or the initial bankroll.
    pub fn current_bankroll(&self) -> Decimal {
        self.entries
            .last()
            .map(|e| e.bankroll_after)
            .unwrap_or(self.initial)
    }

    /// Profit of a bet: win → `round(stake * (odds - 1), 2)`, loss → `-stake`,
    /// pending → 0.
    pub fn profit(stake: Decimal, odds: f64, result: BetResult) -> Result<Decimal, BettingError> {
        match result {
            BetResult::Win => {
                let odds = Decimal::from_f64(odds)
                    .filter(|o| *o > Decimal::ONE)
                    .ok_or(BettingError::InvalidOdds(odds))?;
                Ok((stake * (odds - Decimal::ONE)).round_dp(2))
            }
            BetResult::Loss => Ok(-stake),
            BetResult::Pending => Ok(Decimal::ZERO),
        }
    }

    /// Settle one proposition from `bankroll`. Pending bets produce no entry.
    pub fn settle(
        proposition: &Proposition,
        result: BetResult,
        bankroll: Decimal,
    ) -> Result<Option<HistoryEntry>, BettingError> {
        if !result.is_settled() {
            return Ok(None);
        }
        let profit = Self::profit(proposition.stake, proposition.odds, result)?;

        Ok(Some(HistoryEntry {
            date: proposition.date,
            player: proposition.player.clone(),
            prop_type: proposition.prop_type.clone(),
            line: proposition.line,
            odds: proposition.odds,
            probability: proposition.probability,
            value: proposition.value,
            stake: proposition.stake,
            mean: proposition.mean,
            std_dev: proposition.std_dev,
            defense_rank: proposition.defense_rank,
            result,
            profit,
            bankroll_after: bankroll + profit,
            bookmaker: proposition.bookmaker.clone(),
            details: proposition.details.clone(),
        }))
    }

    /// Entries the settlements would append, in order, each starting from
    /// the previous one's bankroll. The ledger is unchanged.
    pub fn preview(&self, settlements: &[(Proposition, BetResult)]) -> Result<Vec<HistoryEntry>, BettingError> {
        let mut bankroll = self.current_bankroll();
        let mut entries = Vec::new();

        for (proposition, result) in settlements {
            if let Some(entry) = Self::settle(proposition, *result, bankroll)? {
                bankroll = entry.bankroll_after;
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Settle and record. Returns the new entries for persistence.
    pub fn settle_all(&mut self, settlements: &[(Proposition, BetResult)]) -> Result<Vec<HistoryEntry>, BettingError> {
        let before = self.current_bankroll();
        let entries = self.preview(settlements)?;
        self.entries.extend(entries.iter().cloned());

        info!(
            settled = entries.len(),
            pending = settlements.len() - entries.len(),
            bankroll_before = %before,
            bankroll_after = %self.current_bankroll(),
            "Bets settled"
        );
        Ok(entries)
    }

    /// Bankroll after each entry, folded from the initial bankroll over the
    /// recorded profits.
    pub fn replay(&self) -> Vec<Decimal> {
        self.entries
            .iter()
            .scan(self.initial, |bankroll, entry| {
                *bankroll += entry.profit;
                Some(*bankroll)
            })
            .collect()
    }

    /// Indices of entries whose recorded bankroll differs from the fold.
    pub fn audit(&self) -> Vec<usize> {
        let mismatches: Vec<usize> = self
            .replay()
            .iter()
            .zip(&self.entries)
            .enumerate()
            .filter(|(_, (folded, entry))| **folded != entry.bankroll_after)
            .map(|(i, _)| i)
            .collect();

        if let Some(&first) = mismatches.first() {
            warn!(
                mismatches = mismatches.len(),
                first_row = first + 1,
                "Recorded bankroll differs from replayed profits"
            );
        }
        mismatches
    }

    pub fn stats(&self) -> LedgerStats {
        let total_bets = self.entries.len();
        let wins = self.entries.iter().filter(|e| e.result == BetResult::Win).count();
        let losses = self.entries.iter().filter(|e| e.result == BetResult::Loss).count();
        let total_profit: Decimal = self.entries.iter().map(|e| e.profit).sum();
        let total_staked: Decimal = self.entries.iter().map(|e| e.stake).sum();

        let roi_pct = if total_staked > Decimal::ZERO {
            (total_profit / total_staked * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let win_rate_pct = if total_bets > 0 {
            wins as f64 / total_bets as f64 * 100.0
        } else {
            0.0
        };

        LedgerStats {
            total_bets,
            wins,
            losses,
            total_profit,
            total_staked,
            roi_pct,
            win_rate_pct,
        }
    }

    /// Last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn bankroll_curve(&self) -> Vec<BankrollPoint> {
        self.entries
            .iter()
            .map(|e| BankrollPoint {
                date: e.date,
                bankroll: e.bankroll_after,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
