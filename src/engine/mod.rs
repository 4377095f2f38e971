//! Core engine: the scoring and collection jobs, and the bankroll ledger.

pub mod accountant;
pub mod pipeline;
