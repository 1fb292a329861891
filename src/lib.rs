//! Wealth Recompose - month-indexed recomposition of household net worth
//!
//! This library provides:
//! - Calendar anchoring and month-index arithmetic against one simulation start
//! - Deterministic monthly series interpolated from yearly balances
//! - Invested principal paths built from dated injections
//! - Baseline / total recomposition with percentile paths from a simulator
//! - Year-end and monthly sampling for charts and tables
//! - Parallel batch runs over scenario documents

pub mod calendar;
pub mod diagnostics;
pub mod error;
pub mod inputs;
pub mod projection;
pub mod recompose;
pub mod report;
pub mod scenario;

// Re-export commonly used types
pub use calendar::{month_index_of, normalize_to_month_start, year_end_month_index, MonthAnchor, MonthIndex};
pub use diagnostics::{Anomaly, AnomalyKind, Diagnostics};
pub use error::InputError;
pub use inputs::{CashflowEvent, InvestedAsset, PercentilePaths, SimulatorOutput, YearlyBreakdownRow};
pub use projection::{DeterministicSeries, PrincipalPath};
pub use recompose::{baseline_at, jump_aware_baseline_at, total_at, BaselineMode, Recomposer};
pub use report::{sample_year_ends, YearEndRecord};
pub use scenario::{RecompositionConfig, ScenarioInputs, ScenarioReport, ScenarioRunner};
