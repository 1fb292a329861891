//! Input records consumed from upstream collaborators
//!
//! - Yearly rows from the deterministic projection
//! - Invested assets and the cashflow events derived from them
//! - Percentile series produced by the stochastic simulator

mod schedule;
pub mod loader;

pub use schedule::{AssetSchedule, ExitEvent};
pub use loader::{load_scenario, load_simulator_output, load_yearly_breakdown};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calendar::MonthIndex;

/// Deterministic total balance at a year boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyBreakdownRow {
    pub year: i32,
    pub cumulative_balance: f64,
    /// Change over the year, when the projection reports it
    #[serde(default)]
    pub annual_balance: Option<f64>,
}

impl YearlyBreakdownRow {
    pub fn new(year: i32, cumulative_balance: f64) -> Self {
        Self {
            year,
            cumulative_balance,
            annual_balance: None,
        }
    }
}

/// Dated injection (positive) or withdrawal (negative) into the invested pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashflowEvent {
    pub month_index: MonthIndex,
    pub amount: f64,
    pub asset_id: String,
}

impl CashflowEvent {
    pub fn new(month_index: MonthIndex, amount: f64, asset_id: impl Into<String>) -> Self {
        Self {
            month_index,
            amount,
            asset_id: asset_id.into(),
        }
    }
}

/// Invested asset as described by the household's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestedAsset {
    pub id: String,
    pub amount: f64,
    /// First month the capital can be invested; absent means not at start
    #[serde(default)]
    pub availability_date: Option<String>,
    /// Month the position is sold
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Percentile key to monthly market value of the invested pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PercentilePaths(BTreeMap<String, Vec<f64>>);

impl PercentilePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, path: Vec<f64>) {
        self.0.insert(key.into(), path);
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the longest path
    pub fn max_len(&self) -> usize {
        self.0.values().map(Vec::len).max().unwrap_or(0)
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<f64>)> for PercentilePaths {
    fn from_iter<I: IntoIterator<Item = (K, Vec<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Output of the stochastic simulator, consumed as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorOutput {
    #[serde(default)]
    pub principal_path: Vec<f64>,
    #[serde(default)]
    pub percentiles: PercentilePaths,
    #[serde(default)]
    pub simulation_start_date: Option<String>,
    #[serde(default)]
    pub horizon_months: Option<u32>,
}
