//! Invested principal path: cumulative net capital contributed over time

use serde::{Deserialize, Serialize};

use crate::calendar::MonthIndex;
use crate::diagnostics::{AnomalyKind, Diagnostics};
use crate::inputs::{CashflowEvent, ExitEvent};

/// Smallest net monthly flow reported as an injection (one currency unit)
pub const REPORTED_FLOW_THRESHOLD: f64 = 1.0;

/// Net flow of one event month, for chart annotations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedInjection {
    /// Month the flow was scheduled (it shows in the path one month later)
    pub month_index: MonthIndex,
    pub amount: f64,
}

/// Step series of invested principal for months `0..=horizon`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPath {
    values: Vec<f64>,
    injections: Vec<ReportedInjection>,
}

impl PrincipalPath {
    /// Accumulate cashflows in a single forward pass.
    ///
    /// A flow scheduled at month `k` is contributed before the growth of
    /// month `k + 1`, so it first appears at index `k + 1`; index `k` still
    /// holds the pre-injection amount. Flows at month 0 are part of the
    /// opening value and are counted once. Flows that would land after the
    /// final index are ignored.
    pub fn build(
        initial_principal: f64,
        events: &[CashflowEvent],
        horizon_months: u32,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let len = horizon_months as usize + 1;
        let mut flows = vec![0.0; len];
        let mut scheduled = vec![false; len];

        for event in events {
            let mut month = event.month_index;
            if month < 0 {
                diagnostics.record(
                    AnomalyKind::NegativeEventMonth,
                    "principal_path",
                    format!("{} scheduled at month {}, moved to month 0", event.asset_id, month),
                );
                month = 0;
            }
            if month > 0 && month >= i64::from(horizon_months) {
                diagnostics.record(
                    AnomalyKind::EventBeyondHorizon,
                    "principal_path",
                    format!(
                        "{} at month {} takes effect after final month {}",
                        event.asset_id, month, horizon_months
                    ),
                );
                continue;
            }
            flows[month as usize] += event.amount;
            scheduled[month as usize] = true;
        }

        let mut values = vec![0.0; len];
        let mut current = initial_principal + flows[0];
        values[0] = current;
        for t in 1..len {
            // Month-0 flows are already in the opening value
            if t > 1 {
                current += flows[t - 1];
            }
            values[t] = current;
        }

        let injections = flows
            .iter()
            .zip(&scheduled)
            .enumerate()
            .filter(|(_, (amount, was_scheduled))| **was_scheduled && amount.abs() >= REPORTED_FLOW_THRESHOLD)
            .map(|(month, (amount, _))| ReportedInjection {
                month_index: month as MonthIndex,
                amount: *amount,
            })
            .collect();

        Self { values, injections }
    }

    /// Wrap a path reported by an external simulator
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            injections: Vec::new(),
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, month: usize) -> Option<f64> {
        self.values.get(month).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn initial(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn injections(&self) -> &[ReportedInjection] {
        &self.injections
    }

    /// Chart-only view in which each exit removes the asset's principal from
    /// its exit month onward. Recomposition always uses [`Self::values`].
    pub fn display_path(&self, exits: &[ExitEvent]) -> Vec<f64> {
        let mut path = self.values.clone();
        for exit in exits {
            if exit.month_index <= 0 {
                continue;
            }
            let from = exit.month_index as usize;
            if let Some(tail) = path.get_mut(from..) {
                tail.iter_mut().for_each(|value| *value -= exit.principal);
            }
        }
        path
    }
}
