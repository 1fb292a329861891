//! Deterministic monthly series built from yearly balance nodes

use serde::{Deserialize, Serialize};

use crate::calendar::{year_end_month_index, MonthAnchor, MonthIndex};
use crate::diagnostics::{AnomalyKind, Diagnostics};
use crate::inputs::YearlyBreakdownRow;
use super::interpolate::{fraction_between, lerp};

/// Interpolation anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub month_index: MonthIndex,
    pub value: f64,
}

impl Node {
    pub fn new(month_index: MonthIndex, value: f64) -> Self {
        Self { month_index, value }
    }
}

/// Month-0 balance: the explicit value when given, else the first row's
/// opening balance (`cumulativeBalance - annualBalance`), else its closing
/// balance, else 0
pub fn resolve_initial_value(explicit: Option<f64>, rows: &[YearlyBreakdownRow]) -> f64 {
    if let Some(value) = explicit.filter(|v| v.is_finite()) {
        return value;
    }
    match rows.iter().min_by_key(|row| row.year) {
        Some(row) => match row.annual_balance {
            Some(delta) => row.cumulative_balance - delta,
            None => row.cumulative_balance,
        },
        None => 0.0,
    }
}

/// Node list: month 0 followed by each row at its year-end month.
///
/// Rows are sorted by year first. A row whose month does not come strictly
/// after the previous node is skipped and reported.
pub fn build_nodes(
    rows: &[YearlyBreakdownRow],
    initial_value: f64,
    start: MonthAnchor,
    diagnostics: &mut Diagnostics,
) -> Vec<Node> {
    let mut sorted: Vec<&YearlyBreakdownRow> = rows.iter().collect();
    sorted.sort_by_key(|row| row.year);

    let mut nodes = Vec::with_capacity(sorted.len() + 1);
    nodes.push(Node::new(0, initial_value));

    let mut previous = 0;
    for row in sorted {
        let month_index = year_end_month_index(start, row.year);
        if month_index <= previous {
            diagnostics.record(
                AnomalyKind::NonMonotonicNode,
                "deterministic_nodes",
                format!(
                    "year {} ends at month {}, not after previous node at month {}",
                    row.year, month_index, previous
                ),
            );
            continue;
        }
        nodes.push(Node::new(month_index, row.cumulative_balance));
        previous = month_index;
    }

    nodes
}

/// Deterministic total balance for months `0..=horizon`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterministicSeries {
    start: MonthAnchor,
    values: Vec<f64>,
    nodes: Vec<Node>,
}

impl DeterministicSeries {
    /// Build the monthly series from yearly rows.
    ///
    /// No rows gives an all-zero series of the requested length.
    pub fn build(
        rows: &[YearlyBreakdownRow],
        initial_value: f64,
        start: MonthAnchor,
        horizon_months: u32,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        if rows.is_empty() {
            diagnostics.record(
                AnomalyKind::EmptySeries,
                "deterministic_series",
                "no yearly rows; deterministic series is all zero",
            );
            return Self::from_nodes(start, Vec::new(), horizon_months);
        }
        let nodes = build_nodes(rows, initial_value, start, diagnostics);
        Self::from_nodes(start, nodes, horizon_months)
    }

    /// Interpolate between `nodes`, which must be strictly increasing by
    /// month. Past the last node the last value is held; node months return
    /// the node value exactly.
    pub fn from_nodes(start: MonthAnchor, nodes: Vec<Node>, horizon_months: u32) -> Self {
        let len = horizon_months as usize + 1;
        let mut values = Vec::with_capacity(len);

        if let Some(last) = nodes.last().copied() {
            let mut cursor = 0;
            for month in 0..len as MonthIndex {
                while cursor + 1 < nodes.len() && nodes[cursor + 1].month_index < month {
                    cursor += 1;
                }
                if cursor + 1 >= nodes.len() {
                    values.push(last.value);
                    continue;
                }

                let from = nodes[cursor];
                let to = nodes[cursor + 1];
                let value = if month <= from.month_index {
                    from.value
                } else if month == to.month_index {
                    to.value
                } else {
                    lerp(from.value, to.value, fraction_between(month, from.month_index, to.month_index))
                };
                values.push(value);
            }
        } else {
            values.resize(len, 0.0);
        }

        Self { start, values, nodes }
    }

    /// Anchor the node months were computed against
    pub fn start(&self) -> MonthAnchor {
        self.start
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
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

    pub fn horizon_months(&self) -> u32 {
        self.values.len().saturating_sub(1) as u32
    }
}
