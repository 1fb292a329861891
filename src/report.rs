//! Year-end and monthly sampling for charts and tables
//!
//! Year-end values for year `Y` are read at `year_end_month_index(start, Y)`,
//! the first month of `Y + 1`, using the same anchor the series were built on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calendar::{year_end_month_index, year_month_label_of, MonthIndex};
use crate::recompose::Recomposer;

/// Recomposed values at the end of one calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearEndRecord {
    pub year: i32,
    pub year_end_idx: MonthIndex,
    /// `YYYY-MM` of the sampled month
    pub label: String,
    pub baseline: f64,
    /// Total per percentile key
    pub total: BTreeMap<String, f64>,
}

/// Every series at one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub month_index: MonthIndex,
    pub label: String,
    pub deterministic: f64,
    pub principal: f64,
    pub baseline: f64,
    pub total: BTreeMap<String, f64>,
}

/// Sample baseline and totals at the end of each year in `years`
pub fn sample_year_ends(
    recomposer: &mut Recomposer<'_>,
    years: impl IntoIterator<Item = i32>,
    keys: &[String],
) -> Vec<YearEndRecord> {
    let start = recomposer.start();

    years
        .into_iter()
        .map(|year| {
            let idx = year_end_month_index(start, year);
            let (baseline, totals) = recomposer.sample(idx, keys);
            YearEndRecord {
                year,
                year_end_idx: idx,
                label: year_month_label_of(start, idx),
                baseline,
                total: keys.iter().cloned().zip(totals).collect(),
            }
        })
        .collect()
}

/// Sample every month of the deterministic series
pub fn sample_monthly(recomposer: &mut Recomposer<'_>, keys: &[String]) -> Vec<MonthlyPoint> {
    let start = recomposer.start();

    (0..recomposer.len())
        .map(|month| {
            let (baseline, totals) = recomposer.sample(month, keys);
            let month_index = month as MonthIndex;
            MonthlyPoint {
                month_index,
                label: year_month_label_of(start, month_index),
                deterministic: recomposer.deterministic().get(month).unwrap_or(0.0),
                principal: recomposer
                    .principal()
                    .values()
                    .get(month)
                    .or_else(|| recomposer.principal().values().last())
                    .copied()
                    .unwrap_or(0.0),
                baseline,
                total: keys.iter().cloned().zip(totals).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthAnchor;
    use crate::diagnostics::{AnomalyKind, Diagnostics};
    use crate::inputs::{CashflowEvent, PercentilePaths, YearlyBreakdownRow};
    use crate::projection::{DeterministicSeries, PrincipalPath};
    use crate::recompose::BaselineMode;
    use approx::assert_abs_diff_eq;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn fixture() -> (DeterministicSeries, PrincipalPath, PercentilePaths) {
        let mut diagnostics = Diagnostics::new();
        let start = MonthAnchor::new(2026, 1).unwrap();
        let rows: Vec<_> = (2026..=2060)
            .map(|year| YearlyBreakdownRow::new(year, if year < 2049 { 200_000.0 } else { 245_000.0 }))
            .collect();
        let det = DeterministicSeries::build(&rows, 200_000.0, start, 420, &mut diagnostics);
        let principal = PrincipalPath::build(0.0, &[CashflowEvent::new(287, 45_000.0, "pension")], 420, &mut diagnostics);
        let p50: Vec<f64> = principal.values().iter().map(|v| v * 1.1).collect();
        let p10 = principal.values().to_vec();
        let percentiles = [("p10", p10), ("p50", p50)].into_iter().collect();
        (det, principal, percentiles)
    }

    #[test]
    fn test_year_end_reads_january_of_next_year() {
        let (det, principal, percentiles) = fixture();
        let mut recomposer = Recomposer::new(&det, &principal, &percentiles);
        let records = sample_year_ends(&mut recomposer, [2048, 2049], &keys(&["p10", "p50"]));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].year_end_idx, 276);
        assert_eq!(records[0].label, "2049-01");
        assert_eq!(records[1].year_end_idx, 288);
        assert_eq!(records[1].label, "2050-01");

        assert_eq!(records[0].baseline, 200_000.0);
        assert_eq!(records[1].baseline, 200_000.0);
        assert_abs_diff_eq!(records[1].total["p10"], 245_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[1].total["p50"], 249_500.0, epsilon = 1e-6);
        assert!(recomposer.diagnostics().is_clean());
    }

    #[test]
    fn test_year_end_in_jump_aware_mode_matches_nodes() {
        let (det, principal, percentiles) = fixture();
        let mut recomposer = Recomposer::new(&det, &principal, &percentiles).with_mode(BaselineMode::JumpAware);
        let records = sample_year_ends(&mut recomposer, 2040..=2055, &keys(&["p10"]));

        // Baseline is flat at 200k across the whole range
        for record in &records {
            assert_abs_diff_eq!(record.baseline, 200_000.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_year_end_past_horizon_clamps() {
        let (det, principal, percentiles) = fixture();
        let mut recomposer = Recomposer::new(&det, &principal, &percentiles);
        let records = sample_year_ends(&mut recomposer, [2100], &keys(&["p10"]));

        assert_eq!(records[0].baseline, 200_000.0);
        assert!(recomposer.diagnostics().has(AnomalyKind::IndexPastEnd));
    }

    #[test]
    fn test_missing_key_is_reported_once_across_years() {
        let (det, principal, percentiles) = fixture();
        let mut recomposer = Recomposer::new(&det, &principal, &percentiles);
        let records = sample_year_ends(&mut recomposer, [2030, 2031], &keys(&["p99"]));

        assert_eq!(records[0].total["p99"], records[0].baseline);
        assert_eq!(records[1].total["p99"], records[1].baseline);
        assert_eq!(recomposer.diagnostics().count(AnomalyKind::MissingPercentile), 1);
    }

    #[test]
    fn test_monthly_points_cover_every_month() {
        let (det, principal, percentiles) = fixture();
        let mut recomposer = Recomposer::new(&det, &principal, &percentiles);
        let points = sample_monthly(&mut recomposer, &keys(&["p10"]));

        assert_eq!(points.len(), 421);
        assert_eq!(points[0].label, "2026-01");
        assert_eq!(points[420].label, "2061-01");

        let point = &points[288];
        assert_eq!(point.deterministic, 245_000.0);
        assert_eq!(point.principal, 45_000.0);
        assert_eq!(point.baseline, 200_000.0);
        assert_eq!(point.total["p10"], 245_000.0);
    }
}
