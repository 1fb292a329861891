//! Baseline and total recomposition
//!
//! `Baseline(m) = Deterministic(m) - Principal(m)`
//! `Total(m, key) = Baseline(m) + Percentile[key](m)`
//!
//! An injection moves the principal and the percentile path by the same
//! amount, so Total jumps by exactly that amount while Baseline stays flat.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::calendar::{MonthAnchor, MonthIndex};
use crate::diagnostics::{AnomalyKind, Diagnostics};
use crate::inputs::PercentilePaths;
use crate::projection::interpolate::{fraction_between, lerp, read_clamped, resolve_probe};
use crate::projection::{DeterministicSeries, MonthProbe, Node, PrincipalPath};

/// How the baseline is computed between yearly nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum BaselineMode {
    /// Subtract principal from the interpolated monthly deterministic value
    Direct,
    /// Subtract principal at each yearly node, then interpolate the baseline
    #[default]
    JumpAware,
}

fn direct_baseline(det: &[f64], principal: &[f64], month: MonthIndex, diagnostics: &mut Diagnostics) -> f64 {
    read_clamped(det, month, "deterministic", diagnostics) - read_clamped(principal, month, "principal", diagnostics)
}

fn jump_aware_baseline(nodes: &[Node], principal: &[f64], month: MonthIndex, diagnostics: &mut Diagnostics) -> f64 {
    if nodes.is_empty() {
        diagnostics.record(
            AnomalyKind::EmptySeries,
            "jump_aware_baseline",
            format!("no yearly nodes to read month {}", month),
        );
        return 0.0;
    }

    let mut node_baseline =
        |node: &Node| node.value - read_clamped(principal, node.month_index, "principal", diagnostics);

    // First node strictly after `month`
    let upper = nodes.partition_point(|node| node.month_index <= month);
    if upper == 0 {
        return node_baseline(&nodes[0]);
    }
    let lower = &nodes[upper - 1];
    if lower.month_index == month || upper == nodes.len() {
        return node_baseline(lower);
    }
    let next = &nodes[upper];
    let from = node_baseline(lower);
    let to = node_baseline(next);
    lerp(from, to, fraction_between(month, lower.month_index, next.month_index))
}

fn percentile_component(
    percentiles: &PercentilePaths,
    month: MonthIndex,
    key: &str,
    diagnostics: &mut Diagnostics,
) -> f64 {
    match percentiles.get(key) {
        Some(path) => read_clamped(path, month, key, diagnostics),
        None => {
            diagnostics.record(
                AnomalyKind::MissingPercentile,
                "total_at",
                format!("no percentile path {:?}; total falls back to baseline", key),
            );
            0.0
        }
    }
}

/// Non-invested net worth at `idx`: `det[i] - principal[j]`, each index
/// clamped against its own series
pub fn baseline_at(det: &[f64], principal: &[f64], idx: impl MonthProbe, diagnostics: &mut Diagnostics) -> f64 {
    let month = resolve_probe(idx, "baseline_at", diagnostics);
    direct_baseline(det, principal, month, diagnostics)
}

/// Baseline plus the percentile path at `idx`; baseline alone when `key` is absent
pub fn total_at(
    det: &[f64],
    principal: &[f64],
    percentiles: &PercentilePaths,
    idx: impl MonthProbe,
    key: &str,
    diagnostics: &mut Diagnostics,
) -> f64 {
    let month = resolve_probe(idx, "total_at", diagnostics);
    direct_baseline(det, principal, month, diagnostics) + percentile_component(percentiles, month, key, diagnostics)
}

/// Baseline interpolated between yearly nodes, each node's baseline being
/// `D_node - P(node month)`. Past the last node its baseline is held.
///
/// Principal is subtracted before interpolating, so an injection inside an
/// interpolation window does not bend the baseline.
pub fn jump_aware_baseline_at(
    nodes: &[Node],
    principal: &[f64],
    idx: impl MonthProbe,
    diagnostics: &mut Diagnostics,
) -> f64 {
    let month = resolve_probe(idx, "jump_aware_baseline_at", diagnostics);
    jump_aware_baseline(nodes, principal, month, diagnostics)
}

/// Recomposes one scenario's series and collects the anomalies hit while sampling
#[derive(Debug)]
pub struct Recomposer<'a> {
    deterministic: &'a DeterministicSeries,
    principal: &'a PrincipalPath,
    percentiles: &'a PercentilePaths,
    mode: BaselineMode,
    diagnostics: Diagnostics,
    /// Keys already reported as missing
    missing_keys: BTreeSet<String>,
}

impl<'a> Recomposer<'a> {
    pub fn new(
        deterministic: &'a DeterministicSeries,
        principal: &'a PrincipalPath,
        percentiles: &'a PercentilePaths,
    ) -> Self {
        let mut diagnostics = Diagnostics::new();
        let expected = deterministic.len();

        if principal.len() != expected {
            diagnostics.record(
                AnomalyKind::SeriesLengthMismatch,
                "recomposer",
                format!("principal has {} months, deterministic has {}", principal.len(), expected),
            );
        }
        for (key, path) in percentiles.iter() {
            if path.len() < expected {
                diagnostics.record(
                    AnomalyKind::SeriesLengthMismatch,
                    "recomposer",
                    format!("percentile {} has {} months, deterministic has {}", key, path.len(), expected),
                );
            }
        }

        Self {
            deterministic,
            principal,
            percentiles,
            mode: BaselineMode::default(),
            diagnostics,
            missing_keys: BTreeSet::new(),
        }
    }

    pub fn with_mode(mut self, mode: BaselineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> BaselineMode {
        self.mode
    }

    /// Anchor every month index is relative to
    pub fn start(&self) -> MonthAnchor {
        self.deterministic.start()
    }

    /// Number of months in the deterministic series
    pub fn len(&self) -> usize {
        self.deterministic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deterministic.is_empty()
    }

    pub fn deterministic(&self) -> &DeterministicSeries {
        self.deterministic
    }

    pub fn principal(&self) -> &PrincipalPath {
        self.principal
    }

    pub fn percentiles(&self) -> &PercentilePaths {
        self.percentiles
    }

    fn baseline_month(&mut self, month: MonthIndex) -> f64 {
        let nodes = self.deterministic.nodes();
        match self.mode {
            // Without nodes there is nothing to interpolate between
            BaselineMode::JumpAware if !nodes.is_empty() => {
                jump_aware_baseline(nodes, self.principal.values(), month, &mut self.diagnostics)
            }
            _ => direct_baseline(
                self.deterministic.values(),
                self.principal.values(),
                month,
                &mut self.diagnostics,
            ),
        }
    }

    pub fn baseline(&mut self, idx: impl MonthProbe) -> f64 {
        let month = resolve_probe(idx, "baseline", &mut self.diagnostics);
        self.baseline_month(month)
    }

    /// Percentile value at `month`; a missing key reads 0 and is recorded once
    fn percentile_month(&mut self, month: MonthIndex, key: &str) -> f64 {
        if self.percentiles.get(key).is_none() && !self.missing_keys.insert(key.to_string()) {
            return 0.0;
        }
        percentile_component(self.percentiles, month, key, &mut self.diagnostics)
    }

    pub fn total(&mut self, idx: impl MonthProbe, key: &str) -> f64 {
        let month = resolve_probe(idx, "total", &mut self.diagnostics);
        let baseline = self.baseline_month(month);
        baseline + self.percentile_month(month, key)
    }

    /// Baseline and one total per key, sharing a single probe resolution
    pub fn sample(&mut self, idx: impl MonthProbe, keys: &[String]) -> (f64, Vec<f64>) {
        let month = resolve_probe(idx, "sample", &mut self.diagnostics);
        let baseline = self.baseline_month(month);
        let mut totals = Vec::with_capacity(keys.len());
        for key in keys {
            totals.push(baseline + self.percentile_month(month, key));
        }
        (baseline, totals)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{month_index_of, year_end_month_index};
    use crate::inputs::{CashflowEvent, YearlyBreakdownRow};
    use approx::assert_abs_diff_eq;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert_eq, proptest};

    const INJECTION: f64 = 45_000.0;

    fn start() -> MonthAnchor {
        MonthAnchor::new(2026, 1).unwrap()
    }

    /// Deterministic 200k before month 288 and 245k from it, principal and
    /// p5 both stepping by 45k at 288
    fn golden_series() -> (Vec<f64>, Vec<f64>, PercentilePaths) {
        let months = 421;
        let det = (0..months).map(|m| if m < 288 { 200_000.0 } else { 245_000.0 }).collect();
        let principal = (0..months).map(|m| if m < 288 { 0.0 } else { INJECTION }).collect();
        let p5: Vec<f64> = (0..months).map(|m| if m < 288 { 0.0 } else { INJECTION }).collect();
        let percentiles = [("p5", p5)].into_iter().collect();
        (det, principal, percentiles)
    }

    #[test]
    fn test_golden_injection_scenario() {
        let mut diagnostics = Diagnostics::new();
        let (det, principal, percentiles) = golden_series();
        let idx = month_index_of(start(), "2050-01-01");
        assert_eq!(idx, 288);

        let b_before = baseline_at(&det, &principal, idx - 1, &mut diagnostics);
        let b_at = baseline_at(&det, &principal, idx, &mut diagnostics);
        let t_before = total_at(&det, &principal, &percentiles, idx - 1, "p5", &mut diagnostics);
        let t_at = total_at(&det, &principal, &percentiles, idx, "p5", &mut diagnostics);

        assert_eq!(b_before, 200_000.0);
        assert_eq!(b_at, 200_000.0);
        assert_abs_diff_eq!(t_at - t_before, INJECTION, epsilon = 1.0);
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn test_clamping_at_both_ends() {
        let mut diagnostics = Diagnostics::new();
        let det = vec![10.0, 20.0, 30.0];
        let principal = vec![1.0, 2.0, 3.0];

        let at_zero = baseline_at(&det, &principal, 0, &mut diagnostics);
        assert_eq!(baseline_at(&det, &principal, -5, &mut diagnostics), at_zero);
        assert_eq!(baseline_at(&det, &principal, 103, &mut diagnostics), 27.0);
        assert!(diagnostics.has(AnomalyKind::NegativeIndex));
        assert!(diagnostics.has(AnomalyKind::IndexPastEnd));
    }

    #[test]
    fn test_non_finite_and_fractional_probes() {
        let mut diagnostics = Diagnostics::new();
        let det = vec![10.0, 20.0, 30.0];
        let principal = vec![0.0; 3];

        assert_eq!(baseline_at(&det, &principal, f64::NAN, &mut diagnostics), 10.0);
        assert_eq!(baseline_at(&det, &principal, 1.5, &mut diagnostics), 20.0);
        assert!(diagnostics.has(AnomalyKind::NonFiniteIndex));
        assert!(diagnostics.has(AnomalyKind::FractionalIndex));
    }

    #[test]
    fn test_series_of_different_lengths_clamp_independently() {
        let mut diagnostics = Diagnostics::new();
        let det = vec![100.0, 110.0, 120.0, 130.0];
        let principal = vec![5.0, 6.0];

        assert_eq!(baseline_at(&det, &principal, 3, &mut diagnostics), 124.0);
    }

    #[test]
    fn test_missing_percentile_falls_back_to_baseline() {
        let mut diagnostics = Diagnostics::new();
        let (det, principal, percentiles) = golden_series();

        let baseline = baseline_at(&det, &principal, 300, &mut diagnostics);
        let total = total_at(&det, &principal, &percentiles, 300, "p99", &mut diagnostics);
        assert_eq!(total, baseline);
        assert!(diagnostics.has(AnomalyKind::MissingPercentile));
    }

    #[test]
    fn test_jump_aware_baseline_is_flat_across_injection_inside_window() {
        let mut diagnostics = Diagnostics::new();
        // Yearly rows straddle the injection: the 2049 node already includes it
        let rows: Vec<_> = (2026..=2060)
            .map(|year| YearlyBreakdownRow::new(year, if year < 2049 { 200_000.0 } else { 245_000.0 }))
            .collect();
        let det = DeterministicSeries::build(&rows, 200_000.0, start(), 420, &mut diagnostics);
        // Scheduled December 2049, visible from January 2050
        let events = vec![CashflowEvent::new(287, INJECTION, "pension")];
        let principal = PrincipalPath::build(0.0, &events, 420, &mut diagnostics);
        let p50: Vec<f64> = principal.values().to_vec();
        let percentiles: PercentilePaths = [("p50", p50)].into_iter().collect();

        let window_start = year_end_month_index(start(), 2048);
        let window_end = year_end_month_index(start(), 2049);
        assert_eq!((window_start, window_end), (276, 288));

        let mut recomposer = Recomposer::new(&det, &principal, &percentiles).with_mode(BaselineMode::JumpAware);
        for month in window_start..=window_end {
            assert_abs_diff_eq!(recomposer.baseline(month), 200_000.0, epsilon = 1e-9);
        }
        let jump = recomposer.total(288, "p50") - recomposer.total(287, "p50");
        assert_abs_diff_eq!(jump, INJECTION, epsilon = 1e-9);

        // Subtracting after interpolation bends the baseline inside the window
        let mut direct = Recomposer::new(&det, &principal, &percentiles).with_mode(BaselineMode::Direct);
        assert!(direct.baseline(287) - direct.baseline(276) > 40_000.0);
    }

    #[test]
    fn test_jump_aware_holds_last_node_and_handles_missing_nodes() {
        let mut diagnostics = Diagnostics::new();
        let nodes = vec![Node::new(0, 100.0), Node::new(12, 220.0)];
        let principal = vec![0.0; 30];

        assert_eq!(jump_aware_baseline_at(&nodes, &principal, 6, &mut diagnostics), 160.0);
        assert_eq!(jump_aware_baseline_at(&nodes, &principal, 25, &mut diagnostics), 220.0);
        assert_eq!(jump_aware_baseline_at(&[], &principal, 3, &mut diagnostics), 0.0);
        assert!(diagnostics.has(AnomalyKind::EmptySeries));
    }

    #[test]
    fn test_recomposer_flags_length_mismatch() {
        let mut diagnostics = Diagnostics::new();
        let det = DeterministicSeries::build(
            &[YearlyBreakdownRow::new(2026, 1.0)],
            1.0,
            start(),
            24,
            &mut diagnostics,
        );
        let principal = PrincipalPath::from_values(vec![0.0; 10]);
        let percentiles: PercentilePaths = [("p50", vec![0.0; 5])].into_iter().collect();

        let recomposer = Recomposer::new(&det, &principal, &percentiles);
        assert_eq!(recomposer.diagnostics().count(AnomalyKind::SeriesLengthMismatch), 2);
    }

    #[test]
    fn test_missing_key_recorded_once_per_recomposer() {
        let mut diagnostics = Diagnostics::new();
        let rows = vec![YearlyBreakdownRow::new(2026, 110.0)];
        let det = DeterministicSeries::build(&rows, 100.0, start(), 24, &mut diagnostics);
        let principal = PrincipalPath::build(0.0, &[], 24, &mut diagnostics);
        let percentiles = PercentilePaths::new();
        let keys = vec!["p10".to_string(), "p50".to_string()];

        let mut recomposer = Recomposer::new(&det, &principal, &percentiles);
        for month in 0..=24 {
            let (baseline, totals) = recomposer.sample(month, &keys);
            assert_eq!(totals, vec![baseline, baseline]);
        }
        assert_eq!(recomposer.total(3, "p10"), recomposer.baseline(3));
        assert_eq!(recomposer.diagnostics().count(AnomalyKind::MissingPercentile), 2);
    }

    #[test]
    fn test_default_mode_is_jump_aware() {
        assert_eq!(BaselineMode::default(), BaselineMode::JumpAware);
    }

    #[test]
    fn test_sample_matches_individual_reads() {
        let mut diagnostics = Diagnostics::new();
        let rows = vec![YearlyBreakdownRow::new(2026, 110.0), YearlyBreakdownRow::new(2027, 130.0)];
        let det = DeterministicSeries::build(&rows, 100.0, start(), 24, &mut diagnostics);
        let principal = PrincipalPath::build(10.0, &[], 24, &mut diagnostics);
        let percentiles: PercentilePaths =
            [("p10", vec![9.0; 25]), ("p90", vec![14.0; 25])].into_iter().collect();
        let keys = vec!["p10".to_string(), "p90".to_string()];

        let mut recomposer = Recomposer::new(&det, &principal, &percentiles);
        let (baseline, totals) = recomposer.sample(18, &keys);

        assert_eq!(baseline, recomposer.baseline(18));
        assert_eq!(totals, vec![recomposer.total(18, "p10"), recomposer.total(18, "p90")]);
        assert!(recomposer.diagnostics().is_clean());
    }

    proptest! {
        #[test]
        fn prop_total_is_baseline_plus_percentile(
            det in vec(-1.0e7f64..1.0e7, 1..120),
            principal_seed in vec(0.0f64..1.0e6, 1..120),
            percentile_seed in vec(0.0f64..2.0e6, 1..120)
        ) {
            let len = det.len();
            let principal: Vec<f64> = principal_seed.iter().cycle().take(len).copied().collect();
            let p50: Vec<f64> = percentile_seed.iter().cycle().take(len).copied().collect();
            let percentiles: PercentilePaths = [("p50", p50.clone())].into_iter().collect();
            let mut diagnostics = Diagnostics::new();

            for m in 0..len {
                let baseline = baseline_at(&det, &principal, m, &mut diagnostics);
                let total = total_at(&det, &principal, &percentiles, m, "p50", &mut diagnostics);
                prop_assert_eq!(total, baseline + p50[m]);
            }
        }

        #[test]
        fn prop_out_of_range_probes_clamp(
            det in vec(-1.0e6f64..1.0e6, 1..60),
            below in 1i64..1000,
            beyond in 0i64..1000
        ) {
            let principal: Vec<f64> = det.iter().map(|v| v * 0.25).collect();
            let mut diagnostics = Diagnostics::new();
            let len = det.len() as i64;

            prop_assert_eq!(
                baseline_at(&det, &principal, -below, &mut diagnostics),
                baseline_at(&det, &principal, 0i64, &mut diagnostics)
            );
            prop_assert_eq!(
                baseline_at(&det, &principal, len + beyond, &mut diagnostics),
                baseline_at(&det, &principal, len - 1, &mut diagnostics)
            );
        }
    }
}
