//! Scenario runner for recomposition batches
//!
//! Resolves one start anchor per scenario, builds every series against it,
//! then samples year-ends (and optionally every month). Batches run one
//! scenario per rayon task.

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calendar::{horizon_months_until, last_year_ending_by, try_normalize, MonthAnchor};
use crate::diagnostics::{AnomalyKind, Diagnostics};
use crate::inputs::{AssetSchedule, ExitEvent, InvestedAsset, PercentilePaths, SimulatorOutput, YearlyBreakdownRow};
use crate::projection::{resolve_initial_value, DeterministicSeries, PrincipalPath, ReportedInjection};
use crate::recompose::{BaselineMode, Recomposer};
use crate::report::{sample_monthly, sample_year_ends, MonthlyPoint, YearEndRecord};

/// Percentile keys reported when none are configured
pub const DEFAULT_PERCENTILE_KEYS: [&str; 7] = ["p5", "p10", "p25", "p50", "p75", "p90", "p95"];

/// 35 years
pub const DEFAULT_HORIZON_MONTHS: u32 = 420;

/// Largest principal gap, in currency units, still treated as agreement
const PRINCIPAL_TOLERANCE: f64 = 1.0;

/// Everything needed to recompose one household scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInputs {
    pub name: String,
    pub simulation_start_date: String,
    /// Explicit horizon; takes precedence over `horizon_end_date`
    #[serde(default)]
    pub horizon_months: Option<u32>,
    #[serde(default)]
    pub horizon_end_date: Option<String>,
    /// Month-0 deterministic balance
    #[serde(default)]
    pub initial_balance: Option<f64>,
    #[serde(default)]
    pub yearly_breakdown: Vec<YearlyBreakdownRow>,
    #[serde(default)]
    pub assets: Vec<InvestedAsset>,
    #[serde(default)]
    pub simulator: Option<SimulatorOutput>,
}

/// Configuration for a recomposition run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecompositionConfig {
    pub baseline_mode: BaselineMode,

    /// Percentile keys sampled into every record
    pub percentile_keys: Vec<String>,

    /// Also emit every month, not only year-ends
    pub include_monthly: bool,

    /// Horizon used when neither the scenario nor the simulator gives one
    pub default_horizon_months: u32,

    /// Override the first reported year
    pub first_report_year: Option<i32>,

    /// Override the last reported year
    pub last_report_year: Option<i32>,
}

impl Default for RecompositionConfig {
    fn default() -> Self {
        Self {
            baseline_mode: BaselineMode::default(),
            percentile_keys: DEFAULT_PERCENTILE_KEYS.iter().map(|key| key.to_string()).collect(),
            include_monthly: false,
            default_horizon_months: DEFAULT_HORIZON_MONTHS,
            first_report_year: None,
            last_report_year: None,
        }
    }
}

/// Output of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub name: String,
    /// `YYYY-MM` of month 0
    pub simulation_start: String,
    pub horizon_months: u32,
    pub baseline_mode: BaselineMode,
    pub year_end: Vec<YearEndRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<Vec<MonthlyPoint>>,
    /// Principal with exited assets removed, for charts only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_principal: Option<Vec<f64>>,
    pub injections: Vec<ReportedInjection>,
    pub exits: Vec<ExitEvent>,
    pub diagnostics: Diagnostics,
}

/// Headline numbers of a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub years_reported: usize,
    pub final_year: Option<i32>,
    pub final_baseline: f64,
    pub injection_count: usize,
    pub anomaly_count: usize,
}

impl ScenarioReport {
    pub fn summary(&self) -> ReportSummary {
        let last = self.year_end.last();
        ReportSummary {
            years_reported: self.year_end.len(),
            final_year: last.map(|record| record.year),
            final_baseline: last.map(|record| record.baseline).unwrap_or(0.0),
            injection_count: self.injections.len(),
            anomaly_count: self.diagnostics.len(),
        }
    }
}

/// Runs scenarios under a shared configuration
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::new(RecompositionConfig::default());
/// let reports = runner.run_batch(&scenarios);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    config: RecompositionConfig,
}

impl ScenarioRunner {
    pub fn new(config: RecompositionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecompositionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RecompositionConfig {
        &mut self.config
    }

    /// Recompose one scenario
    pub fn run(&self, inputs: &ScenarioInputs) -> ScenarioReport {
        let mut diagnostics = Diagnostics::new();

        let start = match try_normalize(inputs.simulation_start_date.as_str()) {
            Some(anchor) => anchor,
            None => {
                diagnostics.record(
                    AnomalyKind::SentinelDate,
                    "scenario",
                    format!(
                        "{}: unreadable simulation start {:?}; indices are relative to {}",
                        inputs.name,
                        inputs.simulation_start_date,
                        MonthAnchor::EPOCH
                    ),
                );
                MonthAnchor::EPOCH
            }
        };
        if let Some(simulator) = &inputs.simulator {
            check_simulator_start(simulator, start, &mut diagnostics);
        }

        let horizon = self.resolve_horizon(inputs, start, &mut diagnostics);

        let schedule = AssetSchedule::derive(&inputs.assets, start, horizon, &mut diagnostics);
        let principal = PrincipalPath::build(
            schedule.initial_principal,
            &schedule.cashflows,
            horizon,
            &mut diagnostics,
        );
        if let Some(simulator) = &inputs.simulator {
            check_simulator_principal(&simulator.principal_path, &principal, &mut diagnostics);
        }

        let initial_value = resolve_initial_value(inputs.initial_balance, &inputs.yearly_breakdown);
        let deterministic =
            DeterministicSeries::build(&inputs.yearly_breakdown, initial_value, start, horizon, &mut diagnostics);

        let empty = PercentilePaths::new();
        let percentiles = inputs
            .simulator
            .as_ref()
            .map(|simulator| &simulator.percentiles)
            .unwrap_or(&empty);

        let years = self.report_years(&inputs.yearly_breakdown, start, horizon);
        let keys = &self.config.percentile_keys;

        let mut recomposer =
            Recomposer::new(&deterministic, &principal, percentiles).with_mode(self.config.baseline_mode);
        let year_end = sample_year_ends(&mut recomposer, years, keys);
        let (monthly, display_principal) = if self.config.include_monthly {
            (
                Some(sample_monthly(&mut recomposer, keys)),
                Some(principal.display_path(&schedule.exits)),
            )
        } else {
            (None, None)
        };
        diagnostics.merge(recomposer.into_diagnostics());

        info!(
            "{}: start {}, horizon {} months, {} year-ends, {} injections, {} anomalies",
            inputs.name,
            start,
            horizon,
            year_end.len(),
            principal.injections().len(),
            diagnostics.len()
        );

        ScenarioReport {
            name: inputs.name.clone(),
            simulation_start: start.label(),
            horizon_months: horizon,
            baseline_mode: self.config.baseline_mode,
            year_end,
            monthly,
            display_principal,
            injections: principal.injections().to_vec(),
            exits: schedule.exits,
            diagnostics,
        }
    }

    /// Recompose several scenarios in parallel; reports keep input order
    pub fn run_batch(&self, scenarios: &[ScenarioInputs]) -> Vec<ScenarioReport> {
        scenarios.par_iter().map(|inputs| self.run(inputs)).collect()
    }

    /// Explicit months, else the end date, else the simulator's horizon,
    /// else the simulator's longest path, else the configured default
    fn resolve_horizon(&self, inputs: &ScenarioInputs, start: MonthAnchor, diagnostics: &mut Diagnostics) -> u32 {
        if let Some(months) = inputs.horizon_months {
            return months;
        }
        if let Some(text) = inputs.horizon_end_date.as_deref() {
            match try_normalize(text) {
                Some(end) => return horizon_months_until(start, end),
                None => diagnostics.record(
                    AnomalyKind::SentinelDate,
                    "scenario",
                    format!("{}: unreadable horizon end {:?}", inputs.name, text),
                ),
            }
        }
        if let Some(simulator) = &inputs.simulator {
            if let Some(months) = simulator.horizon_months {
                return months;
            }
            let longest = simulator.percentiles.max_len();
            if longest > 1 {
                return (longest - 1) as u32;
            }
        }
        self.config.default_horizon_months
    }

    /// Row years when rows exist, else every year whose year-end fits the
    /// horizon. Row years are bounded to the start year and the horizon.
    fn report_years(&self, rows: &[YearlyBreakdownRow], start: MonthAnchor, horizon: u32) -> std::ops::RangeInclusive<i32> {
        let last_in_horizon = last_year_ending_by(start, i64::from(horizon));
        let (first, last) = match (
            rows.iter().map(|row| row.year).min(),
            rows.iter().map(|row| row.year).max(),
        ) {
            (Some(first), Some(last)) => (first.max(start.year()), last.min(last_in_horizon)),
            _ => (start.year(), last_in_horizon),
        };
        let first = self.config.first_report_year.unwrap_or(first);
        let last = self.config.last_report_year.unwrap_or(last);
        first..=last
    }
}

fn check_simulator_start(simulator: &SimulatorOutput, start: MonthAnchor, diagnostics: &mut Diagnostics) {
    let Some(text) = simulator.simulation_start_date.as_deref() else {
        return;
    };
    match try_normalize(text) {
        Some(anchor) if anchor != start => diagnostics.record(
            AnomalyKind::StartAnchorMismatch,
            "scenario",
            format!("simulator starts {} but scenario starts {}; using {}", anchor, start, start),
        ),
        Some(_) => {}
        None => diagnostics.record(
            AnomalyKind::SentinelDate,
            "scenario",
            format!("unreadable simulator start {:?}", text),
        ),
    }
}

/// Flag the first month where the simulator's principal disagrees with the derived one
fn check_simulator_principal(reported: &[f64], derived: &PrincipalPath, diagnostics: &mut Diagnostics) {
    if reported.is_empty() {
        return;
    }
    let diverging = reported
        .iter()
        .zip(derived.values())
        .position(|(a, b)| (a - b).abs() >= PRINCIPAL_TOLERANCE);
    if let Some(month) = diverging {
        diagnostics.record(
            AnomalyKind::PrincipalMismatch,
            "scenario",
            format!(
                "simulator principal {} vs derived {} at month {}",
                reported[month],
                derived.values()[month],
                month
            ),
        );
    }
}
