//! Load scenario documents, yearly breakdowns and simulator output from disk
//!
//! Scenario documents are JSON with camelCase keys. The yearly breakdown can
//! be inline or in a CSV file (`year,cumulativeBalance,annualBalance`) whose
//! path is relative to the scenario document.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::InputError;
use crate::scenario::ScenarioInputs;
use super::{InvestedAsset, SimulatorOutput, YearlyBreakdownRow};

/// Scenario document as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioDocument {
    #[serde(default)]
    name: Option<String>,
    simulation_start_date: String,
    #[serde(default)]
    horizon_months: Option<u32>,
    #[serde(default)]
    horizon_end_date: Option<String>,
    #[serde(default)]
    initial_balance: Option<f64>,
    #[serde(default)]
    yearly_breakdown: Option<Vec<YearlyBreakdownRow>>,
    #[serde(default)]
    yearly_breakdown_csv: Option<PathBuf>,
    #[serde(default)]
    assets: Vec<InvestedAsset>,
    #[serde(default)]
    simulator: Option<SimulatorOutput>,
    #[serde(default)]
    simulator_json: Option<PathBuf>,
}

/// Load yearly rows from a CSV file
pub fn load_yearly_breakdown(path: &Path) -> Result<Vec<YearlyBreakdownRow>, InputError> {
    let file = fs::File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_yearly_breakdown_from_reader(file).map_err(|source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Load yearly rows from any reader (e.g. string buffer)
pub fn load_yearly_breakdown_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<YearlyBreakdownRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in csv_reader.deserialize() {
        let row: YearlyBreakdownRow = result?;
        rows.push(row);
    }
    Ok(rows)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, InputError> {
    let text = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load simulator output from a JSON file
pub fn load_simulator_output(path: &Path) -> Result<SimulatorOutput, InputError> {
    read_json(path)
}

/// Load a scenario document and any files it references
pub fn load_scenario(path: &Path) -> Result<ScenarioInputs, InputError> {
    let document: ScenarioDocument = read_json(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let yearly_breakdown = match (document.yearly_breakdown, document.yearly_breakdown_csv) {
        (Some(rows), _) => rows,
        (None, Some(csv_path)) => load_yearly_breakdown(&base.join(csv_path))?,
        (None, None) => return Err(InputError::MissingYearlyBreakdown(path.to_path_buf())),
    };

    let simulator = match (document.simulator, document.simulator_json) {
        (Some(output), _) => Some(output),
        (None, Some(json_path)) => Some(load_simulator_output(&base.join(json_path))?),
        (None, None) => None,
    };

    let name = document.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scenario".to_string())
    });

    debug!(
        "loaded scenario {} ({} yearly rows, {} assets, simulator: {})",
        name,
        yearly_breakdown.len(),
        document.assets.len(),
        simulator.is_some()
    );

    Ok(ScenarioInputs {
        name,
        simulation_start_date: document.simulation_start_date,
        horizon_months: document.horizon_months,
        horizon_end_date: document.horizon_end_date,
        initial_balance: document.initial_balance,
        yearly_breakdown,
        assets: document.assets,
        simulator,
    })
}
