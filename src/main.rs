//! Wealth Recompose CLI
//!
//! Loads scenario documents, recomposes baseline and percentile totals, and
//! prints the year-end table

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use wealth_recompose::inputs::load_scenario;
use wealth_recompose::{BaselineMode, RecompositionConfig, ScenarioReport, ScenarioRunner};

#[derive(Parser, Debug)]
#[command(
    name = "wealth-recompose",
    about = "Recompose deterministic and simulated household wealth on one month axis"
)]
struct Cli {
    /// Scenario documents (JSON)
    #[arg(required = true)]
    scenarios: Vec<PathBuf>,
    #[arg(long, value_enum, default_value_t = BaselineMode::JumpAware)]
    mode: BaselineMode,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Percentile keys to report, e.g. p10,p50,p90"
    )]
    percentiles: Option<Vec<String>>,
    #[arg(long, help = "Include every month in the JSON report")]
    monthly: bool,
    #[arg(long)]
    from_year: Option<i32>,
    #[arg(long)]
    to_year: Option<i32>,
    #[arg(long, help = "Horizon used when a scenario does not set one")]
    horizon_months: Option<u32>,
    #[arg(long, help = "Write the year-end table as CSV")]
    output: Option<PathBuf>,
    #[arg(long, help = "Write the full reports as JSON")]
    json: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> RecompositionConfig {
        let mut config = RecompositionConfig {
            baseline_mode: self.mode,
            include_monthly: self.monthly,
            first_report_year: self.from_year,
            last_report_year: self.to_year,
            ..Default::default()
        };
        if let Some(keys) = &self.percentiles {
            config.percentile_keys = keys.clone();
        }
        if let Some(months) = self.horizon_months {
            config.default_horizon_months = months;
        }
        config
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let scenarios = cli
        .scenarios
        .iter()
        .map(|path| load_scenario(path).with_context(|| format!("loading scenario {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let config = cli.config();
    let keys = config.percentile_keys.clone();
    let runner = ScenarioRunner::new(config);
    let reports = runner.run_batch(&scenarios);

    for report in &reports {
        print_report(report, &keys);
    }

    if let Some(path) = &cli.output {
        write_year_end_csv(path, &reports, &keys)
            .with_context(|| format!("writing year-end table to {}", path.display()))?;
        println!("\nYear-end table written to: {}", path.display());
    }

    if let Some(path) = &cli.json {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &reports)
            .with_context(|| format!("writing reports to {}", path.display()))?;
        println!("Full reports written to: {}", path.display());
    }

    Ok(())
}

fn print_report(report: &ScenarioReport, keys: &[String]) {
    println!("\nScenario: {}", report.name);
    println!("  Start: {}", report.simulation_start);
    println!("  Horizon: {} months", report.horizon_months);
    println!("  Baseline mode: {:?}", report.baseline_mode);
    println!();

    print!("{:>5} {:>5} {:>8} {:>14}", "Year", "Idx", "Month", "Baseline");
    for key in keys {
        print!(" {:>14}", key);
    }
    println!();
    println!("{}", "-".repeat(35 + 15 * keys.len()));

    for record in &report.year_end {
        print!(
            "{:>5} {:>5} {:>8} {:>14.2}",
            record.year, record.year_end_idx, record.label, record.baseline
        );
        for key in keys {
            print!(" {:>14.2}", record.total.get(key).copied().unwrap_or(record.baseline));
        }
        println!();
    }

    if !report.injections.is_empty() {
        println!("\nInjections:");
        for injection in &report.injections {
            println!("  Month {:>3}: {:.2}", injection.month_index, injection.amount);
        }
    }

    let summary = report.summary();
    println!("\nSummary:");
    println!("  Years reported: {}", summary.years_reported);
    if let Some(year) = summary.final_year {
        println!("  Final baseline ({}): {:.2}", year, summary.final_baseline);
    }
    println!("  Anomalies: {}", summary.anomaly_count);
}

fn write_year_end_csv(path: &Path, reports: &[ScenarioReport], keys: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        "scenario".to_string(),
        "year".to_string(),
        "yearEndIdx".to_string(),
        "month".to_string(),
        "baseline".to_string(),
    ];
    header.extend(keys.iter().map(|key| format!("total_{}", key)));
    writer.write_record(&header)?;

    for report in reports {
        for record in &report.year_end {
            let mut row = vec![
                report.name.clone(),
                record.year.to_string(),
                record.year_end_idx.to_string(),
                record.label.clone(),
                format!("{:.2}", record.baseline),
            ];
            row.extend(
                keys.iter()
                    .map(|key| format!("{:.2}", record.total.get(key).copied().unwrap_or(record.baseline))),
            );
            writer.write_record(&row)?;
        }
    }

    writer.flush()?;
    Ok(())
}
