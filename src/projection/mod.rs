//! Monthly series builders for the deterministic total and invested principal

pub mod interpolate;
mod deterministic;
mod principal;

pub use interpolate::MonthProbe;
pub use deterministic::{build_nodes, resolve_initial_value, DeterministicSeries, Node};
pub use principal::{PrincipalPath, ReportedInjection, REPORTED_FLOW_THRESHOLD};
