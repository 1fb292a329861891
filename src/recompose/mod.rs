//! Recomposition of total net worth from deterministic, principal and
//! percentile series

mod engine;

pub use engine::{baseline_at, jump_aware_baseline_at, total_at, BaselineMode, Recomposer};
