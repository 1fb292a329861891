//! Shared numeric helpers: probe sanitizing, clamping, linear interpolation

use std::fmt;

use crate::calendar::MonthIndex;
use crate::diagnostics::{AnomalyKind, Diagnostics};

/// A value that can be used to probe a monthly series.
///
/// Integer probes are exact. Float probes exist for callers that compute
/// positions arithmetically; anything that is not a whole, finite,
/// non-negative month is flagged.
pub trait MonthProbe: Copy + fmt::Debug {
    fn position(self) -> f64;
}

impl MonthProbe for i64 {
    fn position(self) -> f64 {
        self as f64
    }
}

impl MonthProbe for i32 {
    fn position(self) -> f64 {
        f64::from(self)
    }
}

impl MonthProbe for u32 {
    fn position(self) -> f64 {
        f64::from(self)
    }
}

impl MonthProbe for usize {
    fn position(self) -> f64 {
        self as f64
    }
}

impl MonthProbe for f64 {
    fn position(self) -> f64 {
        self
    }
}

/// Read a raw position as a month: negative and non-finite become 0,
/// fractional positions are floored
pub fn sanitize_position(raw: f64) -> (MonthIndex, Option<AnomalyKind>) {
    if !raw.is_finite() {
        (0, Some(AnomalyKind::NonFiniteIndex))
    } else if raw < 0.0 {
        (0, Some(AnomalyKind::NegativeIndex))
    } else if raw.fract() != 0.0 {
        (raw.floor() as MonthIndex, Some(AnomalyKind::FractionalIndex))
    } else {
        (raw as MonthIndex, None)
    }
}

/// Sanitize a probe, recording any anomaly under `context`
pub fn resolve_probe(probe: impl MonthProbe, context: &str, diagnostics: &mut Diagnostics) -> MonthIndex {
    let (month, issue) = sanitize_position(probe.position());
    if let Some(kind) = issue {
        diagnostics.record(kind, context, format!("probe {:?} read as month {}", probe, month));
    }
    month
}

/// Clamp `index` into `[0, len - 1]`; 0 for an empty series
pub fn clamp_index(index: MonthIndex, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    index.clamp(0, len as MonthIndex - 1) as usize
}

/// Read `series` at a clamped month. An empty series reads as 0.
pub fn read_clamped(series: &[f64], month: MonthIndex, name: &str, diagnostics: &mut Diagnostics) -> f64 {
    if series.is_empty() {
        diagnostics.record(
            AnomalyKind::EmptySeries,
            name,
            format!("read at month {} from an empty series", month),
        );
        return 0.0;
    }
    let last = series.len() as MonthIndex - 1;
    if month > last {
        diagnostics.record(
            AnomalyKind::IndexPastEnd,
            name,
            format!("month {} read at last entry {}", month, last),
        );
    }
    series[clamp_index(month, series.len())]
}

pub fn lerp(start: f64, end: f64, fraction: f64) -> f64 {
    start + fraction * (end - start)
}

/// Position of `month` between two node months (0 at `from`, 1 at `to`)
pub fn fraction_between(month: MonthIndex, from: MonthIndex, to: MonthIndex) -> f64 {
    if to == from {
        return 0.0;
    }
    (month - from) as f64 / (to - from) as f64
}
