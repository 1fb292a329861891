//! Structured anomaly reporting
//!
//! The engine never fails on data-shape problems. It recovers locally
//! (clamps, sentinels, zero series) and records an [`Anomaly`] so callers and
//! tests can detect silent misalignment.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Closed set of recoverable input problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnomalyKind {
    /// Probe below month 0, read as month 0
    NegativeIndex,
    /// NaN or infinite probe, read as month 0
    NonFiniteIndex,
    /// Probe between two months, floored
    FractionalIndex,
    /// Probe past the end of a series, read at its last entry
    IndexPastEnd,
    /// A series with no entries was read
    EmptySeries,
    /// Series that should share a length do not
    SeriesLengthMismatch,
    /// Requested percentile key is not in the simulator output
    MissingPercentile,
    /// A date could not be parsed and the epoch sentinel was used
    SentinelDate,
    /// A yearly node does not fall after the previous node and was skipped
    NonMonotonicNode,
    /// A cashflow scheduled before month 0, moved to month 0
    NegativeEventMonth,
    /// A cashflow takes effect after the final month and was ignored
    EventBeyondHorizon,
    /// Simulator principal path disagrees with the one built from assets
    PrincipalMismatch,
    /// Simulator start month disagrees with the scenario start month
    StartAnchorMismatch,
}

impl AnomalyKind {
    /// Expected at horizon edges; logged at debug instead of warn
    pub fn is_routine(self) -> bool {
        matches!(self, AnomalyKind::IndexPastEnd | AnomalyKind::EventBeyondHorizon)
    }
}

/// One recorded anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Operation that hit the problem
    pub context: String,
    pub detail: String,
}

/// Ordered collection of anomalies for one scenario run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    anomalies: Vec<Anomaly>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log an anomaly
    pub fn record(&mut self, kind: AnomalyKind, context: &str, detail: impl Into<String>) {
        let detail = detail.into();
        if kind.is_routine() {
            debug!("[{}] {:?}: {}", context, kind, detail);
        } else {
            warn!("[{}] {:?}: {}", context, kind, detail);
        }
        self.anomalies.push(Anomaly {
            kind,
            context: context.to_string(),
            detail,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.anomalies.iter().any(|a| a.kind == kind)
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.anomalies.iter().filter(|a| a.kind == kind).count()
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Append another collection, keeping order
    pub fn merge(&mut self, other: Diagnostics) {
        self.anomalies.extend(other.anomalies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_query() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_clean());

        diagnostics.record(AnomalyKind::NegativeIndex, "baseline_at", "probe -5");
        diagnostics.record(AnomalyKind::IndexPastEnd, "baseline_at", "probe 500");
        diagnostics.record(AnomalyKind::NegativeIndex, "total_at", "probe -1");

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.count(AnomalyKind::NegativeIndex), 2);
        assert!(diagnostics.has(AnomalyKind::IndexPastEnd));
        assert!(!diagnostics.has(AnomalyKind::MissingPercentile));
        assert_eq!(diagnostics.anomalies()[2].context, "total_at");
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut first = Diagnostics::new();
        first.record(AnomalyKind::SentinelDate, "schedule", "bad date");
        let mut second = Diagnostics::new();
        second.record(AnomalyKind::MissingPercentile, "total_at", "p99");

        first.merge(second);
        let kinds: Vec<_> = first.anomalies().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AnomalyKind::SentinelDate, AnomalyKind::MissingPercentile]);
    }

    #[test]
    fn test_routine_kinds() {
        assert!(AnomalyKind::IndexPastEnd.is_routine());
        assert!(AnomalyKind::EventBeyondHorizon.is_routine());
        assert!(!AnomalyKind::NegativeIndex.is_routine());
    }
}
