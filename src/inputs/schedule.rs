//! Derive initial principal, injections and exits from an asset list

use serde::{Deserialize, Serialize};

use crate::calendar::{try_normalize, MonthAnchor, MonthIndex};
use crate::diagnostics::{AnomalyKind, Diagnostics};
use super::{CashflowEvent, InvestedAsset};

/// Availability marker meaning "invested from the start"
const IMMEDIATE: &str = "immediate";

/// Sale of an asset at its end date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitEvent {
    pub month_index: MonthIndex,
    pub asset_id: String,
    /// Total principal contributed by the asset
    pub principal: f64,
}

/// Invested principal schedule relative to one start anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSchedule {
    pub start: MonthAnchor,
    pub initial_principal: f64,
    pub cashflows: Vec<CashflowEvent>,
    pub exits: Vec<ExitEvent>,
}

impl AssetSchedule {
    /// Split assets into capital available at `start` and later injections.
    ///
    /// An asset counts as initial principal only when its availability date is
    /// on or before the start month. Assets without a date are injected at
    /// month 0. End dates inside `(0, horizon_months]` of assets with positive
    /// principal become exit events.
    pub fn derive(
        assets: &[InvestedAsset],
        start: MonthAnchor,
        horizon_months: u32,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut initial_principal = 0.0;
        let mut cashflows = Vec::new();
        let mut exits = Vec::new();

        for asset in assets {
            let availability = asset
                .availability_date
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty());

            match availability {
                Some(text) if text.eq_ignore_ascii_case(IMMEDIATE) => {
                    initial_principal += asset.amount;
                }
                Some(text) => match try_normalize(text) {
                    Some(available) => {
                        let month_index = start.months_until(available);
                        if month_index <= 0 {
                            initial_principal += asset.amount;
                        } else {
                            cashflows.push(CashflowEvent::new(month_index, asset.amount, &asset.id));
                        }
                    }
                    None => {
                        diagnostics.record(
                            AnomalyKind::SentinelDate,
                            "asset_schedule",
                            format!(
                                "asset {} has unreadable availability date {:?}; injected at month 0",
                                asset.id, text
                            ),
                        );
                        cashflows.push(CashflowEvent::new(0, asset.amount, &asset.id));
                    }
                },
                None => cashflows.push(CashflowEvent::new(0, asset.amount, &asset.id)),
            }

            if let Some(text) = asset.end_date.as_deref().filter(|text| !text.trim().is_empty()) {
                match try_normalize(text) {
                    Some(end) => {
                        let month_index = start.months_until(end);
                        // Only a position with principal can be sold
                        if asset.amount > 0.0 && month_index > 0 && month_index <= i64::from(horizon_months) {
                            exits.push(ExitEvent {
                                month_index,
                                asset_id: asset.id.clone(),
                                principal: asset.amount,
                            });
                        }
                    }
                    None => diagnostics.record(
                        AnomalyKind::SentinelDate,
                        "asset_schedule",
                        format!("asset {} has unreadable end date {:?}; no exit", asset.id, text),
                    ),
                }
            }
        }

        cashflows.sort_by_key(|event| event.month_index);
        exits.sort_by_key(|exit| exit.month_index);

        Self {
            start,
            initial_principal,
            cashflows,
            exits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str, amount: f64, availability: Option<&str>, end: Option<&str>) -> InvestedAsset {
        InvestedAsset {
            id: id.to_string(),
            amount,
            availability_date: availability.map(str::to_string),
            end_date: end.map(str::to_string),
        }
    }

    fn start() -> MonthAnchor {
        MonthAnchor::new(2026, 1).unwrap()
    }

    #[test]
    fn test_available_at_start_is_initial_principal() {
        let mut diagnostics = Diagnostics::new();
        let assets = vec![
            asset("pillar3a", 100_000.0, Some("2026-01-01"), None),
            asset("brokerage", 20_000.0, Some("2019-06-30"), None),
            asset("cash", 5_000.0, Some("immediate"), None),
        ];
        let schedule = AssetSchedule::derive(&assets, start(), 420, &mut diagnostics);

        assert_eq!(schedule.initial_principal, 125_000.0);
        assert!(schedule.cashflows.is_empty());
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn test_future_availability_becomes_injection() {
        let mut diagnostics = Diagnostics::new();
        let assets = vec![
            asset("pension", 45_000.0, Some("2050-01-01"), None),
            asset("bonus", 10_000.0, Some("15.03.2027"), None),
        ];
        let schedule = AssetSchedule::derive(&assets, start(), 420, &mut diagnostics);

        assert_eq!(schedule.initial_principal, 0.0);
        assert_eq!(
            schedule.cashflows,
            vec![
                CashflowEvent::new(14, 10_000.0, "bonus"),
                CashflowEvent::new(288, 45_000.0, "pension"),
            ]
        );
    }

    #[test]
    fn test_missing_or_unreadable_date_injects_at_month_zero() {
        let mut diagnostics = Diagnostics::new();
        let assets = vec![
            asset("undated", 7_000.0, None, None),
            asset("garbled", 3_000.0, Some("someday"), None),
        ];
        let schedule = AssetSchedule::derive(&assets, start(), 420, &mut diagnostics);

        assert_eq!(schedule.initial_principal, 0.0);
        assert!(schedule.cashflows.iter().all(|event| event.month_index == 0));
        assert_eq!(schedule.cashflows.len(), 2);
        assert_eq!(diagnostics.count(AnomalyKind::SentinelDate), 1);
    }

    #[test]
    fn test_end_date_inside_horizon_becomes_exit() {
        let mut diagnostics = Diagnostics::new();
        let assets = vec![
            asset("fund", 50_000.0, Some("2026-01"), Some("2032-01-01")),
            asset("late", 1_000.0, Some("2026-01"), Some("2090-01-01")),
            asset("empty", 0.0, Some("2026-01"), Some("2030-01-01")),
            asset("overdrawn", -2_000.0, Some("2026-01"), Some("2031-01-01")),
        ];
        let schedule = AssetSchedule::derive(&assets, start(), 420, &mut diagnostics);

        assert_eq!(
            schedule.exits,
            vec![ExitEvent {
                month_index: 72,
                asset_id: "fund".to_string(),
                principal: 50_000.0,
            }]
        );
    }
}
