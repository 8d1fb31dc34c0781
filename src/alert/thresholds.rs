//! Threshold resolution and exceedance checking.
//!
//! Thresholds come from two static tables: per-station overrides keyed by
//! `(station, sensor kind)` and generic limits keyed by sensor kind. A
//! station override always wins; a kind absent from both tables is simply
//! not monitored (never "threshold zero").

use crate::alert::trend;
use crate::logging::{self, DataSource};
use crate::model::{
    Alert, CurrentValue, NumericField, Provenance, Reading, SensorKind, ThresholdRule, TrendSymbol,
};
use serde::Deserialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Threshold tables
// ---------------------------------------------------------------------------

/// The two threshold tables, as loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdTables {
    /// Limits that apply to every station reporting a sensor kind.
    #[serde(default)]
    pub generic: BTreeMap<SensorKind, f64>,
    /// Station name -> sensor kind -> limit.
    #[serde(default)]
    pub stations: BTreeMap<String, BTreeMap<SensorKind, f64>>,
}

impl ThresholdTables {
    /// Resolves the limit for a station/sensor pair.
    ///
    /// Returns `None` when neither table has an entry; the reading is then
    /// excluded from alerting.
    pub fn resolve(&self, station: &str, kind: &SensorKind) -> Option<ThresholdRule> {
        if let Some(limit) = self.stations.get(station).and_then(|t| t.get(kind)) {
            return Some(ThresholdRule {
                limit: *limit,
                provenance: Provenance::StationSpecific,
            });
        }
        self.generic.get(kind).map(|limit| ThresholdRule {
            limit: *limit,
            provenance: Provenance::Generic,
        })
    }

    /// Every sensor kind with a limit for `station`, generic kinds first.
    pub fn kinds_for(&self, station: &str) -> Vec<SensorKind> {
        let mut kinds: Vec<SensorKind> = self.generic.keys().cloned().collect();
        if let Some(overrides) = self.stations.get(station) {
            for kind in overrides.keys() {
                if !kinds.contains(kind) {
                    kinds.push(kind.clone());
                }
            }
        }
        kinds
    }

    /// Iterate over every configured limit, for validation.
    pub fn all_limits(&self) -> impl Iterator<Item = f64> + '_ {
        self.generic
            .values()
            .chain(self.stations.values().flat_map(|t| t.values()))
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Which operator counts as "exceeded" for a data source.
///
/// The station network alerts strictly above the limit; the WeatherLink
/// check alerts at the limit too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `value > limit`
    Above,
    /// `value >= limit`
    AtOrAbove,
}

impl Comparison {
    pub fn exceeds(&self, value: f64, limit: f64) -> bool {
        match self {
            Comparison::Above => value > limit,
            Comparison::AtOrAbove => value >= limit,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Above => ">",
            Comparison::AtOrAbove => ">=",
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Checks one reading against its resolved rule.
///
/// Returns `None` below the limit and for missing or non-numeric values.
pub fn check_reading(
    reading: &Reading,
    rule: &ThresholdRule,
    comparison: Comparison,
    trend: Option<TrendSymbol>,
) -> Option<Alert> {
    let value = reading.value.value()?;
    if !comparison.exceeds(value, rule.limit) {
        return None;
    }
    Some(Alert {
        station_name: reading.station_name.clone(),
        basin: reading.basin.clone(),
        sensor_kind: reading.sensor_kind.clone(),
        description: reading.description.clone(),
        value,
        unit: reading.unit.clone(),
        threshold: *rule,
        trend,
        last_update: reading.last_update.clone(),
    })
}

/// Result of evaluating every reading of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Total readings considered.
    pub readings: usize,
    pub alerts: Vec<Alert>,
    /// Every reading that had a threshold, exceeded or not.
    pub current: Vec<CurrentValue>,
}

impl Evaluation {
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }
}

/// Resolves, classifies and checks every reading.
pub fn evaluate_all(
    readings: &[Reading],
    tables: &ThresholdTables,
    comparison: Comparison,
    source: DataSource,
) -> Evaluation {
    let mut evaluation = Evaluation {
        readings: readings.len(),
        ..Evaluation::default()
    };

    for reading in readings {
        let Some(rule) = tables.resolve(&reading.station_name, &reading.sensor_kind) else {
            continue;
        };

        let trend = match &reading.value {
            NumericField::Value(_) => trend::trend_for(reading),
            NumericField::Missing => {
                logging::debug(
                    source,
                    Some(&reading.station_name),
                    &format!("no value for sensor {} ({})", reading.sensor_kind, reading.description),
                );
                None
            }
            NumericField::Invalid(raw) => {
                logging::warn(
                    source,
                    Some(&reading.station_name),
                    &format!(
                        "non-numeric value '{}' for sensor {} ({})",
                        raw, reading.sensor_kind, reading.description
                    ),
                );
                None
            }
        };

        if let Some(alert) = check_reading(reading, &rule, comparison, trend) {
            logging::warn(
                source,
                Some(&alert.station_name),
                &format!(
                    "threshold exceeded ({}): basin {} - {} = {} {} {}",
                    rule.provenance,
                    alert.basin,
                    alert.description,
                    alert.value,
                    comparison.symbol(),
                    rule.limit
                ),
            );
            evaluation.alerts.push(alert);
        }

        evaluation.current.push(CurrentValue {
            reading: reading.clone(),
            threshold: rule,
            trend,
        });
    }

    evaluation
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ThresholdTables {
        let mut tables = ThresholdTables::default();
        tables.generic.insert(SensorKind::from_code(0), 15.0);
        tables.generic.insert(SensorKind::from_code(1), 0.25);
        tables
            .stations
            .entry("Misa".to_string())
            .or_default()
            .insert(SensorKind::from_code(100), 2.0);
        tables
            .stations
            .entry("Nevola".to_string())
            .or_default()
            .insert(SensorKind::from_code(1), 0.30);
        tables
    }

    fn reading(station: &str, kind: i64, value: NumericField) -> Reading {
        Reading {
            station_name: station.to_string(),
            basin: "Misa".to_string(),
            sensor_kind: SensorKind::from_code(kind),
            description: format!("Sensor {}", kind),
            value,
            unit: "m".to_string(),
            last_update: "17/10/2026 10:20".to_string(),
            trend_raw: None,
        }
    }

    // --- Resolution ---------------------------------------------------------

    #[test]
    fn test_station_override_wins_over_generic() {
        let rule = tables().resolve("Nevola", &SensorKind::from_code(1)).unwrap();
        assert_eq!(rule.limit, 0.30);
        assert_eq!(rule.provenance, Provenance::StationSpecific);
    }

    #[test]
    fn test_generic_applies_without_override() {
        let rule = tables().resolve("Misa", &SensorKind::from_code(1)).unwrap();
        assert_eq!(rule.limit, 0.25);
        assert_eq!(rule.provenance, Provenance::Generic);
    }

    #[test]
    fn test_absent_from_both_tables_is_unmonitored() {
        assert_eq!(tables().resolve("Barbara", &SensorKind::from_code(100)), None);
        assert_eq!(tables().resolve("Misa", &SensorKind::from_code(5)), None);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let t = tables();
        let kind = SensorKind::from_code(100);
        assert_eq!(t.resolve("Misa", &kind), t.resolve("Misa", &kind));
    }

    #[test]
    fn test_kinds_for_merges_generic_and_overrides() {
        let kinds = tables().kinds_for("Misa");
        assert_eq!(
            kinds,
            vec![SensorKind::from_code(0), SensorKind::from_code(1), SensorKind::from_code(100)]
        );
    }

    // --- Comparison ---------------------------------------------------------

    #[test]
    fn test_strict_comparison_at_limit_does_not_fire() {
        assert!(!Comparison::Above.exceeds(2.0, 2.0));
        assert!(Comparison::Above.exceeds(2.01, 2.0));
    }

    #[test]
    fn test_inclusive_comparison_at_limit_fires() {
        assert!(Comparison::AtOrAbove.exceeds(40.0, 40.0));
        assert!(!Comparison::AtOrAbove.exceeds(39.9, 40.0));
    }

    // --- Evaluation ---------------------------------------------------------

    #[test]
    fn test_value_above_limit_produces_exactly_one_alert() {
        let readings = vec![reading("Misa", 100, NumericField::Value(2.5))];
        let eval = evaluate_all(&readings, &tables(), Comparison::Above, DataSource::Retemir);
        assert_eq!(eval.alerts.len(), 1);
        assert_eq!(eval.alerts[0].threshold.provenance, Provenance::StationSpecific);
        assert_eq!(eval.alerts[0].value, 2.5);
    }

    #[test]
    fn test_value_at_or_below_limit_produces_no_alert() {
        let readings = vec![
            reading("Misa", 100, NumericField::Value(2.0)),
            reading("Misa", 100, NumericField::Value(1.1)),
        ];
        let eval = evaluate_all(&readings, &tables(), Comparison::Above, DataSource::Retemir);
        assert!(eval.alerts.is_empty());
        assert_eq!(eval.current.len(), 2);
    }

    #[test]
    fn test_missing_and_invalid_values_never_alert_but_are_listed() {
        let readings = vec![
            reading("Misa", 100, NumericField::Missing),
            reading("Misa", 100, NumericField::Invalid("err".to_string())),
        ];
        let eval = evaluate_all(&readings, &tables(), Comparison::Above, DataSource::Retemir);
        assert!(eval.alerts.is_empty());
        assert_eq!(eval.current.len(), 2);
        assert!(eval.current.iter().all(|c| c.trend.is_none()));
    }

    #[test]
    fn test_unmonitored_readings_are_not_listed() {
        let readings = vec![reading("Barbara", 100, NumericField::Value(9.0))];
        let eval = evaluate_all(&readings, &tables(), Comparison::Above, DataSource::Retemir);
        assert_eq!(eval.readings, 1);
        assert!(eval.current.is_empty());
        assert!(!eval.has_alerts());
    }

    #[test]
    fn test_trend_is_carried_into_alert() {
        let mut r = reading("Misa", 100, NumericField::Value(3.0));
        r.trend_raw = Some(NumericField::Value(0.02));
        let eval = evaluate_all(&[r], &tables(), Comparison::Above, DataSource::Retemir);
        assert_eq!(eval.alerts[0].trend, Some(TrendSymbol::Rising));
        assert_eq!(eval.current[0].trend, Some(TrendSymbol::Rising));
    }
}
