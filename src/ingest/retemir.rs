/// Regional sensor-station network (rt-data) client.
///
/// The feed is a JSON array with one object per station:
///
/// ```json
/// { "nome": "Misa", "codice": 611, "lastUpdateTime": "17/10/2026 10:20",
///   "analog": [ { "tipoSens": 100, "descr": "Livello Idrometrico",
///                 "valore": "1.23", "unmis": "m", "trend": -0.01 } ] }
/// ```
///
/// Field types drift between deployments (codes as strings, values as
/// numbers), so raw records keep loosely-typed fields and the normalizer does
/// the conversion.

use crate::config::MonitorConfig;
use crate::ingest::fetch::{DataFetcher, FetchRequest};
use crate::logging::{self, DataSource};
use crate::model::{FetchError, NumericField, Reading, SensorKind};
use crate::stations::StationRegistry;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Feed Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RawStation {
    #[serde(rename = "nome", default)]
    pub name: Option<String>,
    #[serde(rename = "codice", default)]
    pub code: Option<Value>,
    #[serde(rename = "lastUpdateTime", default)]
    pub last_update: Option<Value>,
    /// Kept as raw values so one bad sensor entry only drops itself.
    #[serde(rename = "analog", default)]
    pub sensors: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct RawSensor {
    #[serde(rename = "tipoSens", default)]
    pub kind: Option<Value>,
    #[serde(rename = "descr", default)]
    pub description: Option<Value>,
    #[serde(rename = "valore", default)]
    pub value: Option<Value>,
    #[serde(rename = "unmis", default)]
    pub unit: Option<Value>,
    #[serde(default)]
    pub trend: Option<Value>,
}

// ============================================================================
// Normalizer
// ============================================================================

/// Maps raw station records to canonical readings.
pub struct Normalizer<'a> {
    registry: &'a StationRegistry,
    config: &'a MonitorConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a StationRegistry, config: &'a MonitorConfig) -> Self {
        Normalizer { registry, config }
    }

    /// Normalize a whole feed payload.
    ///
    /// A payload that is not an array is a fetch failure. Individual records
    /// that cannot be read are logged and skipped; stations absent from the
    /// feed are simply absent from the output.
    pub fn normalize(&self, payload: Value) -> Result<Vec<Reading>, FetchError> {
        let Value::Array(records) = payload else {
            return Err(FetchError::UnexpectedShape(format!(
                "expected a JSON array of stations, got {}",
                json_kind(&payload)
            )));
        };

        let mut readings = Vec::new();
        let mut stations_found = 0usize;
        for record in records {
            let raw: RawStation = match serde_json::from_value(record) {
                Ok(raw) => raw,
                Err(e) => {
                    logging::warn(DataSource::Retemir, None, &format!("skipping malformed station record: {}", e));
                    continue;
                }
            };
            let before = readings.len();
            if self.normalize_station(raw, &mut readings) {
                stations_found += 1;
                logging::debug(
                    DataSource::Retemir,
                    None,
                    &format!("station produced {} readings", readings.len() - before),
                );
            }
        }

        if stations_found == 0 {
            logging::info(DataSource::Retemir, None, "no monitored station found in the feed");
        } else {
            logging::info(
                DataSource::Retemir,
                None,
                &format!(
                    "{} of {} monitored stations present, {} readings",
                    stations_found,
                    self.registry.monitored_names().len(),
                    readings.len()
                ),
            );
        }
        Ok(readings)
    }

    /// Appends the readings of one station. Returns whether the station is
    /// monitored.
    fn normalize_station(&self, raw: RawStation, out: &mut Vec<Reading>) -> bool {
        let raw_name = raw.name.as_deref().unwrap_or("N/A");
        let code = raw.code.as_ref().and_then(code_as_i64);
        let Some(station_name) = self.registry.resolve_station(raw_name, code) else {
            return false;
        };

        let basin = self.registry.basin_for(&station_name).to_string();
        let last_update = raw
            .last_update
            .as_ref()
            .map(display_text)
            .unwrap_or_else(|| "N/A".to_string());

        let sensors = raw.sensors.unwrap_or_default();
        if sensors.is_empty() {
            logging::debug(DataSource::Retemir, Some(&station_name), "no sensors in feed record");
            return true;
        }

        let retemir = &self.config.retemir;
        for entry in sensors {
            let sensor: RawSensor = match serde_json::from_value(entry) {
                Ok(sensor) => sensor,
                Err(e) => {
                    logging::warn(
                        DataSource::Retemir,
                        Some(&station_name),
                        &format!("skipping malformed sensor entry: {}", e),
                    );
                    continue;
                }
            };
            let Some(kind) = sensor.kind.as_ref().and_then(kind_from_json) else {
                logging::debug(DataSource::Retemir, Some(&station_name), "sensor entry without tipoSens");
                continue;
            };
            if let Some(filter) = &retemir.sensor_kinds {
                if !filter.contains(&kind) {
                    continue;
                }
            }

            let description = sensor
                .description
                .as_ref()
                .and_then(optional_text)
                .unwrap_or_else(|| self.config.describe_sensor(&kind));

            let trend_raw = retemir
                .trend_kinds
                .contains(&kind)
                .then(|| NumericField::from_json(sensor.trend.as_ref()));

            out.push(Reading {
                station_name: station_name.clone(),
                basin: basin.clone(),
                description,
                value: NumericField::from_json(sensor.value.as_ref()),
                unit: sensor.unit.as_ref().and_then(optional_text).unwrap_or_default(),
                last_update: last_update.clone(),
                trend_raw,
                sensor_kind: kind,
            });
        }
        true
    }
}

/// Fetch and normalize the station feed.
pub fn fetch_readings(
    fetcher: &dyn DataFetcher,
    registry: &StationRegistry,
    config: &MonitorConfig,
) -> Result<Vec<Reading>, FetchError> {
    logging::info(
        DataSource::Retemir,
        None,
        &format!("requesting station data from {}", config.retemir.url),
    );
    let payload = fetcher.fetch_json(&FetchRequest::get(config.retemir.url.clone()))?;
    Normalizer::new(registry, config).normalize(payload)
}

// ============================================================================
// Field helpers
// ============================================================================

fn code_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind_from_json(value: &Value) -> Option<SensorKind> {
    match value {
        Value::Number(n) => n.as_i64().map(SensorKind::from_code),
        Value::String(s) if !s.trim().is_empty() => Some(SensorKind::new(s.trim())),
        _ => None,
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

/// Text of a descriptive field; numbers are printed, blanks and null are absent.
fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|t| !t.is_empty()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (StationRegistry, MonitorConfig) {
        let cfg = MonitorConfig::embedded_default().unwrap();
        (StationRegistry::from_config(&cfg.retemir), cfg)
    }

    #[test]
    fn test_unmonitored_stations_are_dropped() {
        let (reg, cfg) = setup();
        let payload = json!([
            { "nome": "Ancona", "codice": 1, "analog": [ { "tipoSens": 0, "valore": "3" } ] }
        ]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn test_one_reading_per_sensor_entry() {
        let (reg, cfg) = setup();
        let payload = json!([{
            "nome": "Misa ", "codice": 611, "lastUpdateTime": "17/10/2026 10:20",
            "analog": [
                { "tipoSens": 0, "descr": " Pioggia ", "valore": "12.4", "unmis": "mm " },
                { "tipoSens": 100, "valore": "1.80", "unmis": "m", "trend": 0.03 }
            ]
        }]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings.len(), 2);

        assert_eq!(readings[0].station_name, "Misa");
        assert_eq!(readings[0].basin, "Misa");
        assert_eq!(readings[0].description, "Pioggia");
        assert_eq!(readings[0].unit, "mm");
        assert_eq!(readings[0].value, NumericField::Value(12.4));
        assert_eq!(readings[0].trend_raw, None);
        assert_eq!(readings[0].last_update, "17/10/2026 10:20");

        // Description falls back to the configured catalog.
        assert_eq!(readings[1].description, "Livello Idrometrico");
        assert_eq!(readings[1].trend_raw, Some(NumericField::Value(0.03)));
    }

    #[test]
    fn test_trend_kind_without_trend_field_is_missing_not_none() {
        let (reg, cfg) = setup();
        let payload = json!([{ "nome": "Nevola", "codice": 5,
            "analog": [ { "tipoSens": 100, "valore": "0.9" } ] }]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings[0].trend_raw, Some(NumericField::Missing));
    }

    #[test]
    fn test_duplicate_name_accepted_only_with_pinned_code() {
        let (reg, cfg) = setup();
        let payload = json!([
            { "nome": "Arcevia", "codice": 611, "analog": [ { "tipoSens": 0, "valore": "99" } ] },
            { "nome": "Arcevia", "codice": "732", "analog": [ { "tipoSens": 0, "valore": "1" } ] }
        ]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, NumericField::Value(1.0));
    }

    #[test]
    fn test_empty_or_missing_sensor_list_is_not_an_error() {
        let (reg, cfg) = setup();
        let payload = json!([
            { "nome": "Misa", "codice": 1, "analog": [] },
            { "nome": "Nevola", "codice": 2 }
        ]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn test_non_array_payload_is_unexpected_shape() {
        let (reg, cfg) = setup();
        let err = Normalizer::new(&reg, &cfg)
            .normalize(json!({ "error": "maintenance" }))
            .unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedShape(_)));
    }

    #[test]
    fn test_malformed_record_does_not_abort_siblings() {
        let (reg, cfg) = setup();
        let payload = json!([
            "not an object",
            { "nome": "Misa", "codice": 1, "analog": [ { "tipoSens": 0, "valore": "abc" } ] }
        ]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, NumericField::Invalid("abc".to_string()));
    }

    #[test]
    fn test_bad_sensor_entry_does_not_drop_station() {
        let (reg, cfg) = setup();
        let payload = json!([{ "nome": "Misa", "codice": 1, "analog": [
            { "tipoSens": 100, "valore": "2.5", "unmis": "m" },
            { "tipoSens": 0, "valore": "3", "unmis": 7 },
            { "tipoSens": 1, "valore": "0.1", "descr": ["broken"], "trend": 0 },
            "not a sensor"
        ] }]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].value, NumericField::Value(2.5));
        assert_eq!(readings[0].unit, "m");
        // Odd field types are shown as-is rather than dropping the sensor.
        assert_eq!(readings[1].unit, "7");
        assert_eq!(readings[1].value, NumericField::Value(3.0));
        assert_eq!(readings[2].description, "[\"broken\"]");
    }

    #[test]
    fn test_sensor_kind_filter() {
        let (reg, mut cfg) = setup();
        cfg.retemir.sensor_kinds = Some(vec![SensorKind::from_code(100)]);
        let payload = json!([{ "nome": "Misa", "codice": 1, "analog": [
            { "tipoSens": 0, "valore": "3" },
            { "tipoSens": 100, "valore": "1" }
        ] }]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].sensor_kind, SensorKind::from_code(100));
    }

    #[test]
    fn test_unmapped_extra_station_goes_to_catch_all() {
        let (_, mut cfg) = setup();
        cfg.retemir.extra_stations.push("Ostra".to_string());
        let reg = StationRegistry::from_config(&cfg.retemir);
        let payload = json!([{ "nome": "Ostra", "codice": 9, "analog": [ { "tipoSens": 0, "valore": "3" } ] }]);
        let readings = Normalizer::new(&reg, &cfg).normalize(payload).unwrap();
        assert_eq!(readings[0].basin, "Other basins");
    }
}
