/// WeatherLink v2 API client.
///
/// Retrieves current conditions for personal weather stations registered on
/// weatherlink.com. Every request is signed: the API expects `api-key`, a
/// unix timestamp `t`, and `api-signature`, the hex HMAC-SHA256 of the sorted
/// parameter name/value pairs keyed with the API secret.
///
/// API Documentation: https://weatherlink.github.io/v2-api/

use crate::alert::thresholds::ThresholdTables;
use crate::config::{WeatherLinkConfig, WeatherLinkCredentials, WeatherLinkStation};
use crate::ingest::fetch::{DataFetcher, FetchRequest};
use crate::logging::{self, DataSource};
use crate::model::{FetchError, NumericField, Reading, SensorKind};
use chrono::{Local, TimeZone};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Request signing
// ============================================================================

/// Hex signature over `api-key<key>t<timestamp>`.
pub fn api_signature(api_key: &str, api_secret: &str, timestamp: i64) -> Result<String, FetchError> {
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes()).map_err(|e| FetchError::Request {
        url: String::new(),
        message: format!("cannot key request signature: {}", e),
    })?;
    mac.update(format!("api-key{}t{}", api_key, timestamp).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Signed request for a station's current conditions.
pub fn current_conditions_request(
    base_url: &str,
    station_id: &str,
    credentials: &WeatherLinkCredentials,
    timestamp: i64,
) -> Result<FetchRequest, FetchError> {
    let signature = api_signature(&credentials.api_key, &credentials.api_secret, timestamp)?;
    Ok(FetchRequest::get(format!("{}/current/{}", base_url.trim_end_matches('/'), station_id))
        .query("api-key", credentials.api_key.clone())
        .query("t", timestamp.to_string())
        .query("api-signature", signature)
        .header("X-Api-Secret", credentials.api_secret.clone()))
}

// ============================================================================
// Normalizer
// ============================================================================

/// Turns a field name such as `wind_gust_10_min` into `Wind Gust 10 Min`.
pub fn metric_label(metric: &str) -> String {
    metric
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Extract one reading per monitored metric from a current-conditions payload.
///
/// Values come from the first data record of the first sensor block.
pub fn normalize_current(
    payload: &Value,
    station: &WeatherLinkStation,
    tables: &ThresholdTables,
    group: &str,
) -> Result<Vec<Reading>, FetchError> {
    let data = payload
        .get("sensors")
        .and_then(Value::as_array)
        .and_then(|sensors| sensors.first())
        .ok_or_else(|| FetchError::UnexpectedShape(format!("no 'sensors' block for {}", station.name)))?
        .get("data")
        .and_then(Value::as_array)
        .and_then(|records| records.first())
        .ok_or_else(|| FetchError::UnexpectedShape(format!("no 'data' block for {}", station.name)))?;

    let last_update = data
        .get("ts")
        .and_then(Value::as_i64)
        .and_then(|ts| Local.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let readings = tables
        .kinds_for(&station.name)
        .into_iter()
        .map(|metric| Reading {
            station_name: station.name.clone(),
            basin: group.to_string(),
            description: metric_label(metric.as_str()),
            value: NumericField::from_json(data.get(metric.as_str())),
            unit: String::new(),
            last_update: last_update.clone(),
            trend_raw: None,
            sensor_kind: metric,
        })
        .collect();
    Ok(readings)
}

/// Fetch every configured station.
///
/// A failing station is logged and skipped. Returns the readings of the
/// stations that answered, or the last error when none did.
pub fn fetch_all_readings(
    fetcher: &dyn DataFetcher,
    config: &WeatherLinkConfig,
    credentials: &WeatherLinkCredentials,
    timestamp: i64,
) -> Result<Vec<Reading>, FetchError> {
    let mut readings = Vec::new();
    let mut last_error = None;
    let mut answered = 0usize;

    for station in &config.stations {
        let result = current_conditions_request(&config.base_url, &station.id, credentials, timestamp)
            .and_then(|request| fetcher.fetch_json(&request))
            .and_then(|payload| normalize_current(&payload, station, &config.thresholds, &config.group));

        match result {
            Ok(mut station_readings) => {
                answered += 1;
                logging::info(
                    DataSource::WeatherLink,
                    Some(&station.name),
                    &format!("received {} monitored values", station_readings.len()),
                );
                readings.append(&mut station_readings);
            }
            Err(e) => {
                logging::log_fetch_failure(DataSource::WeatherLink, Some(&station.name), "current conditions", &e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if answered == 0 => Err(e),
        _ => Ok(readings),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds() -> WeatherLinkCredentials {
        WeatherLinkCredentials {
            api_key: "key-abc".to_string(),
            api_secret: "secret-xyz".to_string(),
        }
    }

    fn station() -> WeatherLinkStation {
        WeatherLinkStation {
            id: "177386".to_string(),
            name: "Montignano".to_string(),
        }
    }

    fn tables() -> ThresholdTables {
        let mut t = ThresholdTables::default();
        t.generic.insert(SensorKind::new("wind_speed"), 40.0);
        t.generic.insert(SensorKind::new("rain_day_mm"), 25.0);
        t
    }

    #[test]
    fn test_signature_matches_reference_hmac() {
        let sig = api_signature("key-abc", "secret-xyz", 1_700_000_000).unwrap();
        assert_eq!(sig, "6d5629947d98f69eb04adcf3c9a1fac04d65845c44188beaa6067d964120d7ae");
    }

    #[test]
    fn test_request_carries_signed_params() {
        let req = current_conditions_request("https://api.weatherlink.com/v2/", "177386", &creds(), 1_700_000_000)
            .unwrap();
        assert_eq!(req.url, "https://api.weatherlink.com/v2/current/177386");
        let keys: Vec<&str> = req.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["api-key", "t", "api-signature"]);
        assert_eq!(req.headers[0].0, "X-Api-Secret");
    }

    #[test]
    fn test_metric_label() {
        assert_eq!(metric_label("wind_gust_10_min"), "Wind Gust 10 Min");
        assert_eq!(metric_label("rain_rate_mm"), "Rain Rate Mm");
    }

    #[test]
    fn test_normalize_reads_first_data_record() {
        let payload = json!({
            "sensors": [ { "data": [ { "ts": 1700000000, "wind_speed": 42.0, "rain_day_mm": "3.2" } ] } ]
        });
        let readings = normalize_current(&payload, &station(), &tables(), "WeatherLink").unwrap();
        assert_eq!(readings.len(), 2);
        let wind = readings.iter().find(|r| r.sensor_kind.as_str() == "wind_speed").unwrap();
        assert_eq!(wind.value, NumericField::Value(42.0));
        assert_eq!(wind.description, "Wind Speed");
        assert_eq!(wind.basin, "WeatherLink");
        let rain = readings.iter().find(|r| r.sensor_kind.as_str() == "rain_day_mm").unwrap();
        assert_eq!(rain.value, NumericField::Value(3.2));
    }

    #[test]
    fn test_normalize_missing_metric_is_missing_value() {
        let payload = json!({ "sensors": [ { "data": [ { "wind_speed": null } ] } ] });
        let readings = normalize_current(&payload, &station(), &tables(), "WeatherLink").unwrap();
        assert!(readings.iter().all(|r| r.value == NumericField::Missing));
        assert!(readings.iter().all(|r| r.last_update == "N/A"));
    }

    #[test]
    fn test_normalize_without_sensors_is_unexpected_shape() {
        let payload = json!({ "sensors": [] });
        assert!(matches!(
            normalize_current(&payload, &station(), &tables(), "WeatherLink"),
            Err(FetchError::UnexpectedShape(_))
        ));
    }
}
