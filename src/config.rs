//! Configuration loading.
//!
//! Two inputs, both read once per run and immutable afterwards:
//! - the monitoring configuration, a TOML document (embedded default, or the
//!   file named by `BASIN_WATCH_CONFIG`);
//! - credentials from the environment, after loading an optional `.env`.
//!
//! Any error here is fatal and happens before the first network call.

use crate::alert::thresholds::ThresholdTables;
use crate::model::{KIND_HYDRO_LEVEL, KIND_HYDRO_LEVEL_2, SensorKind};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "BASIN_WATCH_CONFIG";

pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ENV: &str = "TELEGRAM_CHAT_ID";
pub const WEATHERLINK_KEY_ENV: &str = "WEATHERLINK_API_KEY";
pub const WEATHERLINK_SECRET_ENV: &str = "WEATHERLINK_API_SECRET";

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Monitoring configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub telegram: TelegramConfig,
    /// Sensor kind -> description, used when the feed has none.
    #[serde(default)]
    pub sensors: BTreeMap<SensorKind, String>,
    pub retemir: RetemirConfig,
    pub allerta: AllertaConfig,
    pub weatherlink: WeatherLinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasinConfig {
    pub name: String,
    /// Stations in report order.
    pub stations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetemirConfig {
    pub url: String,
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_catch_all")]
    pub catch_all_basin: String,
    #[serde(default)]
    pub basins: Vec<BasinConfig>,
    /// Monitored stations without a basin; reported in the catch-all group.
    #[serde(default)]
    pub extra_stations: Vec<String>,
    #[serde(default)]
    pub station_codes: BTreeMap<String, i64>,
    /// When set, only these sensor kinds produce readings.
    #[serde(default)]
    pub sensor_kinds: Option<Vec<SensorKind>>,
    /// Kinds whose feed entries carry a trend delta; the two hydrometric
    /// levels unless configured.
    #[serde(default = "default_trend_kinds")]
    pub trend_kinds: Vec<SensorKind>,
    #[serde(default)]
    pub thresholds: ThresholdTables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDay {
    Today,
    Tomorrow,
}

impl AlertDay {
    pub fn label(&self) -> &'static str {
        match self {
            AlertDay::Today => "TODAY",
            AlertDay::Tomorrow => "TOMORROW",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllertaConfig {
    pub url_today: String,
    pub url_tomorrow: String,
    #[serde(default = "default_alert_days")]
    pub days: Vec<AlertDay>,
    pub areas: Vec<String>,
    #[serde(default = "default_ignored_levels")]
    pub ignored_levels: Vec<String>,
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl AllertaConfig {
    pub fn url_for(&self, day: AlertDay) -> &str {
        match day {
            AlertDay::Today => &self.url_today,
            AlertDay::Tomorrow => &self.url_tomorrow,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherLinkStation {
    /// Numeric id or UUID, as issued by WeatherLink.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherLinkConfig {
    pub base_url: String,
    #[serde(default = "default_weatherlink_timeout")]
    pub timeout_secs: u64,
    /// Report group name for all WeatherLink stations.
    #[serde(default = "default_weatherlink_group")]
    pub group: String,
    #[serde(default)]
    pub stations: Vec<WeatherLinkStation>,
    /// Limits keyed by WeatherLink field name (e.g. `wind_speed`).
    #[serde(default)]
    pub thresholds: ThresholdTables,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}
fn default_telegram_timeout() -> u64 {
    20
}
fn default_max_message_len() -> usize {
    crate::report::DEFAULT_MAX_MESSAGE_LEN
}
fn default_parse_mode() -> String {
    "Markdown".to_string()
}
fn default_feed_timeout() -> u64 {
    45
}
fn default_weatherlink_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_trend_kinds() -> Vec<SensorKind> {
    vec![SensorKind::from(KIND_HYDRO_LEVEL), SensorKind::from(KIND_HYDRO_LEVEL_2)]
}
fn default_catch_all() -> String {
    "Other basins".to_string()
}
fn default_weatherlink_group() -> String {
    "WeatherLink".to_string()
}
fn default_alert_days() -> Vec<AlertDay> {
    vec![AlertDay::Tomorrow]
}
fn default_ignored_levels() -> Vec<String> {
    vec!["green".to_string(), "white".to_string()]
}

impl MonitorConfig {
    /// Load from `BASIN_WATCH_CONFIG` if set, otherwise the embedded default.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_path(Path::new(path.trim())),
            _ => Self::embedded_default(),
        }
    }

    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: MonitorConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Description for a sensor kind, falling back to `Sensor <kind>`.
    pub fn describe_sensor(&self, kind: &SensorKind) -> String {
        self.sensors
            .get(kind)
            .cloned()
            .unwrap_or_else(|| format!("Sensor {}", kind))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retemir;

        let mut seen = HashSet::new();
        for basin in &r.basins {
            if basin.name == r.catch_all_basin {
                return Err(ConfigError::Invalid(format!(
                    "basin '{}' collides with the catch-all group name",
                    basin.name
                )));
            }
            for station in &basin.stations {
                if !seen.insert(station.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "station '{}' is listed in more than one basin slot",
                        station
                    )));
                }
            }
        }

        for pinned in r.station_codes.keys() {
            if !seen.contains(pinned.as_str()) && !r.extra_stations.contains(pinned) {
                return Err(ConfigError::Invalid(format!(
                    "station code pinned for '{}', which is not monitored",
                    pinned
                )));
            }
        }

        let limits = r.thresholds.all_limits().chain(self.weatherlink.thresholds.all_limits());
        for limit in limits {
            if !limit.is_finite() {
                return Err(ConfigError::Invalid(format!("threshold {} is not finite", limit)));
            }
        }

        if self.telegram.max_message_len == 0 {
            return Err(ConfigError::Invalid("telegram.max_message_len must be positive".to_string()));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP settings
// ---------------------------------------------------------------------------

/// Client settings for one data source.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    pub user_agent: Option<String>,
}

impl RetemirConfig {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
            user_agent: Some(self.user_agent.clone()),
        }
    }
}

impl AllertaConfig {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
            user_agent: Some(self.user_agent.clone()),
        }
    }
}

impl WeatherLinkConfig {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: false,
            user_agent: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut values = read_required(&[TELEGRAM_TOKEN_ENV, TELEGRAM_CHAT_ENV])?.into_iter();
        match (values.next(), values.next()) {
            (Some(bot_token), Some(chat_id)) => Ok(TelegramCredentials { bot_token, chat_id }),
            _ => Err(ConfigError::MissingEnv(vec![
                TELEGRAM_TOKEN_ENV.to_string(),
                TELEGRAM_CHAT_ENV.to_string(),
            ])),
        }
    }
}

#[derive(Clone)]
pub struct WeatherLinkCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for WeatherLinkCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherLinkCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl WeatherLinkCredentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut values = read_required(&[WEATHERLINK_KEY_ENV, WEATHERLINK_SECRET_ENV])?.into_iter();
        match (values.next(), values.next()) {
            (Some(api_key), Some(api_secret)) => Ok(WeatherLinkCredentials { api_key, api_secret }),
            _ => Err(ConfigError::MissingEnv(vec![
                WEATHERLINK_KEY_ENV.to_string(),
                WEATHERLINK_SECRET_ENV.to_string(),
            ])),
        }
    }
}

/// Reads every named variable, reporting all missing or empty ones at once.
fn read_required(names: &[&str]) -> Result<Vec<String>, ConfigError> {
    read_required_with(names, |name| std::env::var(name).ok())
}

fn read_required_with(
    names: &[&str],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Vec<String>, ConfigError> {
    let mut values = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(v) => values.push(v.trim().to_string()),
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(values)
    } else {
        Err(ConfigError::MissingEnv(missing))
    }
}

/// Load `.env` if present. Missing file is not an error.
pub fn load_dotenv() {
    dotenv::dotenv().ok();
}

/// Everything a Telegram-backed binary needs before it touches the network.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub config: MonitorConfig,
    pub telegram: TelegramCredentials,
}

impl Runtime {
    /// Credentials first, then the monitoring configuration.
    pub fn load() -> Result<Self, ConfigError> {
        load_dotenv();
        let telegram = TelegramCredentials::from_env()?;
        let config = MonitorConfig::load()?;
        Ok(Runtime { config, telegram })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provenance;
    use std::io::Write;

    #[test]
    fn test_embedded_default_parses_and_validates() {
        let cfg = MonitorConfig::embedded_default().expect("default config must be valid");
        assert_eq!(cfg.telegram.max_message_len, 4096);
        assert_eq!(cfg.retemir.basins.len(), 3);
        assert_eq!(cfg.retemir.station_codes.get("Arcevia"), Some(&732));
        assert_eq!(cfg.allerta.days, vec![AlertDay::Tomorrow]);
        assert_eq!(cfg.weatherlink.stations.len(), 3);
    }

    #[test]
    fn test_default_thresholds_match_station_table() {
        let cfg = MonitorConfig::embedded_default().unwrap();
        let rule = cfg
            .retemir
            .thresholds
            .resolve("Serra dei Conti", &SensorKind::from_code(100))
            .unwrap();
        assert_eq!(rule.limit, 1.7);
        assert_eq!(rule.provenance, Provenance::StationSpecific);

        let rule = cfg
            .retemir
            .thresholds
            .resolve("Barbara", &SensorKind::from_code(0))
            .unwrap();
        assert_eq!(rule.limit, 15.0);
        assert_eq!(rule.provenance, Provenance::Generic);
    }

    #[test]
    fn test_describe_sensor_falls_back_to_kind() {
        let cfg = MonitorConfig::embedded_default().unwrap();
        assert_eq!(cfg.describe_sensor(&SensorKind::from_code(100)), "Livello Idrometrico");
        assert_eq!(cfg.describe_sensor(&SensorKind::from_code(999)), "Sensor 999");
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFAULT_CONFIG.as_bytes()).unwrap();
        let cfg = MonitorConfig::from_path(file.path()).expect("file config parses");
        assert_eq!(cfg.retemir.catch_all_basin, "Other basins");
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let err = MonitorConfig::from_path(Path::new("/nonexistent/basin_watch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_duplicate_station_is_rejected() {
        let text = DEFAULT_CONFIG.replace(
            "stations = [\"Cesano\", \"Foce Cesano\"]",
            "stations = [\"Cesano\", \"Misa\"]",
        );
        let err = MonitorConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {:?}", err);
    }

    #[test]
    fn test_trend_kinds_default_to_hydrometric_levels() {
        let text = DEFAULT_CONFIG.replace("trend_kinds = [\"100\", \"101\"]\n", "");
        let cfg = MonitorConfig::from_toml_str(&text).unwrap();
        assert_eq!(
            cfg.retemir.trend_kinds,
            vec![SensorKind::from(KIND_HYDRO_LEVEL), SensorKind::from(KIND_HYDRO_LEVEL_2)]
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let text = DEFAULT_CONFIG.replace("[telegram]", "[telegram]\nbogus = 1");
        assert!(matches!(
            MonitorConfig::from_toml_str(&text),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_missing_env_lists_every_name() {
        let err = read_required_with(&["A_TOKEN", "B_CHAT"], |_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required environment variables: A_TOKEN, B_CHAT"
        );
    }

    #[test]
    fn test_blank_env_counts_as_missing() {
        let err = read_required_with(&["A", "B"], |name| {
            Some(if name == "A" { "value".to_string() } else { "  ".to_string() })
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ref names) if names == &["B".to_string()]));
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = TelegramCredentials {
            bot_token: "123:secret".to_string(),
            chat_id: "-100".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
