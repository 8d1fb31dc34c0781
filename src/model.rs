//! Core data types for the basin monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! readings, threshold rules, alerts, trend symbols and the error types of the
//! two external collaborators (data fetcher and notifier). It contains no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Sensor kinds
// ---------------------------------------------------------------------------

/// Identifier of the measured quantity.
///
/// The regional station network reports small integer codes (`tipoSens`)
/// while the WeatherLink API reports field names such as `wind_speed`. Both
/// are carried in textual form so that one threshold-table shape (and one
/// TOML layout, where map keys are strings anyway) serves every feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorKind(String);

impl SensorKind {
    pub fn new(id: impl Into<String>) -> Self {
        SensorKind(id.into())
    }

    /// Kind for a numeric `tipoSens` code from the regional network.
    pub fn from_code(code: i64) -> Self {
        SensorKind(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorKind {
    fn from(id: &str) -> Self {
        SensorKind::new(id)
    }
}

/// Primary hydrometric level, m.
pub const KIND_HYDRO_LEVEL: &str = "100";

/// Secondary hydrometric level, m.
pub const KIND_HYDRO_LEVEL_2: &str = "101";

// ---------------------------------------------------------------------------
// Numeric fields
// ---------------------------------------------------------------------------

/// Outcome of parsing a numeric field from a feed.
///
/// Feeds deliver numbers as JSON numbers, as strings, as empty strings or as
/// the literal `"nan"`. Parsing never fails: the three cases are kept apart so
/// the evaluator can skip missing values silently and flag garbage.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericField {
    /// Absent, null, empty, or `nan`.
    Missing,
    Value(f64),
    /// Present but not a finite number; carries the raw text for display.
    Invalid(String),
}

impl NumericField {
    /// Parses the textual form of a value.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(text) = raw.map(str::trim) else {
            return NumericField::Missing;
        };
        if text.is_empty() || text.eq_ignore_ascii_case("nan") {
            return NumericField::Missing;
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => NumericField::Value(v),
            _ => NumericField::Invalid(text.to_string()),
        }
    }

    /// Parses a JSON value that may be a number, a numeric string, or null.
    pub fn from_json(raw: Option<&serde_json::Value>) -> Self {
        match raw {
            None | Some(serde_json::Value::Null) => NumericField::Missing,
            Some(serde_json::Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => NumericField::Value(v),
                _ => NumericField::Invalid(n.to_string()),
            },
            Some(serde_json::Value::String(s)) => NumericField::parse(Some(s)),
            Some(other) => NumericField::Invalid(other.to_string()),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            NumericField::Value(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single sensor observation, normalized from any feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Canonical station name (after code disambiguation).
    pub station_name: String,
    /// Basin the station belongs to, or the catch-all group.
    pub basin: String,
    pub sensor_kind: SensorKind,
    /// Human-readable sensor description.
    pub description: String,
    pub value: NumericField,
    pub unit: String,
    /// Passed through unparsed, e.g. "17/10/2026 10:20".
    pub last_update: String,
    /// Raw trend delta; `Some` only for trend-bearing sensor kinds.
    pub trend_raw: Option<NumericField>,
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Where an applied threshold came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    StationSpecific,
    Generic,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::StationSpecific => write!(f, "station-specific"),
            Provenance::Generic => write!(f, "generic"),
        }
    }
}

/// A resolved numeric limit plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRule {
    pub limit: f64,
    pub provenance: Provenance,
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Short-term direction of a hydrometric reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendSymbol {
    Rising,
    Falling,
    Stable,
    /// The feed carried a trend that could not be read as a number.
    Unknown,
}

impl TrendSymbol {
    /// Glyph used in rendered reports.
    pub fn glyph(&self) -> &'static str {
        match self {
            TrendSymbol::Rising => "📈",
            TrendSymbol::Falling => "📉",
            TrendSymbol::Stable => "➡️",
            TrendSymbol::Unknown => "❓",
        }
    }
}

impl fmt::Display for TrendSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendSymbol::Rising => write!(f, "rising"),
            TrendSymbol::Falling => write!(f, "falling"),
            TrendSymbol::Stable => write!(f, "stable"),
            TrendSymbol::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Alert types
// ---------------------------------------------------------------------------

/// A threshold exceedance. Built once by the evaluator and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub station_name: String,
    pub basin: String,
    pub sensor_kind: SensorKind,
    pub description: String,
    pub value: f64,
    pub unit: String,
    pub threshold: ThresholdRule,
    pub trend: Option<TrendSymbol>,
    pub last_update: String,
}

/// A reading with a resolved threshold, listed in full reports whether or
/// not it exceeds.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentValue {
    pub reading: Reading,
    pub threshold: ThresholdRule,
    pub trend: Option<TrendSymbol>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the data fetcher. Every variant maps to the
/// `FetchFailed` dispatch state; none of them aborts the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("timeout requesting {url}")]
    Timeout { url: String },
    #[error("connection error requesting {url}: {message}")]
    Connect { url: String, message: String },
    #[error("HTTP error {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("invalid JSON from {url}: {message}")]
    InvalidJson { url: String, message: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    /// Well-formed JSON that does not have the expected top-level shape.
    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),
}

/// Errors surfaced by the notifier. Logged by the caller, never escalated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotifyError {
    #[error("notifier credentials are missing")]
    MissingCredentials,
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("message rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
