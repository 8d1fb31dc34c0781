//! Trend classification for hydrometric levels.
//!
//! The station feed carries a signed short-term delta next to each level
//! reading. We reduce it to a symbol; a delta within `TREND_EPSILON` of zero
//! counts as stable so float jitter around 0.0 does not flap the report.

use crate::logging::{self, DataSource};
use crate::model::{NumericField, Reading, TrendSymbol};

pub const TREND_EPSILON: f64 = 1e-9;

/// Classify a numeric delta.
pub fn classify_delta(delta: f64) -> TrendSymbol {
    if delta > TREND_EPSILON {
        TrendSymbol::Rising
    } else if delta < -TREND_EPSILON {
        TrendSymbol::Falling
    } else {
        TrendSymbol::Stable
    }
}

/// Classify a raw trend field.
///
/// An absent trend reads as stable, not unknown: the feed omits the field
/// when the level has not moved. Only a present-but-garbled value is
/// `Unknown`.
pub fn classify(trend_raw: &NumericField) -> TrendSymbol {
    match trend_raw {
        NumericField::Value(delta) => classify_delta(*delta),
        NumericField::Missing => TrendSymbol::Stable,
        NumericField::Invalid(_) => TrendSymbol::Unknown,
    }
}

/// Trend for a reading, or `None` when the sensor kind carries no trend.
///
/// Unparseable deltas are logged as a data-quality issue.
pub fn trend_for(reading: &Reading) -> Option<TrendSymbol> {
    let raw = reading.trend_raw.as_ref()?;
    if let NumericField::Invalid(text) = raw {
        logging::warn(
            DataSource::Retemir,
            Some(&reading.station_name),
            &format!(
                "unparseable trend '{}' for sensor {} ({})",
                text, reading.sensor_kind, reading.description
            ),
        );
    }
    Some(classify(raw))
}
