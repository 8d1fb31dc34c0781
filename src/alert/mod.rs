//! Threshold checking, trend classification, bulletin evaluation and the
//! per-run dispatch decision.

pub mod bulletin;
pub mod dispatch;
pub mod thresholds;
pub mod trend;
