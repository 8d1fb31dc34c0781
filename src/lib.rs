//! Basin watch: scheduled checks of regional hydro-meteorological telemetry
//! with Telegram notifications.
//!
//! Every binary runs one check to completion: fetch a feed, normalize it
//! into readings, resolve thresholds, evaluate, group by basin, render a
//! bounded message and hand it to a notifier.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod stations;
