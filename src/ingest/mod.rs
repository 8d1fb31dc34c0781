//! Data source clients.
//!
//! - `fetch`: the `DataFetcher` collaborator and its blocking HTTP implementation.
//! - `retemir`: regional sensor-station network feed and normalizer.
//! - `allerta`: civil-protection alert bulletin.
//! - `weatherlink`: WeatherLink v2 personal weather stations.

pub mod allerta;
pub mod fetch;
pub mod retemir;
pub mod weatherlink;
