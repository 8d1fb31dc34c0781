/// Station registry for the basin monitoring service.
///
/// Built once per run from the `[retemir]` configuration section. It answers
/// three questions for the rest of the pipeline: is this raw feed record a
/// station we monitor (and under which canonical name), which basin does it
/// belong to, and in what order should basins and stations be reported.

use crate::config::RetemirConfig;
use std::collections::{BTreeMap, HashMap};

// ---------------------------------------------------------------------------
// Report ordering
// ---------------------------------------------------------------------------

/// Display order for basins and, within each basin, for stations.
///
/// Shared by every report: the station network builds it from its basin
/// list, the WeatherLink check builds a single group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportOrder {
    /// Basins in display order; the catch-all group is last.
    pub basins: Vec<String>,
    /// Basin -> preferred station order.
    pub stations: HashMap<String, Vec<String>>,
}

impl ReportOrder {
    /// A single group listing `stations` in the given order.
    pub fn single_group(group: &str, stations: Vec<String>) -> Self {
        let mut order = HashMap::new();
        order.insert(group.to_string(), stations);
        ReportOrder {
            basins: vec![group.to_string()],
            stations: order,
        }
    }

    /// Preferred station order for a basin; empty when none is configured.
    pub fn station_order(&self, basin: &str) -> &[String] {
        self.stations.get(basin).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StationRegistry {
    /// Monitored names in configuration order (basin stations, then extras).
    monitored: Vec<String>,
    basin_of: HashMap<String, String>,
    /// Pinned name -> the only raw code accepted for it.
    station_codes: BTreeMap<String, i64>,
    catch_all: String,
    order: ReportOrder,
}

impl StationRegistry {
    pub fn from_config(cfg: &RetemirConfig) -> Self {
        let mut monitored = Vec::new();
        let mut basin_of = HashMap::new();
        let mut order = ReportOrder::default();

        for basin in &cfg.basins {
            for station in &basin.stations {
                monitored.push(station.clone());
                basin_of.insert(station.clone(), basin.name.clone());
            }
            order.basins.push(basin.name.clone());
            order.stations.insert(basin.name.clone(), basin.stations.clone());
        }
        for station in &cfg.extra_stations {
            if !monitored.contains(station) {
                monitored.push(station.clone());
            }
        }
        order.basins.push(cfg.catch_all_basin.clone());

        StationRegistry {
            monitored,
            basin_of,
            station_codes: cfg.station_codes.clone(),
            catch_all: cfg.catch_all_basin.clone(),
            order,
        }
    }

    pub fn monitored_names(&self) -> &[String] {
        &self.monitored
    }

    pub fn is_monitored(&self, name: &str) -> bool {
        self.monitored.iter().any(|m| m == name)
    }

    /// Basin for a station; unmapped stations fall into the catch-all group.
    pub fn basin_for(&self, station: &str) -> &str {
        self.basin_of
            .get(station)
            .map(String::as_str)
            .unwrap_or(&self.catch_all)
    }

    pub fn catch_all(&self) -> &str {
        &self.catch_all
    }

    pub fn report_order(&self) -> &ReportOrder {
        &self.order
    }

    /// Maps a raw feed record to a monitored station name.
    ///
    /// The same station name can appear in the feed under several codes. A
    /// record whose name contains a pinned name is accepted only when its
    /// code matches the pin, and is then reported under the clean pinned
    /// name. Every other monitored name is matched by exact identity after
    /// trimming.
    pub fn resolve_station(&self, raw_name: &str, code: Option<i64>) -> Option<String> {
        let name = raw_name.trim();
        for (pinned, expected) in &self.station_codes {
            if name.contains(pinned.as_str()) {
                return (code == Some(*expected)).then(|| pinned.clone());
            }
        }
        self.is_monitored(name).then(|| name.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    fn registry() -> StationRegistry {
        let cfg = MonitorConfig::embedded_default().expect("embedded config parses");
        StationRegistry::from_config(&cfg.retemir)
    }

    #[test]
    fn test_no_duplicate_monitored_names() {
        let reg = registry();
        let mut names: Vec<&String> = reg.monitored_names().iter().collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before, "a station is listed twice");
    }

    #[test]
    fn test_registry_contains_expected_stations() {
        let reg = registry();
        for name in ["Arcevia", "Misa", "Nevola", "Passo Ripe", "Cesano", "Ponte Garibaldi"] {
            assert!(reg.is_monitored(name), "{} missing from registry", name);
        }
    }

    #[test]
    fn test_basin_lookup() {
        let reg = registry();
        assert_eq!(reg.basin_for("Serra dei Conti"), "Misa");
        assert_eq!(reg.basin_for("Corinaldo"), "Nevola");
        assert_eq!(reg.basin_for("Foce Cesano"), "Cesano");
    }

    #[test]
    fn test_unmapped_station_falls_into_catch_all() {
        let reg = registry();
        assert_eq!(reg.basin_for("Ancona"), reg.catch_all());
    }

    #[test]
    fn test_catch_all_is_last_in_basin_order() {
        let reg = registry();
        let basins = &reg.report_order().basins;
        assert_eq!(basins.first().map(String::as_str), Some("Misa"));
        assert_eq!(basins.last().map(String::as_str), Some(reg.catch_all()));
    }

    #[test]
    fn test_pinned_station_requires_matching_code() {
        let reg = registry();
        assert_eq!(reg.resolve_station("Arcevia", Some(732)), Some("Arcevia".to_string()));
        assert_eq!(reg.resolve_station("Arcevia", Some(611)), None);
        assert_eq!(reg.resolve_station("Arcevia", None), None);
    }

    #[test]
    fn test_pinned_station_is_renamed_to_clean_name() {
        let reg = registry();
        assert_eq!(
            reg.resolve_station(" Arcevia (pluviometro) ", Some(732)),
            Some("Arcevia".to_string())
        );
    }

    #[test]
    fn test_other_names_match_exactly_after_trim() {
        let reg = registry();
        assert_eq!(reg.resolve_station(" Misa ", Some(1)), Some("Misa".to_string()));
        assert_eq!(reg.resolve_station("Misa nord", Some(1)), None);
        assert_eq!(reg.resolve_station("Ancona", Some(1)), None);
    }

    #[test]
    fn test_single_group_order() {
        let order = ReportOrder::single_group("WeatherLink", vec!["B".into(), "A".into()]);
        assert_eq!(order.basins, vec!["WeatherLink".to_string()]);
        assert_eq!(order.station_order("WeatherLink"), ["B".to_string(), "A".to_string()]);
        assert!(order.station_order("other").is_empty());
    }
}
