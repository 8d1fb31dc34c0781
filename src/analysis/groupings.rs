//! Basin grouping and deterministic ordering.
//!
//! Alerts and current values are partitioned by basin, basins are emitted in
//! the configured order (empty ones omitted), and stations inside a basin
//! follow the configured preference list. Stations missing from that list
//! come after every listed station, alphabetically among themselves.

use crate::model::{Alert, CurrentValue};
use crate::stations::ReportOrder;
use std::collections::BTreeMap;

/// Anything that can be placed in a basin report.
pub trait StationEntry {
    fn station_name(&self) -> &str;
    fn basin(&self) -> &str;
}

impl StationEntry for Alert {
    fn station_name(&self) -> &str {
        &self.station_name
    }
    fn basin(&self) -> &str {
        &self.basin
    }
}

impl StationEntry for CurrentValue {
    fn station_name(&self) -> &str {
        &self.reading.station_name
    }
    fn basin(&self) -> &str {
        &self.reading.basin
    }
}

/// Entries of one basin, already sorted.
#[derive(Debug)]
pub struct BasinGroup<'a, T> {
    pub basin: String,
    pub entries: Vec<&'a T>,
}

/// Sort key for a station within a basin: listed stations by position,
/// then unlisted ones by name.
pub fn station_sort_key<'s>(order: &[String], station: &'s str) -> (usize, &'s str) {
    let rank = order.iter().position(|s| s == station).unwrap_or(usize::MAX);
    (rank, station)
}

/// Partition `items` by basin and order them for display.
///
/// Every item lands in exactly one group. Basins missing from the configured
/// order are still reported, after the configured ones, alphabetically.
pub fn group_by_basin<'a, T: StationEntry>(items: &'a [T], order: &ReportOrder) -> Vec<BasinGroup<'a, T>> {
    let mut buckets: BTreeMap<&'a str, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        buckets.entry(item.basin()).or_default().push(item);
    }

    let mut groups = Vec::with_capacity(buckets.len());
    for basin in &order.basins {
        if let Some(mut entries) = buckets.remove(basin.as_str()) {
            sort_entries(&mut entries, order.station_order(basin));
            groups.push(BasinGroup {
                basin: basin.clone(),
                entries,
            });
        }
    }
    for (basin, mut entries) in buckets {
        sort_entries(&mut entries, &[]);
        groups.push(BasinGroup {
            basin: basin.to_string(),
            entries,
        });
    }
    groups
}

/// Stable sort: entries of the same station keep their feed order.
fn sort_entries<T: StationEntry>(entries: &mut [&T], order: &[String]) {
    entries.sort_by(|a, b| {
        station_sort_key(order, a.station_name()).cmp(&station_sort_key(order, b.station_name()))
    });
}

/// Split already-sorted entries into runs of the same station.
pub fn runs_by_station<'a, T: StationEntry>(entries: &[&'a T]) -> Vec<(&'a str, Vec<&'a T>)> {
    let mut runs: Vec<(&'a str, Vec<&'a T>)> = Vec::new();
    for entry in entries {
        let name = entry.station_name();
        match runs.last_mut() {
            Some((current, items)) if *current == name => items.push(entry),
            _ => runs.push((name, vec![entry])),
        }
    }
    runs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
