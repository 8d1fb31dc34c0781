/// Civil-protection alert bulletin client.
///
/// The bulletin is a JSON array with one entry per warning area:
///
/// ```json
/// [ { "area": "2", "eventi": "idrogeologica:yellow,temporali:green" } ]
/// ```
///
/// `eventi` is a comma-separated list of `event_name:colour` pairs.

use crate::config::{AlertDay, AllertaConfig};
use crate::ingest::fetch::{DataFetcher, FetchRequest};
use crate::logging::{self, DataSource};
use crate::model::FetchError;
use serde_json::Value;

/// One `event:colour` entry of an area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulletinEvent {
    Level { name: String, colour: String },
    /// An entry that is not `name:colour`; kept verbatim for display.
    Malformed(String),
}

impl BulletinEvent {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(colour), None) if !name.trim().is_empty() => BulletinEvent::Level {
                name: name.trim().to_string(),
                colour: colour.trim().to_lowercase(),
            },
            _ => BulletinEvent::Malformed(raw.to_string()),
        }
    }
}

/// All events announced for one warning area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaEvents {
    pub area: String,
    pub events: Vec<BulletinEvent>,
}

/// Parse a bulletin payload into per-area events.
///
/// Entries without an area or without events are skipped.
pub fn parse_bulletin(payload: Value) -> Result<Vec<AreaEvents>, FetchError> {
    let Value::Array(items) = payload else {
        return Err(FetchError::UnexpectedShape(
            "expected a JSON array of alert areas".to_string(),
        ));
    };

    let mut areas = Vec::new();
    for item in items {
        let area = match item.get("area") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        let Some(events) = item.get("eventi").and_then(Value::as_str) else {
            continue;
        };
        let events: Vec<BulletinEvent> = events
            .split(',')
            .filter(|e| !e.trim().is_empty())
            .map(BulletinEvent::parse)
            .collect();
        if !events.is_empty() {
            areas.push(AreaEvents { area, events });
        }
    }
    Ok(areas)
}

/// Fetch and parse the bulletin for one day.
pub fn fetch_bulletin(
    fetcher: &dyn DataFetcher,
    config: &AllertaConfig,
    day: AlertDay,
) -> Result<Vec<AreaEvents>, FetchError> {
    let url = config.url_for(day);
    logging::info(
        DataSource::Allerta,
        None,
        &format!("requesting {} bulletin from {}", day.label(), url),
    );
    let payload = fetcher.fetch_json(&FetchRequest::get(url))?;
    parse_bulletin(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_event_pair() {
        assert_eq!(
            BulletinEvent::parse(" vento:Orange "),
            BulletinEvent::Level {
                name: "vento".to_string(),
                colour: "orange".to_string()
            }
        );
    }

    #[test]
    fn test_parse_event_without_colon_is_malformed() {
        assert_eq!(
            BulletinEvent::parse("mareggiate"),
            BulletinEvent::Malformed("mareggiate".to_string())
        );
        assert!(matches!(BulletinEvent::parse("a:b:c"), BulletinEvent::Malformed(_)));
    }

    #[test]
    fn test_parse_bulletin_areas() {
        let payload = json!([
            { "area": "2", "eventi": "idrogeologica:yellow, temporali:green" },
            { "area": 4, "eventi": "vento:orange" },
            { "area": "5", "eventi": "" },
            { "eventi": "neve:red" }
        ]);
        let areas = parse_bulletin(payload).unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].area, "2");
        assert_eq!(areas[0].events.len(), 2);
        assert_eq!(areas[1].area, "4");
    }

    #[test]
    fn test_parse_bulletin_rejects_object() {
        assert!(matches!(
            parse_bulletin(json!({ "status": "down" })),
            Err(FetchError::UnexpectedShape(_))
        ));
    }
}
