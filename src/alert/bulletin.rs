/// Regional alert bulletin evaluation.
///
/// Filters the parsed bulletin down to the areas of interest, drops the
/// ignored colour levels and renders what is left, one section per checked
/// day.

use crate::config::{AlertDay, AllertaConfig};
use crate::ingest::allerta::{AreaEvents, BulletinEvent};
use crate::logging::{self, DataSource};
use crate::model::FetchError;
use crate::notify::escape_markdown;
use crate::report;

/// An event that survived area and level filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulletinLine {
    Level { area: String, name: String, colour: String },
    Malformed { area: String, raw: String },
}

/// Result of checking one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCheck {
    pub day: AlertDay,
    pub outcome: Result<Vec<BulletinLine>, FetchError>,
}

/// Overall state of a bulletin run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletinStatus {
    /// At least one day could not be fetched.
    Error,
    Alerts,
    AllClear,
}

/// Emoji and label for a colour level.
pub fn colour_badge(colour: &str) -> (&'static str, String) {
    match colour {
        "yellow" => ("🟡", "YELLOW".to_string()),
        "orange" => ("🟠", "ORANGE".to_string()),
        "red" => ("🔴", "RED".to_string()),
        other => ("❓", other.to_uppercase()),
    }
}

/// `rischio_idrogeologico` -> `Rischio idrogeologico`.
pub fn event_display_name(name: &str) -> String {
    let spaced = name.trim().replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Events of the configured areas, without ignored levels.
pub fn relevant_events(areas: &[AreaEvents], config: &AllertaConfig) -> Vec<BulletinLine> {
    let mut lines = Vec::new();
    for area in areas.iter().filter(|a| config.areas.contains(&a.area)) {
        for event in &area.events {
            match event {
                BulletinEvent::Level { name, colour } => {
                    if config.ignored_levels.iter().any(|l| l.eq_ignore_ascii_case(colour)) {
                        continue;
                    }
                    lines.push(BulletinLine::Level {
                        area: area.area.clone(),
                        name: name.clone(),
                        colour: colour.clone(),
                    });
                }
                BulletinEvent::Malformed(raw) => {
                    logging::warn(
                        DataSource::Allerta,
                        Some(&area.area),
                        &format!("malformed bulletin event '{}'", raw),
                    );
                    lines.push(BulletinLine::Malformed {
                        area: area.area.clone(),
                        raw: raw.clone(),
                    });
                }
            }
        }
    }
    lines
}

pub fn render_line(line: &BulletinLine) -> String {
    match line {
        BulletinLine::Level { area, name, colour } => {
            let (emoji, label) = colour_badge(colour);
            format!(
                "{} Area {}: {} ({})",
                emoji,
                escape_markdown(area),
                escape_markdown(&event_display_name(name)),
                escape_markdown(&label)
            )
        }
        BulletinLine::Malformed { area, raw } => {
            format!("❓ Area {}: Malformed event: {}", escape_markdown(area), escape_markdown(raw))
        }
    }
}

pub fn status(checks: &[DayCheck]) -> BulletinStatus {
    if checks.iter().any(|c| c.outcome.is_err()) {
        BulletinStatus::Error
    } else if checks.iter().any(|c| matches!(&c.outcome, Ok(lines) if !lines.is_empty())) {
        BulletinStatus::Alerts
    } else {
        BulletinStatus::AllClear
    }
}

/// Complete bulletin message, before length enforcement.
pub fn render_bulletin(checks: &[DayCheck], areas: &[String], timestamp: &str) -> String {
    let status = status(checks);
    let title = match status {
        BulletinStatus::Error => "ALERT BULLETIN ERROR",
        BulletinStatus::Alerts => "WEATHER ALERTS",
        BulletinStatus::AllClear => "NO WEATHER ALERTS",
    };

    let mut sections = Vec::new();
    for check in checks {
        match &check.outcome {
            Err(e) => sections.push(format!(
                "⚠️ Could not retrieve the {} bulletin: {}",
                check.day.label(),
                escape_markdown(&e.to_string())
            )),
            Ok(lines) if !lines.is_empty() => {
                let body: Vec<String> = lines.iter().map(render_line).collect();
                sections.push(format!("*{}*\n{}", check.day.label(), body.join("\n")));
            }
            Ok(_) => {}
        }
    }
    if status == BulletinStatus::AllClear {
        sections.push(format!(
            "✅ No relevant alerts for areas {}.",
            escape_markdown(&areas.join(", "))
        ));
    }

    report::framed(title, timestamp, &sections.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    fn config() -> AllertaConfig {
        MonitorConfig::embedded_default().unwrap().allerta
    }

    fn area(id: &str, events: &[&str]) -> AreaEvents {
        AreaEvents {
            area: id.to_string(),
            events: events.iter().map(|e| BulletinEvent::parse(e)).collect(),
        }
    }

    #[test]
    fn test_event_display_name() {
        assert_eq!(event_display_name("rischio_idrogeologico"), "Rischio idrogeologico");
        assert_eq!(event_display_name("vento"), "Vento");
        assert_eq!(event_display_name(""), "");
    }

    #[test]
    fn test_colour_badges() {
        assert_eq!(colour_badge("yellow").0, "🟡");
        assert_eq!(colour_badge("orange").0, "🟠");
        assert_eq!(colour_badge("red").0, "🔴");
        assert_eq!(colour_badge("purple"), ("❓", "PURPLE".to_string()));
    }

    #[test]
    fn test_relevant_events_filter_areas_and_levels() {
        let areas = vec![
            area("2", &["idrogeologica:yellow", "temporali:green"]),
            area("3", &["vento:red"]),
            area("4", &["neve:white", "mareggiate"]),
        ];
        let lines = relevant_events(&areas, &config());
        assert_eq!(
            lines,
            vec![
                BulletinLine::Level {
                    area: "2".to_string(),
                    name: "idrogeologica".to_string(),
                    colour: "yellow".to_string()
                },
                BulletinLine::Malformed {
                    area: "4".to_string(),
                    raw: "mareggiate".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unknown_colour_is_kept() {
        let lines = relevant_events(&[area("2", &["vento:purple"])], &config());
        assert_eq!(lines.len(), 1);
        assert!(render_line(&lines[0]).starts_with("❓ Area 2: Vento"));
    }

    #[test]
    fn test_render_alerts() {
        let checks = vec![DayCheck {
            day: AlertDay::Tomorrow,
            outcome: Ok(vec![BulletinLine::Level {
                area: "2".to_string(),
                name: "rischio_idro".to_string(),
                colour: "orange".to_string(),
            }]),
        }];
        let text = render_bulletin(&checks, &config().areas, "17/10/2026 08:30:00");
        assert!(text.starts_with("*===== WEATHER ALERTS"));
        assert!(text.contains("*TOMORROW*\n🟠 Area 2: Rischio idro (ORANGE)"));
    }

    #[test]
    fn test_render_all_clear_names_areas() {
        let checks = vec![DayCheck {
            day: AlertDay::Tomorrow,
            outcome: Ok(Vec::new()),
        }];
        assert_eq!(status(&checks), BulletinStatus::AllClear);
        let text = render_bulletin(&checks, &config().areas, "17/10/2026 08:30:00");
        assert!(text.contains("No relevant alerts for areas 2, 4."));
    }

    #[test]
    fn test_any_failed_day_makes_error_report() {
        let checks = vec![
            DayCheck {
                day: AlertDay::Today,
                outcome: Err(FetchError::HttpStatus {
                    url: "u".to_string(),
                    status: 503,
                }),
            },
            DayCheck {
                day: AlertDay::Tomorrow,
                outcome: Ok(Vec::new()),
            },
        ];
        assert_eq!(status(&checks), BulletinStatus::Error);
        let text = render_bulletin(&checks, &config().areas, "17/10/2026 08:30:00");
        assert!(text.starts_with("*===== ALERT BULLETIN ERROR"));
        assert!(text.contains("Could not retrieve the TODAY bulletin: HTTP error 503"));
        assert!(!text.contains("No relevant alerts"));
    }
}
