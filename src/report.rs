/// Message rendering.
///
/// Structured alerts and current values are turned into text only here, as
/// the last step of a run. One formatter serves every variant: the layout
/// says whether non-exceeding values are listed and whether basins get their
/// own headers. Output uses Telegram's legacy Markdown: feed text outside an
/// entity is escaped, feed text inside a bold span is embedded literally.

use crate::alert::thresholds::{Comparison, Evaluation};
use crate::analysis::groupings::{self, BasinGroup, StationEntry};
use crate::model::{Alert, CurrentValue, FetchError, NumericField, TrendSymbol};
use crate::notify::{escape_markdown, markdown_bold};
use crate::stations::ReportOrder;

/// Telegram's limit for a single message, in characters.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4096;

pub const TRUNCATION_MARKER: &str = "\n\n...[MESSAGE TRUNCATED]...";

const FOOTER_RULE_LEN: usize = 30;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

pub fn header(title: &str, timestamp: &str) -> String {
    markdown_bold(&format!("===== {} ({}) =====", title, timestamp))
}

pub fn footer() -> String {
    format!("*{}*", "=".repeat(FOOTER_RULE_LEN))
}

/// Wraps `body` between header and footer.
pub fn framed(title: &str, timestamp: &str, body: &str) -> String {
    format!("{}\n\n{}\n\n{}", header(title, timestamp), body.trim_end(), footer())
}

/// Cuts `text` to at most `max_len` characters, ending with the marker.
///
/// The cut never lands inside a bold span or right after an escape, or
/// Telegram would refuse to parse the message. It prefers the last block
/// separator that fits, then the last line break.
pub fn truncate_message(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_len <= marker_len {
        return TRUNCATION_MARKER.chars().take(max_len).collect();
    }
    let budget = text
        .char_indices()
        .nth(max_len - marker_len)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let kept = &text[..markup_safe_cut(&text[..budget])];
    let mut out = kept.trim_end().to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Byte offset in `prefix` where the text can be cut with every entity
/// closed: the last `\n\n`, else the last `\n`, else the last safe char.
fn markup_safe_cut(prefix: &str) -> usize {
    let mut in_bold = false;
    let mut escaped = false;
    let mut last_block = None;
    let mut last_line = None;
    let mut last_safe = 0;
    let mut previous = None;

    for (i, c) in prefix.char_indices() {
        if !in_bold && !escaped {
            last_safe = i;
            if c == '\n' {
                last_line = Some(i);
                if previous == Some('\n') {
                    last_block = Some(i - 1);
                }
            }
        }
        previous = Some(c);
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            // Inside an entity a backslash is literal.
            '\\' if !in_bold => escaped = true,
            '*' => in_bold = !in_bold,
            _ => {}
        }
    }
    if !in_bold && !escaped {
        last_safe = prefix.len();
    }
    last_block.or(last_line).unwrap_or(last_safe)
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Value with its unit, unescaped.
fn quantity(value: f64, unit: &str) -> String {
    if unit.is_empty() {
        format!("{:.2}", value)
    } else {
        format!("{:.2} {}", value, unit)
    }
}

fn trend_suffix(trend: Option<TrendSymbol>) -> String {
    trend.map(|t| format!(" {}", t.glyph())).unwrap_or_default()
}

fn field_text(value: &NumericField, unit: &str) -> String {
    match value {
        NumericField::Value(v) => markdown_bold(&quantity(*v, unit)),
        NumericField::Invalid(raw) => format!("{} (not numeric)", markdown_bold(raw)),
        NumericField::Missing => "N/D".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasinLayout {
    /// One `- basin -` header per non-empty basin.
    Grouped,
    /// Entries listed back to back in group order.
    Flat,
}

/// How a run's evaluation is laid out.
#[derive(Debug, Clone)]
pub struct ReportLayout<'a> {
    pub title: &'a str,
    pub order: &'a ReportOrder,
    pub basins: BasinLayout,
    /// List every value with a threshold, not only the exceeded ones.
    pub include_current: bool,
    pub comparison: Comparison,
}

pub fn render_alert(alert: &Alert, comparison: Comparison) -> String {
    format!(
        "‼️ {} - {}\nValue: {}{} ({} {}, {})\nLast update: {}",
        markdown_bold(&alert.station_name),
        escape_markdown(&alert.description),
        markdown_bold(&quantity(alert.value, &alert.unit)),
        trend_suffix(alert.trend),
        comparison.symbol(),
        escape_markdown(&quantity(alert.threshold.limit, &alert.unit)),
        alert.threshold.provenance,
        escape_markdown(&alert.last_update),
    )
}

/// One station with all of its monitored values.
pub fn render_station_values(station: &str, values: &[&CurrentValue]) -> String {
    let updated = values
        .first()
        .map(|v| escape_markdown(&v.reading.last_update))
        .unwrap_or_default();
    let mut out = format!("{} (Upd: {})", markdown_bold(station), updated);
    for value in values {
        let reading = &value.reading;
        out.push_str(&format!(
            "\n  - {}: {}{} (threshold {}, {})",
            escape_markdown(&reading.description),
            field_text(&reading.value, &reading.unit),
            trend_suffix(value.trend),
            escape_markdown(&quantity(value.threshold.limit, &reading.unit)),
            value.threshold.provenance,
        ));
    }
    out
}

fn basin_heading(basin: &str) -> String {
    markdown_bold(&format!("- {} -", basin))
}

fn render_groups<T: StationEntry>(
    groups: &[BasinGroup<'_, T>],
    layout: BasinLayout,
    render: impl Fn(&[&T]) -> Vec<String>,
) -> String {
    let mut parts = Vec::new();
    for group in groups {
        let blocks = render(&group.entries).join("\n\n");
        match layout {
            BasinLayout::Grouped => parts.push(format!("{}\n{}", basin_heading(&group.basin), blocks)),
            BasinLayout::Flat => parts.push(blocks),
        }
    }
    parts.join("\n\n")
}

pub fn alerts_section(alerts: &[Alert], layout: &ReportLayout<'_>) -> String {
    let groups = groupings::group_by_basin(alerts, layout.order);
    let body = render_groups(&groups, layout.basins, |entries| {
        entries.iter().map(|a| render_alert(a, layout.comparison)).collect()
    });
    format!("*--- ‼️ THRESHOLDS EXCEEDED ‼️ ---*\n\n{}", body)
}

pub fn current_values_section(current: &[CurrentValue], layout: &ReportLayout<'_>) -> String {
    let groups = groupings::group_by_basin(current, layout.order);
    let body = render_groups(&groups, layout.basins, |entries| {
        groupings::runs_by_station(entries)
            .into_iter()
            .map(|(station, values)| render_station_values(station, &values))
            .collect()
    });
    format!("*--- CURRENT MONITORED VALUES ---*\n\n{}", body)
}

pub const ALL_CLEAR_TEXT: &str = "✅ No threshold exceeded at the monitored stations.";

/// Full message for an evaluation, before length enforcement.
///
/// Alerts come first; with `include_current` an all-clear line replaces an
/// empty alerts section and the current values follow.
pub fn render_report(evaluation: &Evaluation, layout: &ReportLayout<'_>, timestamp: &str) -> String {
    let mut sections = Vec::new();
    if evaluation.has_alerts() {
        sections.push(alerts_section(&evaluation.alerts, layout));
    } else if layout.include_current {
        sections.push(ALL_CLEAR_TEXT.to_string());
    }
    if layout.include_current {
        if evaluation.current.is_empty() {
            sections.push("No monitored values available.".to_string());
        } else {
            sections.push(current_values_section(&evaluation.current, layout));
        }
    }
    framed(layout.title, timestamp, &sections.join("\n\n"))
}

/// Short notice sent when the feed could not be read.
pub fn render_fetch_error(source_name: &str, error: &FetchError, timestamp: &str) -> String {
    let body = format!(
        "⚠️ Could not retrieve data from {}.\n{}",
        escape_markdown(source_name),
        escape_markdown(&error.to_string())
    );
    framed("ERROR", timestamp, &body)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
