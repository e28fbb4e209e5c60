//! Label-anchored field extraction from semi-structured history pages.
//!
//! The summary table carries no stable ids or classes, so fields are located
//! by their visible label text and the value is read from the next element
//! in document order.

use std::collections::BTreeMap;

use scraper::{node::Node, ElementRef, Html, Selector};
use tracing::warn;

use crate::aggregate::{DailyRecord, FieldValue};

/// Labels longer than this are matched by prefix; the site appends
/// runtime-variable suffixes to some of them (a measurement time on the
/// precipitation label, for example).
const PREFIX_MATCH_THRESHOLD: usize = 20;

/// Position of the intra-day observations table among all `<table>` elements.
const HOURLY_TABLE_INDEX: usize = 2;

/// Extracts every configured field from one day's page. Absent labels
/// resolve to `None` and bump the shared missing-value counter; extraction
/// itself never fails a run.
pub fn extract_features(
    document: &Html,
    features: &BTreeMap<String, String>,
    missing_count: &mut u32,
) -> DailyRecord {
    let mut record = DailyRecord::new();
    for (label, key) in features {
        let value = extract_feature(document, label, missing_count);
        record.insert(key.clone(), value);
    }
    record
}

pub fn extract_feature(
    document: &Html,
    label: &str,
    missing_count: &mut u32,
) -> Option<FieldValue> {
    let text = match find_value_after_label(document, label) {
        Some(text) => text,
        None => {
            *missing_count += 1;
            warn!(
                "\"{}\" did not load; missing value count: {}",
                label, *missing_count
            );
            return None;
        }
    };
    Some(parse_field_value(&text))
}

/// Finds the text node carrying `label` and returns the text of the next
/// element after it in document order.
fn find_value_after_label(document: &Html, label: &str) -> Option<String> {
    let prefix: Option<String> = if label.chars().count() > PREFIX_MATCH_THRESHOLD {
        Some(label.chars().take(PREFIX_MATCH_THRESHOLD).collect())
    } else {
        None
    };

    let mut nodes = document.tree.root().descendants();

    let found = (&mut nodes).any(|node| match node.value() {
        Node::Text(text) => {
            let trimmed = text.trim();
            match &prefix {
                Some(prefix) => trimmed.starts_with(prefix.as_str()),
                None => trimmed == label,
            }
        }
        _ => false,
    });
    if !found {
        return None;
    }

    nodes
        .find_map(ElementRef::wrap)
        .map(|element| normalize_text(element.text()))
}

fn parse_field_value(text: &str) -> FieldValue {
    if let Ok(value) = text.parse::<f64>() {
        return FieldValue::Numeric(value);
    }
    match parse_duration_minutes(text) {
        Some(minutes) => FieldValue::Minutes(minutes),
        None => {
            warn!("value {:?} is neither numeric nor a duration", text);
            FieldValue::Unparseable(text.to_string())
        }
    }
}

/// `"14h 20m"` parses to 860.
fn parse_duration_minutes(text: &str) -> Option<i64> {
    let mut parts = text.split_whitespace();
    let hours: i64 = parts.next()?.strip_suffix('h')?.parse().ok()?;
    let minutes: i64 = parts.next()?.strip_suffix('m')?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// The intra-day observations, cells kept as opaque strings (units and all).
#[derive(Debug)]
pub struct HourlyTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads the hourly observations table, identified by position among the
/// page's tables. Returns `None` when the page has no table at that slot.
pub fn extract_hourly_table(document: &Html) -> Option<HourlyTable> {
    let tables = Selector::parse("table").ok()?;
    let table_rows = Selector::parse("tr").ok()?;
    let row_cells = Selector::parse("th, td").ok()?;

    let table = document.select(&tables).nth(HOURLY_TABLE_INDEX)?;

    let mut columns = Vec::new();
    let mut rows = Vec::new();
    for row in table.select(&table_rows) {
        let cells: Vec<String> = row
            .select(&row_cells)
            .map(|cell| normalize_text(cell.text()))
            .collect();
        if cells.is_empty() {
            continue;
        }
        // First populated row is the header row.
        if columns.is_empty() {
            columns = cells;
        } else {
            rows.push(cells);
        }
    }

    Some(HourlyTable { columns, rows })
}

fn normalize_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined: String = parts.collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn test_exact_label_numeric_value() {
        let document = doc("<table><tr><th>High Temp</th><td>88</td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&document, "High Temp", &mut missing);
        assert_eq!(value, Some(FieldValue::Numeric(88.0)));
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_duration_value_parses_to_minutes() {
        let document = doc("<table><tr><th>Actual Time</th><td>14h 20m</td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&document, "Actual Time", &mut missing);
        assert_eq!(value, Some(FieldValue::Minutes(860)));
    }

    #[test]
    fn test_long_label_matches_by_prefix() {
        let document = doc(
            "<table><tr>\
             <th>Precipitation (past 24 hours from 09:12:00)</th>\
             <td>0.3</td></tr></table>",
        );
        let mut missing = 0;
        let value = extract_feature(
            &document,
            "Precipitation (past 24 hours from 07:53:00)",
            &mut missing,
        );
        assert_eq!(value, Some(FieldValue::Numeric(0.3)));
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_prefix_threshold_boundary() {
        // "Pressure (sea level)" is exactly twenty characters: still matched
        // verbatim, so longer on-page variants of it do not count as hits
        let exact = doc("<table><tr><th>Pressure (sea level)</th><td>29.8</td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&exact, "Pressure (sea level)", &mut missing);
        assert_eq!(value, Some(FieldValue::Numeric(29.8)));
        assert_eq!(missing, 0);

        let suffixed =
            doc("<table><tr><th>Pressure (sea level) at 07:53</th><td>29.8</td></tr></table>");
        let value = extract_feature(&suffixed, "Pressure (sea level)", &mut missing);
        assert_eq!(value, None);
        assert_eq!(missing, 1);

        // one character past the threshold switches to prefix matching
        let rising =
            doc("<table><tr><th>Pressure (sea level) rising</th><td>29.8</td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&rising, "Pressure (sea level):", &mut missing);
        assert_eq!(value, Some(FieldValue::Numeric(29.8)));
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_label_with_nothing_after_it_counts_as_missing() {
        let document = doc("<p>High Temp</p>");
        let mut missing = 0;
        let value = extract_feature(&document, "High Temp", &mut missing);
        assert_eq!(value, None);
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_value_read_from_next_element() {
        let document = doc("<table><tr><th>Dew Point</th><td><span>61</span></td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&document, "Dew Point", &mut missing);
        assert_eq!(value, Some(FieldValue::Numeric(61.0)));
    }

    #[test]
    fn test_missing_label_increments_counter() {
        let document = doc("<table><tr><th>Low Temp</th><td>70</td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&document, "High Temp", &mut missing);
        assert_eq!(value, None);
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_unparseable_value_is_retained() {
        let document = doc("<table><tr><th>Visibility</th><td>trace</td></tr></table>");
        let mut missing = 0;
        let value = extract_feature(&document, "Visibility", &mut missing);
        assert_eq!(value, Some(FieldValue::Unparseable("trace".to_string())));
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_extract_features_maps_to_canonical_keys() {
        let document = doc(
            "<table>\
             <tr><th>High Temp</th><td>88</td></tr>\
             <tr><th>Actual Time</th><td>14h 20m</td></tr>\
             </table>",
        );
        let mut features = BTreeMap::new();
        features.insert("High Temp".to_string(), "temp_high".to_string());
        features.insert("Actual Time".to_string(), "day_len".to_string());

        let mut missing = 0;
        let record = extract_features(&document, &features, &mut missing);
        assert_eq!(record["temp_high"], Some(FieldValue::Numeric(88.0)));
        assert_eq!(record["day_len"], Some(FieldValue::Minutes(860)));
    }

    #[test]
    fn test_hourly_table_by_position() {
        let document = doc(
            "<table><tr><td>first</td></tr></table>\
             <table><tr><td>second</td></tr></table>\
             <table>\
             <tr><th>Time</th><th>Temperature</th></tr>\
             <tr><td>12:51 AM</td><td>75 F</td></tr>\
             <tr><td>1:51 AM</td><td>74 F</td></tr>\
             </table>",
        );
        let table = extract_hourly_table(&document).unwrap();
        assert_eq!(table.columns, vec!["Time", "Temperature"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["12:51 AM", "75 F"]);
    }

    #[test]
    fn test_hourly_table_absent() {
        let document = doc("<table><tr><td>only one</td></tr></table>");
        assert!(extract_hourly_table(&document).is_none());
    }

    #[test]
    fn test_duration_rejects_malformed_strings() {
        assert_eq!(parse_duration_minutes("14h 20m"), Some(860));
        assert_eq!(parse_duration_minutes("2h 15m"), Some(135));
        assert_eq!(parse_duration_minutes("0h 5m"), Some(5));
        assert_eq!(parse_duration_minutes("14h"), None);
        assert_eq!(parse_duration_minutes("14h 20m extra"), None);
        assert_eq!(parse_duration_minutes("88"), None);
    }
}
