//! schema.org `Event` / `SportsEvent` blocks embedded as JSON-LD.

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::dates::parse_single_date;

static JSONLD_SCRIPT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script[type='application/ld+json']").expect("valid json-ld selector")
});

const EVENT_TYPES: [&str; 2] = ["SportsEvent", "Event"];

/// Fields read from structured event markup. Absent or malformed markup leaves all of them `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredEvent {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub venue_name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl StructuredEvent {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    // Earlier blocks win; `other` only fills gaps.
    fn fill_from(&mut self, other: StructuredEvent) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.name, other.name);
        fill(&mut self.start_date, other.start_date);
        fill(&mut self.end_date, other.end_date);
        fill(&mut self.venue_name, other.venue_name);
        fill(&mut self.street_address, other.street_address);
        fill(&mut self.city, other.city);
        fill(&mut self.country, other.country);
        fill(&mut self.latitude, other.latitude);
        fill(&mut self.longitude, other.longitude);
    }
}

pub fn read_structured_event(document: &Html) -> StructuredEvent {
    let mut event = StructuredEvent::default();
    for script in document.select(&JSONLD_SCRIPT) {
        let raw = script.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let value: JsonValue = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "skipping malformed json-ld block");
                continue;
            }
        };
        for item in candidates(&value) {
            if is_event(item) {
                event.fill_from(event_from_item(item));
            }
        }
    }
    event
}

// Top-level object, array of objects, and any `@graph` container inside either.
fn candidates(value: &JsonValue) -> Vec<&JsonValue> {
    let top: Vec<&JsonValue> = match value {
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut out = Vec::with_capacity(top.len());
    for item in top {
        out.push(item);
        if let Some(graph) = item.get("@graph").and_then(JsonValue::as_array) {
            out.extend(graph.iter());
        }
    }
    out
}

fn is_event(item: &JsonValue) -> bool {
    let matches = |t: &str| EVENT_TYPES.iter().any(|e| t.eq_ignore_ascii_case(e));
    match item.get("@type") {
        Some(JsonValue::String(t)) => matches(t.as_str()),
        Some(JsonValue::Array(types)) => types.iter().filter_map(JsonValue::as_str).any(matches),
        _ => false,
    }
}

fn non_empty_str(value: Option<&JsonValue>) -> Option<String> {
    let text = value?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// Coordinates show up as numbers or numeric strings.
fn coordinate(value: Option<&JsonValue>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|v: &f64| v.is_finite())
}

fn event_from_item(item: &JsonValue) -> StructuredEvent {
    let location = match item.get("location") {
        Some(JsonValue::Array(places)) => places.iter().find(|p| p.is_object()),
        Some(place @ JsonValue::Object(_)) => Some(place),
        _ => None,
    };
    let address = location.and_then(|l| l.get("address")).filter(|a| a.is_object());
    let geo = location.and_then(|l| l.get("geo"));

    let country = address.and_then(|a| a.get("addressCountry")).and_then(|c| match c {
        JsonValue::Object(_) => non_empty_str(c.get("name")),
        other => non_empty_str(Some(other)),
    });

    StructuredEvent {
        name: non_empty_str(item.get("name")),
        start_date: item
            .get("startDate")
            .and_then(JsonValue::as_str)
            .and_then(parse_single_date),
        end_date: item
            .get("endDate")
            .and_then(JsonValue::as_str)
            .and_then(parse_single_date),
        venue_name: location
            .and_then(|l| non_empty_str(l.get("name")))
            .or_else(|| non_empty_str(item.get("location"))),
        street_address: address.and_then(|a| non_empty_str(a.get("streetAddress"))),
        city: address.and_then(|a| non_empty_str(a.get("addressLocality"))),
        country,
        latitude: coordinate(geo.and_then(|g| g.get("latitude"))),
        longitude: coordinate(geo.and_then(|g| g.get("longitude"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(blocks: &[&str]) -> Html {
        let scripts: String = blocks
            .iter()
            .map(|b| format!("<script type=\"application/ld+json\">{b}</script>"))
            .collect();
        Html::parse_document(&format!("<html><head>{scripts}</head><body></body></html>"))
    }

    #[test]
    fn sports_event_with_nested_location() {
        let html = page(&[r#"{
            "@context": "https://schema.org",
            "@type": "SportsEvent",
            "name": "J60 Antalya",
            "startDate": "2025-06-12T09:00:00+03:00",
            "endDate": "2025-06-18",
            "location": {
                "@type": "Place",
                "name": "Megasaray Club",
                "address": {
                    "streetAddress": "Belek Mah. 12",
                    "addressLocality": "Antalya",
                    "addressCountry": {"@type": "Country", "name": "Turkey"}
                },
                "geo": {"latitude": "36.86", "longitude": 31.05}
            }
        }"#]);
        let event = read_structured_event(&html);
        assert_eq!(event.name.as_deref(), Some("J60 Antalya"));
        assert_eq!(event.start_date, NaiveDate::from_ymd_opt(2025, 6, 12));
        assert_eq!(event.end_date, NaiveDate::from_ymd_opt(2025, 6, 18));
        assert_eq!(event.venue_name.as_deref(), Some("Megasaray Club"));
        assert_eq!(event.street_address.as_deref(), Some("Belek Mah. 12"));
        assert_eq!(event.city.as_deref(), Some("Antalya"));
        assert_eq!(event.country.as_deref(), Some("Turkey"));
        assert_eq!(event.latitude, Some(36.86));
        assert_eq!(event.longitude, Some(31.05));
    }

    #[test]
    fn first_block_wins_and_later_blocks_fill_gaps() {
        let html = page(&[
            r#"{"@type": "Event", "name": "First"}"#,
            r#"[{"@type": "Organization", "name": "ITF"},
                {"@type": ["Thing", "SportsEvent"], "name": "Second", "startDate": "2025-07-01"}]"#,
        ]);
        let event = read_structured_event(&html);
        assert_eq!(event.name.as_deref(), Some("First"));
        assert_eq!(event.start_date, NaiveDate::from_ymd_opt(2025, 7, 1));
    }

    #[test]
    fn graph_containers_are_expanded() {
        let html = page(&[r#"{"@context": "https://schema.org", "@graph": [
            {"@type": "WebPage", "name": "Page"},
            {"@type": "SportsEvent", "name": "Graph Event",
             "location": {"address": {"addressLocality": "Nairobi", "addressCountry": "KEN"}}}
        ]}"#]);
        let event = read_structured_event(&html);
        assert_eq!(event.name.as_deref(), Some("Graph Event"));
        assert_eq!(event.city.as_deref(), Some("Nairobi"));
        assert_eq!(event.country.as_deref(), Some("KEN"));
    }

    #[test]
    fn malformed_and_foreign_blocks_yield_nothing() {
        let html = page(&["{not json", r#"{"@type": "Organization", "name": "ITF"}"#, ""]);
        assert!(read_structured_event(&html).is_empty());
        assert!(read_structured_event(&Html::parse_document("")).is_empty());
    }

    #[test]
    fn unparseable_dates_stay_empty() {
        let html = page(&[r#"{"@type": "Event", "name": " ", "startDate": "TBA"}"#]);
        let event = read_structured_event(&html);
        assert_eq!(event.name, None);
        assert_eq!(event.start_date, None);
    }
}
