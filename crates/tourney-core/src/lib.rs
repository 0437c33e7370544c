//! Core domain model and provenance types for tournament extraction.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "tourney-core";

/// Literal used when neither a name nor any naming signal could be recovered.
pub const FALLBACK_NAME: &str = "ITF";

/// Canonical tournament record produced by one scrape.
///
/// Every field other than `name` and `source_link` is optional; a missing value
/// means the page and URL carried no signal for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentRecord {
    pub name: String,
    pub grade: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub surface: Option<String>,
    pub year: Option<i32>,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub qualifying_start: Option<NaiveDate>,
    pub qualifying_end: Option<NaiveDate>,

    // Logistics stay as page text; the source formats them too loosely to parse.
    pub entry_deadline: Option<String>,
    pub withdrawal_deadline: Option<String>,
    pub sign_in_main: Option<String>,
    pub sign_in_qualifying: Option<String>,
    pub first_qualifying_day: Option<String>,
    pub first_main_day: Option<String>,

    pub city: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub venue_website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub tournament_director_name: Option<String>,
    pub tournament_director_email: Option<String>,
    pub official_ball: Option<String>,
    pub tournament_key: Option<String>,
    /// Scraped URL. Identity key for persistence and the external apply link.
    pub source_link: String,
    pub notes: Option<String>,
}

impl TournamentRecord {
    /// A record carrying only the mandatory fields.
    pub fn minimal(name: impl Into<String>, source_link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grade: None,
            category: None,
            gender: None,
            surface: None,
            year: None,
            start_date: None,
            end_date: None,
            qualifying_start: None,
            qualifying_end: None,
            entry_deadline: None,
            withdrawal_deadline: None,
            sign_in_main: None,
            sign_in_qualifying: None,
            first_qualifying_day: None,
            first_main_day: None,
            city: None,
            country_code: None,
            country: None,
            venue_name: None,
            venue_address: None,
            venue_website: None,
            latitude: None,
            longitude: None,
            tournament_director_name: None,
            tournament_director_email: None,
            official_ball: None,
            tournament_key: None,
            source_link: source_link.into(),
            notes: None,
        }
    }

    pub fn apply_url(&self) -> &str {
        &self.source_link
    }
}

/// Persisted record with its storage-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTournament {
    pub id: i64,
    #[serde(flatten)]
    pub record: TournamentRecord,
}

/// Why a fetched body was judged to be an anti-bot interstitial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    Signature(String),
    Status(u16),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Signature(sig) => write!(f, "signature {sig:?}"),
            BlockReason::Status(status) => write!(f, "http {status}"),
        }
    }
}

/// Which route produced the HTML handed to extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchPath {
    Direct,
    Rendered(BlockReason),
    Degraded { status: u16 },
    BlockedWithoutRenderer(BlockReason),
}

impl fmt::Display for FetchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPath::Direct => f.write_str("direct"),
            FetchPath::Rendered(reason) => write!(f, "rendered ({reason})"),
            FetchPath::Degraded { status } => write!(f, "degraded http {status}"),
            FetchPath::BlockedWithoutRenderer(reason) => {
                write!(f, "blocked ({reason}), no renderer")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_has_only_identity_fields() {
        let record = TournamentRecord::minimal("ITF", "https://example.org/t/1");
        assert_eq!(record.name, "ITF");
        assert_eq!(record.apply_url(), "https://example.org/t/1");
        assert!(record.grade.is_none());
        assert!(record.start_date.is_none());
        assert!(record.notes.is_none());
    }

    #[test]
    fn fetch_path_renders_provenance_labels() {
        assert_eq!(FetchPath::Direct.to_string(), "direct");
        assert_eq!(
            FetchPath::Rendered(BlockReason::Signature("captcha".into())).to_string(),
            "rendered (signature \"captcha\")"
        );
        assert_eq!(FetchPath::Degraded { status: 404 }.to_string(), "degraded http 404");
        assert_eq!(
            FetchPath::BlockedWithoutRenderer(BlockReason::Status(403)).to_string(),
            "blocked (http 403), no renderer"
        );
    }

    #[test]
    fn stored_tournament_serializes_flat() {
        let stored = StoredTournament {
            id: 7,
            record: TournamentRecord::minimal("J60 Antalya", "https://example.org/a"),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "J60 Antalya");
        assert!(value["start_date"].is_null());
    }
}
