//! Per-field ordered strategy table.
//!
//! Each logical field lists its sources from most to least trusted. Resolution
//! stops at the first source that yields a usable value; a weaker source never
//! replaces a stronger one.

use std::fmt;

use chrono::NaiveDate;
use scraper::{Html, Selector as CssSelector};
use tracing::debug;

use crate::dates::{extract_date_range, parse_single_date};
use crate::jsonld::{read_structured_event, StructuredEvent};
use crate::labels::find_by_label;
use crate::location::{grade_from_text, UrlParts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Grade,
    Category,
    Gender,
    Surface,
    StartDate,
    EndDate,
    QualifyingStart,
    QualifyingEnd,
    EntryDeadline,
    WithdrawalDeadline,
    SignInMain,
    SignInQualifying,
    FirstQualifyingDay,
    FirstMainDay,
    City,
    CountryCode,
    Country,
    VenueName,
    VenueAddress,
    VenueWebsite,
    Latitude,
    Longitude,
    DirectorName,
    DirectorEmail,
    OfficialBall,
    TournamentKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKey {
    Name,
    StartDate,
    EndDate,
    Venue,
    StreetAddress,
    City,
    Country,
    Latitude,
    Longitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKey {
    Grade,
    City,
    CountryCode,
    TournamentKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Start,
    End,
}

/// One way of recovering a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Structured(StructuredKey),
    /// `content` of the first listed `<meta>` (by `property` or `name`) that is present.
    Meta(&'static [&'static str]),
    /// Free-text date range scanned out of the description and title metas.
    MetaRange(RangeEnd),
    Title,
    /// Text of the first element matching the selector list.
    Selector(&'static str),
    Label(&'static [&'static str]),
    Url(UrlKey),
    TitleGrade,
}

impl Strategy {
    /// URL strategies are the only ones that work without a page body.
    pub fn reads_page(&self) -> bool {
        !matches!(self, Strategy::Url(_))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Structured(key) => write!(f, "json-ld {key:?}"),
            Strategy::Meta(names) => write!(f, "meta {}", names.join("|")),
            Strategy::MetaRange(end) => write!(f, "meta date range {end:?}"),
            Strategy::Title => f.write_str("title"),
            Strategy::Selector(sel) => write!(f, "selector {sel}"),
            Strategy::Label(labels) => write!(f, "label {}", labels.join("|")),
            Strategy::Url(key) => write!(f, "url {key:?}"),
            Strategy::TitleGrade => f.write_str("title grade"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Date,
    Coordinate,
}

const GRADE_SELECTORS: &str = ".event-meta .grade, .tournament-meta__grade, [data-field='grade']";
const CATEGORY_SELECTORS: &str =
    ".event-meta .category, .tournament-meta__category, [data-field='category']";
const GENDER_SELECTORS: &str = ".event-meta .gender, .tournament-meta__gender, [data-field='gender']";
const SURFACE_SELECTORS: &str = ".event-surface, .tournament-surface, [data-field='surface']";
const START_SELECTORS: &str =
    "[data-field='start-date'], [data-field='startDate'], .event-dates__start, .start-date";
const END_SELECTORS: &str =
    "[data-field='end-date'], [data-field='endDate'], .event-dates__end, .end-date";
const QUALIFYING_START_SELECTORS: &str =
    ".qualifying-start, [data-field='qualifying-start'], [data-field='qualifyingStart']";
const QUALIFYING_END_SELECTORS: &str =
    ".qualifying-end, [data-field='qualifying-end'], [data-field='qualifyingEnd']";
const CITY_SELECTORS: &str =
    ".event-location .city, .tournament-location__city, [data-field='city']";
const COUNTRY_SELECTORS: &str =
    ".event-location .country, .tournament-location__country, [data-field='country']";
const VENUE_SELECTORS: &str = ".event-location .venue, .tournament-venue, [data-field='venue']";

const DATE_RANGE_METAS: [&str; 3] = ["og:description", "description", "og:title"];

/// Ordered sources per field.
pub fn plan(field: Field) -> &'static [Strategy] {
    use Strategy::*;
    match field {
        Field::Name => &[Structured(StructuredKey::Name), Meta(&["og:title"]), Title],
        Field::Grade => &[
            Selector(GRADE_SELECTORS),
            Label(&["Grade"]),
            Url(UrlKey::Grade),
            TitleGrade,
        ],
        Field::Category => &[Selector(CATEGORY_SELECTORS), Label(&["Category"])],
        Field::Gender => &[Selector(GENDER_SELECTORS), Label(&["Gender"])],
        Field::Surface => &[Selector(SURFACE_SELECTORS), Label(&["Surface"])],
        Field::StartDate => &[
            Structured(StructuredKey::StartDate),
            MetaRange(RangeEnd::Start),
            Selector(START_SELECTORS),
            Label(&["Start Date"]),
        ],
        Field::EndDate => &[
            Structured(StructuredKey::EndDate),
            MetaRange(RangeEnd::End),
            Selector(END_SELECTORS),
            Label(&["End Date"]),
        ],
        Field::QualifyingStart => &[
            Selector(QUALIFYING_START_SELECTORS),
            Label(&["Qualifying Start", "Qualifying Start Date"]),
        ],
        Field::QualifyingEnd => &[
            Selector(QUALIFYING_END_SELECTORS),
            Label(&["Qualifying End", "Qualifying End Date"]),
        ],
        Field::EntryDeadline => &[Label(&["Entry Deadline"])],
        Field::WithdrawalDeadline => &[Label(&["Withdrawal Deadline"])],
        Field::SignInMain => &[Label(&["Main Draw Sign-in", "Sign-in Main Draw", "Sign In Main"])],
        Field::SignInQualifying => &[Label(&[
            "Qualifying Sign-in",
            "Sign-in Qualifying",
            "Sign In Qualifying",
        ])],
        Field::FirstQualifyingDay => {
            &[Label(&["First Day of Qualifying", "First Qualifying Day"])]
        }
        Field::FirstMainDay => &[Label(&["First Day of Main Draw", "First Main Draw Day"])],
        Field::City => &[
            Structured(StructuredKey::City),
            Selector(CITY_SELECTORS),
            Label(&["City"]),
            Url(UrlKey::City),
        ],
        Field::CountryCode => &[Url(UrlKey::CountryCode)],
        Field::Country => &[
            Structured(StructuredKey::Country),
            Selector(COUNTRY_SELECTORS),
            Label(&["Country"]),
        ],
        Field::VenueName => &[
            Structured(StructuredKey::Venue),
            Selector(VENUE_SELECTORS),
            Label(&["Venue", "Venue Name"]),
        ],
        Field::VenueAddress => &[
            Structured(StructuredKey::StreetAddress),
            Label(&["Venue Address", "Address"]),
        ],
        Field::VenueWebsite => &[Label(&["Venue Website", "Website"])],
        Field::Latitude => &[
            Structured(StructuredKey::Latitude),
            Meta(&["place:location:latitude"]),
        ],
        Field::Longitude => &[
            Structured(StructuredKey::Longitude),
            Meta(&["place:location:longitude"]),
        ],
        Field::DirectorName => &[Label(&["Tournament Director", "Director"])],
        Field::DirectorEmail => &[Label(&["Tournament Director Email", "Email"])],
        Field::OfficialBall => &[Label(&["Official Ball", "Ball"])],
        Field::TournamentKey => &[Label(&["Tournament Key"]), Url(UrlKey::TournamentKey)],
    }
}

fn kind(field: Field) -> Kind {
    match field {
        Field::StartDate | Field::EndDate | Field::QualifyingStart | Field::QualifyingEnd => {
            Kind::Date
        }
        Field::Latitude | Field::Longitude => Kind::Coordinate,
        _ => Kind::Text,
    }
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Typed cascade output, one slot per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub grade: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub surface: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub qualifying_start: Option<NaiveDate>,
    pub qualifying_end: Option<NaiveDate>,
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
    pub director_name: Option<String>,
    pub director_email: Option<String>,
    pub official_ball: Option<String>,
    pub tournament_key: Option<String>,
    pub year: Option<i32>,
    /// Winning strategy for every resolved field, in resolution order.
    pub sources: Vec<(Field, Strategy)>,
}

impl ExtractedFields {
    /// True when at least one field came from the page body rather than the URL.
    pub fn page_contributed(&self) -> bool {
        self.sources.iter().any(|(_, strategy)| strategy.reads_page())
    }

    pub fn source_of(&self, field: Field) -> Option<Strategy> {
        self.sources
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, strategy)| *strategy)
    }
}

/// Resolution state for one document. Owned by a single scrape.
pub struct FieldCascade<'a> {
    document: &'a Html,
    structured: StructuredEvent,
    url: UrlParts,
    meta_range: (Option<NaiveDate>, Option<NaiveDate>),
    sources: Vec<(Field, Strategy)>,
}

impl<'a> FieldCascade<'a> {
    pub fn new(document: &'a Html, source_url: &str) -> Self {
        let structured = read_structured_event(document);
        let mut cascade = Self {
            document,
            structured,
            url: UrlParts::parse(source_url),
            meta_range: (None, None),
            sources: Vec::new(),
        };
        cascade.meta_range = cascade.scan_meta_range();
        cascade
    }

    fn scan_meta_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        DATE_RANGE_METAS
            .iter()
            .filter_map(|name| self.meta_content(name))
            .map(|text| extract_date_range(&text))
            .find(|(start, _)| start.is_some())
            .unwrap_or((None, None))
    }

    fn meta_content(&self, name: &str) -> Option<String> {
        let selector =
            CssSelector::parse(&format!("meta[property='{name}'], meta[name='{name}']")).ok()?;
        self.document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_ws)
            .find(|content| !content.is_empty())
    }

    fn first_text(&self, selectors: &str) -> Option<String> {
        let selector = CssSelector::parse(selectors).ok()?;
        let el = self.document.select(&selector).next()?;
        non_empty(collapse_ws(&el.text().collect::<String>()))
    }

    fn title(&self) -> Option<String> {
        self.first_text("title")
    }

    fn structured_value(&self, key: StructuredKey) -> Option<String> {
        let s = &self.structured;
        match key {
            StructuredKey::Name => s.name.clone(),
            StructuredKey::StartDate => s.start_date.map(|d| d.to_string()),
            StructuredKey::EndDate => s.end_date.map(|d| d.to_string()),
            StructuredKey::Venue => s.venue_name.clone(),
            StructuredKey::StreetAddress => s.street_address.clone(),
            StructuredKey::City => s.city.clone(),
            StructuredKey::Country => s.country.clone(),
            StructuredKey::Latitude => s.latitude.map(|v| v.to_string()),
            StructuredKey::Longitude => s.longitude.map(|v| v.to_string()),
        }
    }

    fn url_value(&self, key: UrlKey) -> Option<String> {
        match key {
            UrlKey::Grade => self.url.grade.clone(),
            UrlKey::City => self.url.city.clone(),
            UrlKey::CountryCode => self.url.country_code.clone(),
            UrlKey::TournamentKey => self.url.tournament_key.clone(),
        }
    }

    fn attempt(&self, strategy: Strategy) -> Option<String> {
        match strategy {
            Strategy::Structured(key) => self.structured_value(key),
            Strategy::Meta(names) => names.iter().find_map(|name| self.meta_content(name)),
            Strategy::MetaRange(RangeEnd::Start) => self.meta_range.0.map(|d| d.to_string()),
            Strategy::MetaRange(RangeEnd::End) => self.meta_range.1.map(|d| d.to_string()),
            Strategy::Title => self.title(),
            Strategy::Selector(selectors) => self.first_text(selectors),
            Strategy::Label(labels) => labels
                .iter()
                .find_map(|label| find_by_label(self.document, label)),
            Strategy::Url(key) => self.url_value(key),
            Strategy::TitleGrade => self.title().as_deref().and_then(grade_from_text),
        }
    }

    /// Raw text of the first strategy whose value is usable for the field's type.
    pub fn resolve(&mut self, field: Field) -> Option<String> {
        let field_kind = kind(field);
        let (strategy, value) = plan(field).iter().find_map(|strategy| {
            let value = self.attempt(*strategy)?;
            let usable = match field_kind {
                Kind::Text => !value.trim().is_empty(),
                Kind::Date => parse_single_date(&value).is_some(),
                Kind::Coordinate => parse_coordinate(&value).is_some(),
            };
            usable.then_some((*strategy, value))
        })?;
        debug!(?field, source = %strategy, "resolved field");
        self.sources.push((field, strategy));
        Some(value)
    }

    fn resolve_date(&mut self, field: Field) -> Option<NaiveDate> {
        self.resolve(field).as_deref().and_then(parse_single_date)
    }

    fn resolve_coordinate(&mut self, field: Field) -> Option<f64> {
        self.resolve(field).as_deref().and_then(parse_coordinate)
    }

    pub fn extract(mut self) -> ExtractedFields {
        let mut out = ExtractedFields {
            name: self.resolve(Field::Name),
            grade: self.resolve(Field::Grade).map(|g| g.to_ascii_uppercase()),
            category: self.resolve(Field::Category),
            gender: self.resolve(Field::Gender),
            surface: self.resolve(Field::Surface),
            start_date: self.resolve_date(Field::StartDate),
            end_date: self.resolve_date(Field::EndDate),
            qualifying_start: self.resolve_date(Field::QualifyingStart),
            qualifying_end: self.resolve_date(Field::QualifyingEnd),
            entry_deadline: self.resolve(Field::EntryDeadline),
            withdrawal_deadline: self.resolve(Field::WithdrawalDeadline),
            sign_in_main: self.resolve(Field::SignInMain),
            sign_in_qualifying: self.resolve(Field::SignInQualifying),
            first_qualifying_day: self.resolve(Field::FirstQualifyingDay),
            first_main_day: self.resolve(Field::FirstMainDay),
            city: self.resolve(Field::City),
            country_code: self.resolve(Field::CountryCode),
            country: self.resolve(Field::Country),
            venue_name: self.resolve(Field::VenueName),
            venue_address: self.resolve(Field::VenueAddress),
            venue_website: self.resolve(Field::VenueWebsite),
            latitude: self.resolve_coordinate(Field::Latitude),
            longitude: self.resolve_coordinate(Field::Longitude),
            director_name: self.resolve(Field::DirectorName),
            director_email: self.resolve(Field::DirectorEmail),
            official_ball: self.resolve(Field::OfficialBall),
            tournament_key: self.resolve(Field::TournamentKey),
            year: self.url.year,
            sources: Vec::new(),
        };
        out.sources = self.sources;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.itftennis.com/en/tournament/j60-antalya/tur/2025/m-jt-tur-2025-020/";

    fn extract(html: &str, url: &str) -> ExtractedFields {
        let document = Html::parse_document(html);
        FieldCascade::new(&document, url).extract()
    }

    #[test]
    fn structured_name_beats_og_title() {
        let fields = extract(
            r#"<html><head>
                <title>Page title</title>
                <meta property="og:title" content="Meta Name">
                <script type="application/ld+json">{"@type":"SportsEvent","name":"Structured Name"}</script>
            </head><body></body></html>"#,
            URL,
        );
        assert_eq!(fields.name.as_deref(), Some("Structured Name"));
        assert_eq!(
            fields.source_of(Field::Name),
            Some(Strategy::Structured(StructuredKey::Name))
        );
    }

    #[test]
    fn og_title_then_title_for_name() {
        let fields = extract(
            r#"<html><head><title>Page title</title><meta property="og:title" content=" Meta  Name "></head></html>"#,
            URL,
        );
        assert_eq!(fields.name.as_deref(), Some("Meta Name"));

        let fields = extract("<html><head><title>Only Title</title></head></html>", URL);
        assert_eq!(fields.name.as_deref(), Some("Only Title"));
    }

    #[test]
    fn meta_description_range_fills_dates_when_structured_has_none() {
        let fields = extract(
            r#"<html><head><meta name="description" content="Junior event, 12-18 June 2025, clay courts"></head>
               <body><span class="start-date">2025-01-01</span></body></html>"#,
            URL,
        );
        assert_eq!(fields.start_date, NaiveDate::from_ymd_opt(2025, 6, 12));
        assert_eq!(fields.end_date, NaiveDate::from_ymd_opt(2025, 6, 18));
    }

    #[test]
    fn unparseable_selector_date_falls_through_to_label() {
        let fields = extract(
            r#"<html><body>
                <span data-field="start-date">TBA</span>
                <dl><dt>Start Date:</dt><dd>14/07/2025</dd></dl>
            </body></html>"#,
            URL,
        );
        assert_eq!(fields.start_date, NaiveDate::from_ymd_opt(2025, 7, 14));
        assert_eq!(
            fields.source_of(Field::StartDate),
            Some(Strategy::Label(&["Start Date"]))
        );
    }

    #[test]
    fn selector_hooks_beat_url_slug() {
        let fields = extract(
            r#"<html><body>
                <div class="event-meta"><span class="grade">j100</span><span class="category">Juniors</span></div>
                <div class="event-location"><span class="city">Belek</span></div>
                <div class="event-surface"> Clay </div>
            </body></html>"#,
            URL,
        );
        assert_eq!(fields.grade.as_deref(), Some("J100"));
        assert_eq!(fields.category.as_deref(), Some("Juniors"));
        assert_eq!(fields.city.as_deref(), Some("Belek"));
        assert_eq!(fields.surface.as_deref(), Some("Clay"));
        assert_eq!(fields.country_code.as_deref(), Some("TUR"));
        assert!(fields.page_contributed());
    }

    #[test]
    fn grade_from_title_after_url() {
        let fields = extract(
            "<html><head><title>J30 Nairobi</title></head></html>",
            "https://example.org/events/nairobi",
        );
        assert_eq!(fields.grade.as_deref(), Some("J30"));
        assert_eq!(fields.source_of(Field::Grade), Some(Strategy::TitleGrade));
    }

    #[test]
    fn empty_document_resolves_only_from_url() {
        let fields = extract("", URL);
        assert_eq!(fields.name, None);
        assert_eq!(fields.grade.as_deref(), Some("J60"));
        assert_eq!(fields.city.as_deref(), Some("Antalya"));
        assert_eq!(fields.country_code.as_deref(), Some("TUR"));
        assert_eq!(fields.tournament_key.as_deref(), Some("m-jt-tur-2025-020"));
        assert_eq!(fields.year, Some(2025));
        assert!(!fields.page_contributed());
    }

    #[test]
    fn coordinates_from_place_metas() {
        let fields = extract(
            r#"<html><head>
                <meta property="place:location:latitude" content="36.8969">
                <meta property="place:location:longitude" content="not-a-number">
            </head></html>"#,
            URL,
        );
        assert_eq!(fields.latitude, Some(36.8969));
        assert_eq!(fields.longitude, None);
    }

    #[test]
    fn every_field_has_a_plan() {
        for field in [Field::Name, Field::CountryCode, Field::TournamentKey, Field::OfficialBall] {
            assert!(!plan(field).is_empty());
        }
    }
}
