//! Cascade output to canonical record.

use chrono::Datelike;
use tourney_core::{FetchPath, TournamentRecord, FALLBACK_NAME};

use crate::cascade::ExtractedFields;
use crate::location::country_name_from_code;

/// `"ITF"` followed by whichever of grade and city are known.
pub fn synthesize_name(grade: Option<&str>, city: Option<&str>) -> String {
    std::iter::once(FALLBACK_NAME)
        .chain(grade)
        .chain(city)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn provenance_note(source_url: &str, path: &FetchPath, page_contributed: bool) -> String {
    let mut note = format!("Scraped from {source_url} via {path}");
    if !page_contributed {
        note.push_str("; url-only");
    }
    note
}

fn looks_like_iso3(text: &str) -> bool {
    text.len() == 3 && text.chars().all(|c| c.is_ascii_alphabetic())
}

/// Never fails; missing signals stay `None`.
pub fn build_record(fields: ExtractedFields, source_url: &str, path: &FetchPath) -> TournamentRecord {
    let page_contributed = fields.page_contributed();

    let name = fields
        .name
        .clone()
        .unwrap_or_else(|| synthesize_name(fields.grade.as_deref(), fields.city.as_deref()));

    // Structured markup sometimes carries the alpha-3 code where a display name belongs.
    let mut country_code = fields.country_code;
    let mut country = fields.country;
    let promoted = country
        .as_deref()
        .filter(|c| looks_like_iso3(c))
        .and_then(|code| country_name_from_code(code).map(|name| (code.to_ascii_uppercase(), name)));
    if let Some((code, name)) = promoted {
        country_code.get_or_insert(code);
        country = Some(name.to_string());
    }
    if country.is_none() {
        country = country_code
            .as_deref()
            .and_then(country_name_from_code)
            .map(str::to_string);
    }

    TournamentRecord {
        name,
        grade: fields.grade,
        category: fields.category,
        gender: fields.gender,
        surface: fields.surface,
        year: fields.year.or_else(|| fields.start_date.map(|d| d.year())),
        start_date: fields.start_date,
        end_date: fields.end_date,
        qualifying_start: fields.qualifying_start,
        qualifying_end: fields.qualifying_end,
        entry_deadline: fields.entry_deadline,
        withdrawal_deadline: fields.withdrawal_deadline,
        sign_in_main: fields.sign_in_main,
        sign_in_qualifying: fields.sign_in_qualifying,
        first_qualifying_day: fields.first_qualifying_day,
        first_main_day: fields.first_main_day,
        city: fields.city,
        country_code,
        country,
        venue_name: fields.venue_name,
        venue_address: fields.venue_address,
        venue_website: fields.venue_website,
        latitude: fields.latitude,
        longitude: fields.longitude,
        tournament_director_name: fields.director_name,
        tournament_director_email: fields.director_email,
        official_ball: fields.official_ball,
        tournament_key: fields.tournament_key,
        source_link: source_url.to_string(),
        notes: Some(provenance_note(source_url, path, page_contributed)),
    }
}
