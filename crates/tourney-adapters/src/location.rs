//! City, grade and country signals carried by the tournament URL itself.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

use crate::countries::ISO3_COUNTRIES;

static GRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)j(\d{2,3})").expect("valid grade regex"));

static GRADE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[jJ]\d+$").expect("valid grade token regex"));

// `en`, `fr`, `en-gb`, `pt_BR`
static LOCALE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{2}([-_][a-zA-Z]{2})?$").expect("valid locale regex"));

const SLUG_MARKERS: [&str; 2] = ["tournament", "tournaments"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugParts {
    pub city: Option<String>,
    pub grade: Option<String>,
}

/// Splits a slug such as `j60-antalya` into its city and grade code.
pub fn decode_slug(segment: &str) -> SlugParts {
    let segment = segment.trim().trim_matches('/');
    let mut tokens: Vec<&str> = segment
        .split(['-', '_'])
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.first().is_some_and(|first| GRADE_TOKEN.is_match(first)) {
        tokens.remove(0);
    }
    let city = tokens
        .iter()
        .map(|token| title_case(token))
        .collect::<Vec<_>>()
        .join(" ");

    SlugParts {
        city: (!city.is_empty()).then_some(city),
        grade: grade_from_text(segment),
    }
}

/// First `j` + 2-3 digit code in the text, uppercased.
pub fn grade_from_text(text: &str) -> Option<String> {
    GRADE
        .captures(text)
        .map(|caps| format!("J{}", &caps[1]))
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// ISO 3166-1 alpha-3 code to its English short name.
pub fn country_name_from_code(iso3: &str) -> Option<&'static str> {
    let code = iso3.trim().to_ascii_uppercase();
    ISO3_COUNTRIES
        .binary_search_by(|(candidate, _)| (*candidate).cmp(code.as_str()))
        .ok()
        .map(|idx| ISO3_COUNTRIES[idx].1)
}

/// Everything recoverable from a `/…/tournament/<slug>/<iso3>/<year>/<key>/` path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub slug: Option<String>,
    pub city: Option<String>,
    pub grade: Option<String>,
    pub country_code: Option<String>,
    pub year: Option<i32>,
    pub tournament_key: Option<String>,
}

impl UrlParts {
    /// Unparseable URLs produce an empty value.
    pub fn parse(source_url: &str) -> Self {
        let Ok(url) = Url::parse(source_url) else {
            return Self::default();
        };
        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        Self::from_segments(&segments)
    }

    fn from_segments(segments: &[&str]) -> Self {
        let is_marker = |s: &str| SLUG_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m));
        let candidate = |s: &str| !is_marker(s) && !LOCALE_SEGMENT.is_match(s);

        let slug_idx = match segments.iter().position(|s| is_marker(*s)) {
            Some(marker) => Some(marker + 1)
                .filter(|idx| segments.get(*idx).is_some_and(|s| candidate(*s))),
            None => segments
                .iter()
                .position(|s| s.contains('-') && candidate(*s))
                .or_else(|| segments.len().checked_sub(1).filter(|idx| candidate(segments[*idx]))),
        };

        let Some(slug_idx) = slug_idx else {
            return Self::default();
        };
        let slug = segments[slug_idx];
        let SlugParts { city, grade } = decode_slug(slug);

        let rest = &segments[slug_idx + 1..];
        let country_code = rest
            .iter()
            .find(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()))
            .map(|s| s.to_ascii_uppercase());

        let year_idx = segments
            .iter()
            .position(|s| s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()));
        let year = year_idx.and_then(|idx| segments[idx].parse().ok());
        let tournament_key = year_idx
            .and_then(|idx| segments.get(idx + 1))
            .map(|s| s.to_string());

        Self {
            slug: Some(slug.to_string()),
            city,
            grade,
            country_code,
            year,
            tournament_key,
        }
    }
}
