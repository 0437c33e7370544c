//! Field extraction for tournament pages: structured data, metas, selector
//! hooks, labelled text and URL slug, assembled into a `TournamentRecord`.

mod builder;
mod cascade;
mod countries;
mod dates;
mod jsonld;
mod labels;
mod location;

use scraper::Html;
use tourney_core::{FetchPath, TournamentRecord};
use tracing::debug;

pub use builder::{build_record, provenance_note, synthesize_name};
pub use cascade::{plan, ExtractedFields, Field, FieldCascade, RangeEnd, Strategy, StructuredKey, UrlKey};
pub use dates::{extract_date_range, month_from_name, parse_single_date};
pub use jsonld::{read_structured_event, StructuredEvent};
pub use labels::find_by_label;
pub use location::{country_name_from_code, decode_slug, grade_from_text, SlugParts, UrlParts};

pub const CRATE_NAME: &str = "tourney-adapters";

/// Runs the full cascade over `html` and builds the record for `source_url`.
///
/// Total: an empty or garbage document still yields a record with a name and source link.
pub fn extract_record(html: &str, source_url: &str, path: &FetchPath) -> TournamentRecord {
    let document = Html::parse_document(html);
    let fields = FieldCascade::new(&document, source_url).extract();
    debug!(
        url = source_url,
        resolved = fields.sources.len(),
        page_contributed = fields.page_contributed(),
        "cascade finished"
    );
    build_record(fields, source_url, path)
}
