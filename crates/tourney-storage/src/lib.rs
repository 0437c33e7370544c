//! HTTP fetch with block detection, browser render escalation and record persistence.

mod fetch;
mod render;
mod store;

pub use fetch::{
    detect_block, BrowserProfile, FetchError, FetchOutcome, FetcherConfig, PageFetcher,
    RawResponse, BLOCK_SIGNATURES, BLOCK_STATUSES, MAX_RENDER_BUDGET,
};
pub use render::{ChromeRenderer, RenderError, Renderer};
pub use store::{MemoryTournamentStore, PersistenceError, PgTournamentStore, TournamentStore};

pub const CRATE_NAME: &str = "tourney-storage";
