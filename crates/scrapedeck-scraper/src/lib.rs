pub mod client;
pub mod error;
pub mod extract;
pub mod hidden_blob;
pub mod parse_helpers;
pub mod persist;
mod rate_limit;
pub mod registry;
pub mod rules;
pub mod summary;
pub mod types;
pub mod walker;
pub mod wikipedia;

pub use client::{FetchSettings, FetchedPage, Fetcher};
pub use error::ScraperError;
pub use extract::extract;
pub use persist::{artifact_path, save_result, timestamped_artifact_path};
pub use registry::{RegisteredSite, SearchSource, SiteRegistry};
pub use rules::CompiledSite;
pub use summary::{summarize, PriceRange, Summary, SummaryValue};
pub use types::{FieldValue, ListingRecord, SearchExtent, SearchResult};
pub use walker::{extract_page, ListingScraper, PageOutcome};
pub use wikipedia::WikipediaSource;
