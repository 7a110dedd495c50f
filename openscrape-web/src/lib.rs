//! Fetch-side core of openscrape.
//!
//! - [`admission`]: SSRF admission gate, consulted before any fetch
//! - [`snapshot`]: owned, cloneable model of a loaded page
//! - [`extract`]: sanitization pipeline (noise removal, attribute scrubbing)
//! - [`normalize`]: whitespace compaction of the serialized result
//! - [`browser`]: page-capture trait and its fantoccini-backed implementation
//! - [`scrape`]: the request pipeline tying the above together
//!
//! The gate never sees page content and the pipeline never sees the URL, so
//! each can be tested on its own.

pub mod admission;
pub mod browser;
pub mod extract;
pub mod normalize;
pub mod scrape;
pub mod snapshot;

pub use admission::{AdmissionVerdict, DenialReason, assess};
pub use extract::{CleanedDocument, ExtractError, ExtractionConfig, RemoveClassNames, extract_text};
pub use scrape::{ScrapeError, ScrapeOptions, ScrapeResult, Scraper};
pub use snapshot::DocumentSnapshot;
