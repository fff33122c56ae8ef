// ABOUTME: Main library entry point for Ariadne, a declarative pattern scraper with pagination.
// ABOUTME: Re-exports the public API: Scraper, configurations, descriptors, pipes, results and errors.

//! Ariadne - declarative record extraction from HTML/XML pages.
//!
//! Callers describe *what* to extract: XPath selectors with fallbacks, an
//! optional repeating container, how multiple matches combine, a chain of
//! named pipes that normalize each value, and optionally how to page through a
//! listing. Ariadne resolves the selectors, runs the pipes and walks the pages.
//!
//! # Example
//!
//! ```no_run
//! use digests_ariadne::{load_config_str, Scraper, PaginationError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PaginationError> {
//!     let config = load_config_str(r#"{
//!         "container": {"selector": "//div[@class='product']"},
//!         "fields": [{"key": "name", "selector": ".//h2/text()", "alternatives": [".//h1/text()"]}],
//!         "pagination": {"type": "next-link", "selector": "//a[@rel='next']/@href"}
//!     }"#).expect("valid config");
//!     let scraper = Scraper::builder().build().expect("HTTP client");
//!     let results = scraper.traverse("https://example.com/products", &config).await?;
//!     println!("{} items over {} pages", results.total_items, results.total_pages);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod options;
pub mod pagination;
pub mod pipes;
pub mod resource;
pub mod result;

pub use crate::client::Scraper;
pub use crate::config::ScrapeConfig;
pub use crate::dom::Document;
pub use crate::error::{ErrorCode, PaginationError, PipeError, PipeErrorKind, ScrapeError};
pub use crate::extractors::loader::{load_config_file, load_config_str};
pub use crate::extractors::{
    extract_records, ContainerDescriptor, ContentMode, Extractor, FieldDescriptor, Multiplicity,
    Pattern,
};
pub use crate::options::{Options, ScraperBuilder};
pub use crate::pagination::{normalize_url, PaginationConfig, PaginationKind, Paginator};
pub use crate::pipes::{
    global_registry, register_pipe, Pipe, PipeContext, PipeInvocation, PipeRegistry,
};
pub use crate::resource::{FetchedPage, Fetcher, HttpFetcher};
pub use crate::result::{FieldValue, PageResult, PaginatedResults, Record, StopReason, Value};
