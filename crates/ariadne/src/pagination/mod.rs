// ABOUTME: Pagination: strategy configuration, URL canonicalization and the traversal engine.
// ABOUTME: Next-link traversal follows links page by page; numbered pagination enumerates links on one page.

pub mod config;
pub mod engine;
pub mod normalize;

pub use config::{PaginationConfig, PaginationKind, DEFAULT_MAX_PAGES, DEFAULT_TIMEOUT};
pub use engine::Paginator;
pub use normalize::normalize_url;
