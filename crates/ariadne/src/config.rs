// ABOUTME: ScrapeConfig: an extraction pattern plus an optional pagination strategy.
// ABOUTME: validate() runs every configuration check up front, including strict alternative-selector compilation.

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::extractors::descriptor::Pattern;
use crate::pagination::PaginationConfig;

/// Everything needed to scrape one site: what to extract and how to page.
///
/// JSON shape:
///
/// ```json
/// {
///   "container": {"selector": "//div[@class='product']"},
///   "fields": [{"key": "name", "selector": ".//h2/text()", "alternatives": [".//h1/text()"]}],
///   "pagination": {"type": "next-link", "selector": "//a[@rel='next']/@href", "max_pages": 20}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(flatten)]
    pub pattern: Pattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,
}

impl ScrapeConfig {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Checks the pattern and the pagination strategy, compiling every
    /// alternative selector list.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        self.pattern.validate_strict()?;
        if let Some(pagination) = &self.pagination {
            pagination.validate_strict()?;
        }
        Ok(())
    }

    /// The pagination strategy, or a configuration error naming `op`.
    pub fn require_pagination(&self, op: &str) -> Result<&PaginationConfig, ScrapeError> {
        self.pagination
            .as_ref()
            .ok_or_else(|| ScrapeError::config(op, "no pagination configured"))
    }
}
