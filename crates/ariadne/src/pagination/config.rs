// ABOUTME: Pagination strategy configuration: next-link or numbered, selectors, pipes and bounds.
// ABOUTME: Timeouts accept seconds or duration strings like "10m"; defaults are 100 pages and 10 minutes.

use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ScrapeError;
use crate::extractors::descriptor::{compile_all, one_or_many, validate_selector_list};
use crate::pipes::PipeInvocation;

/// Default cap on pages visited by one traversal.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Default wall-clock budget for one traversal.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How further pages are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationKind {
    /// Follow a "next page" link from each page to the next.
    #[default]
    #[serde(alias = "next_link", alias = "next")]
    NextLink,
    /// Collect every page link present on the start page.
    #[serde(alias = "numbers")]
    Numbered,
}

impl fmt::Display for PaginationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationKind::NextLink => f.write_str("next-link"),
            PaginationKind::Numbered => f.write_str("numbered"),
        }
    }
}

/// Pagination configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: PaginationKind,
    /// Next-link selectors (next-link) or page-link selectors (numbered).
    #[serde(default, alias = "selectors", deserialize_with = "one_or_many")]
    pub selector: Vec<String>,
    #[serde(default, alias = "alternative_selectors", deserialize_with = "one_or_many")]
    pub alternatives: Vec<String>,
    /// Applied to each matched link value before URL resolution.
    #[serde(default)]
    pub pipes: Vec<PipeInvocation>,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(
        default = "default_timeout",
        deserialize_with = "deserialize_timeout",
        serialize_with = "serialize_timeout"
    )]
    pub timeout: Duration,
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl PaginationConfig {
    /// Next-link pagination following `selector`.
    pub fn next_link(selector: impl Into<String>) -> Self {
        Self {
            kind: PaginationKind::NextLink,
            selector: vec![selector.into()],
            alternatives: Vec::new(),
            pipes: Vec::new(),
            max_pages: DEFAULT_MAX_PAGES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Numbered pagination collecting links matched by `selector`.
    pub fn numbered(selector: impl Into<String>) -> Self {
        Self {
            kind: PaginationKind::Numbered,
            ..Self::next_link(selector)
        }
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pipe(mut self, pipe: PipeInvocation) -> Self {
        self.pipes.push(pipe);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        let owner = format!("{} pagination", self.kind);
        validate_selector_list(&self.selector, &owner)?;
        if self.max_pages == 0 {
            return Err(ScrapeError::config(
                "Validate",
                "pagination max_pages must be positive",
            ));
        }
        if self.timeout.is_zero() {
            return Err(ScrapeError::config(
                "Validate",
                "pagination timeout must be positive",
            ));
        }
        Ok(())
    }

    /// [`PaginationConfig::validate`] plus compilation of every alternative selector.
    pub fn validate_strict(&self) -> Result<(), ScrapeError> {
        self.validate()?;
        compile_all(&self.alternatives)
    }
}

/// Accepts a number of seconds (`600`, `1.5`) or a duration string (`"10m"`, `"90s"`, `"600"`).
fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct TimeoutVisitor;

    impl<'de> Visitor<'de> for TimeoutVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number of seconds or a duration string such as \"10m\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("timeout must not be negative, got {}", v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Duration, E> {
            Duration::try_from_secs_f64(v)
                .map_err(|_| E::custom(format!("invalid timeout {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse_timeout(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(TimeoutVisitor)
}

fn serialize_timeout<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(timeout.as_secs_f64())
}

/// Parses a timeout string. Bare numbers are seconds.
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty timeout".to_string());
    }
    if let Ok(secs) = trimmed.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid timeout {:?}", s));
    }
    parse_duration::parse(trimmed).map_err(|e| format!("invalid timeout {:?}: {}", s, e))
}
