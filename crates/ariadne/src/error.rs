// ABOUTME: Error types for Ariadne: ErrorCode, ScrapeError, PipeError and PaginationError.
// ABOUTME: PaginationError carries the pages accumulated before a traversal failed.

use std::fmt;

use crate::result::{PageResult, Record};

/// Error codes representing different categories of scrape failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Fetch,
    Timeout,
    Ssrf,
    Config,
    Selector,
    Pipe,
    Extract,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Ssrf => "SSRF blocked",
            ErrorCode::Config => "configuration error",
            ErrorCode::Selector => "selector error",
            ErrorCode::Pipe => "pipe error",
            ErrorCode::Extract => "extraction error",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for scrape operations.
#[derive(Debug, thiserror::Error)]
pub struct ScrapeError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ariadne: {}", self.op)?;
        if !self.url.is_empty() {
            write!(f, " {}", self.url)?;
        }
        write!(f, ": {}", self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ScrapeError {
    fn with_code(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Fetch error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Fetch, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Timeout, url, op, source)
    }

    /// Create an SSRF error.
    pub fn ssrf(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Ssrf, url, op, source)
    }

    /// Create a configuration error. Configuration errors have no URL.
    pub fn config(op: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::with_code(
            ErrorCode::Config,
            String::new(),
            op,
            Some(anyhow::anyhow!("{}", message)),
        )
    }

    /// Create a Selector error (strict validation only; resolution is lenient).
    pub fn selector(
        expression: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        let expression = expression.into();
        let source = source.map(|e| e.context(format!("selector {:?}", expression)));
        Self::with_code(ErrorCode::Selector, String::new(), op, source)
    }

    /// Create an Extract error.
    pub fn extract(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Extract, url, op, source)
    }

    /// Attach the URL of the page being processed, keeping an existing one.
    pub fn at_url(mut self, url: impl Into<String>) -> Self {
        if self.url.is_empty() {
            self.url = url.into();
        }
        self
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an SSRF error.
    pub fn is_ssrf(&self) -> bool {
        self.code == ErrorCode::Ssrf
    }

    /// Returns true if this is a Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is a Config error.
    pub fn is_config(&self) -> bool {
        self.code == ErrorCode::Config
    }

    /// Returns true if this is a Selector error.
    pub fn is_selector(&self) -> bool {
        self.code == ErrorCode::Selector
    }

    /// Returns true if this is a Pipe error.
    pub fn is_pipe(&self) -> bool {
        self.code == ErrorCode::Pipe
    }

    /// Returns true if this is an Extract error.
    pub fn is_extract(&self) -> bool {
        self.code == ErrorCode::Extract
    }
}

/// Why a pipe invocation failed.
#[derive(Debug, thiserror::Error)]
pub enum PipeErrorKind {
    #[error("no pipe registered under this name")]
    Unknown,
    #[error(transparent)]
    Failed(anyhow::Error),
}

/// A failed pipe invocation, with everything needed to reproduce it.
#[derive(Debug, thiserror::Error)]
#[error("pipe {pipe:?} failed on input {input:?} with params {params:?}: {kind}")]
pub struct PipeError {
    pub pipe: String,
    pub input: String,
    pub params: Vec<String>,
    #[source]
    pub kind: PipeErrorKind,
}

impl PipeError {
    pub fn unknown(pipe: &str, input: &str, params: &[String]) -> Self {
        Self {
            pipe: pipe.to_string(),
            input: input.to_string(),
            params: params.to_vec(),
            kind: PipeErrorKind::Unknown,
        }
    }

    pub fn failed(pipe: &str, input: &str, params: &[String], source: anyhow::Error) -> Self {
        Self {
            pipe: pipe.to_string(),
            input: input.to_string(),
            params: params.to_vec(),
            kind: PipeErrorKind::Failed(source),
        }
    }

    /// Returns true if the pipe name was not registered.
    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, PipeErrorKind::Unknown)
    }
}

impl From<PipeError> for ScrapeError {
    fn from(err: PipeError) -> Self {
        ScrapeError::with_code(ErrorCode::Pipe, String::new(), "Pipe", Some(err.into()))
    }
}

/// A traversal that failed part-way, checkpointed at the last good page.
#[derive(Debug, thiserror::Error)]
#[error(
    "pagination failed on page {failing_page_number} ({failing_url}) after {total_scraped} items: {source}"
)]
pub struct PaginationError {
    pub failing_url: String,
    pub failing_page_number: usize,
    /// Pages completed before the failure, in visit order.
    pub partial_pages: Vec<PageResult>,
    /// Items of `partial_pages`, flattened in page order.
    pub partial_items: Vec<Record>,
    pub total_scraped: usize,
    #[source]
    pub source: ScrapeError,
}

impl PaginationError {
    pub fn new(
        failing_url: impl Into<String>,
        failing_page_number: usize,
        partial_pages: Vec<PageResult>,
        source: ScrapeError,
    ) -> Self {
        let partial_items: Vec<Record> = partial_pages
            .iter()
            .flat_map(|p| p.items.iter().cloned())
            .collect();
        let total_scraped = partial_items.len();
        Self {
            failing_url: failing_url.into(),
            failing_page_number,
            partial_pages,
            partial_items,
            total_scraped,
            source,
        }
    }
}
