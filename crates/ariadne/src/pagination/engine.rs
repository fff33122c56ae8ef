// ABOUTME: Sequential pagination traversal: fetch, extract, locate next link, repeat within bounds.
// ABOUTME: Bounded stops return PaginatedResults; fetch or extraction failures return PaginationError with partial pages.

//! Traversal engine.
//!
//! Key behaviors:
//! - Pages are processed strictly one after another; the next URL is only known
//!   once the current page has been extracted.
//! - The wall-clock budget is checked before every fetch; the page cap after
//!   every page that offers a way forward. Both end the run successfully with
//!   whatever was collected.
//! - A next link whose canonical form was already visited ends the run
//!   successfully (cycle detected).
//! - Any fetch, extraction or pipe failure ends the run with a
//!   [`PaginationError`] carrying every completed page.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use url::Url;

use crate::dom::{node_attribute, node_text, Document, Node};
use crate::error::{PaginationError, ScrapeError};
use crate::extractors::descriptor::Pattern;
use crate::extractors::records::Extractor;
use crate::extractors::select::resolve_with_fallback;
use crate::pagination::config::{PaginationConfig, PaginationKind};
use crate::pagination::normalize::normalize_url;
use crate::pipes::PipeContext;
use crate::resource::{FetchedPage, Fetcher};
use crate::result::{PageResult, PaginatedResults, Record, StopReason};

/// Drives multi-page scrapes over a [`Fetcher`].
///
/// Holds no per-run state; every call owns its own visited set, clock and
/// page list, so one paginator can serve concurrent traversals.
pub struct Paginator<'a> {
    fetcher: &'a dyn Fetcher,
    extractor: &'a Extractor,
}

impl<'a> Paginator<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, extractor: &'a Extractor) -> Self {
        Self { fetcher, extractor }
    }

    /// Walks the pages reachable from `start`.
    ///
    /// Next-link configurations follow links page by page. Numbered
    /// configurations scrape the start page and every enumerated page
    /// (see [`Paginator::scrape_numbered`]).
    pub async fn traverse(
        &self,
        start: &Url,
        pattern: &Pattern,
        config: &PaginationConfig,
    ) -> Result<PaginatedResults, PaginationError> {
        if config.kind == PaginationKind::Numbered {
            return self.scrape_numbered(start, pattern, config).await;
        }
        self.validate(pattern, config)
            .map_err(|e| PaginationError::new(start.as_str(), 1, Vec::new(), e))?;

        let started = Instant::now();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(normalize_url(start));
        let mut pages: Vec<PageResult> = Vec::new();
        let mut current = start.clone();

        let stop = loop {
            let page_number = pages.len() + 1;
            if started.elapsed() >= config.timeout {
                break StopReason::Timeout;
            }

            let fetched = match self.fetcher.fetch(&current).await {
                Ok(page) => page,
                Err(e) => return Err(PaginationError::new(current.as_str(), page_number, pages, e)),
            };
            visited.insert(normalize_url(&fetched.url));

            let (items, next) = match self.process_page(&fetched, pattern, config) {
                Ok(processed) => processed,
                Err(e) => return Err(PaginationError::new(current.as_str(), page_number, pages, e)),
            };
            tracing::info!(
                url = %fetched.url,
                page = page_number,
                items = items.len(),
                "scraped page"
            );
            pages.push(PageResult {
                url: fetched.url.to_string(),
                page_number,
                items,
                fetched_at: Utc::now(),
            });

            let Some(next) = next else {
                break StopReason::NoNextLink;
            };
            if !visited.insert(normalize_url(&next)) {
                tracing::info!(url = %next, "next link already visited, stopping");
                break StopReason::CycleDetected;
            }
            if pages.len() >= config.max_pages {
                break StopReason::MaxPages;
            }
            current = next;
        };

        Ok(finish(pages, stop, started))
    }

    /// Lists the page URLs linked from `start` (numbered pagination only).
    ///
    /// Links are resolved against the start page's final URL and deduplicated
    /// by canonical form, keeping first-seen order. The start page itself is
    /// not added unless it links to itself.
    pub async fn enumerate(&self, start: &Url, config: &PaginationConfig) -> Result<Vec<Url>, ScrapeError> {
        validate_numbered(config)?;
        self.extractor.check_pipes([config.pipes.as_slice()])?;
        let fetched = self.fetcher.fetch(start).await?;
        self.enumerate_page(&fetched, config)
    }

    /// Scrapes the start page, then every enumerated page not equal to it,
    /// in order, under the same page and time bounds as [`Paginator::traverse`].
    pub async fn scrape_numbered(
        &self,
        start: &Url,
        pattern: &Pattern,
        config: &PaginationConfig,
    ) -> Result<PaginatedResults, PaginationError> {
        self.validate(pattern, config)
            .and_then(|_| validate_numbered(config))
            .map_err(|e| PaginationError::new(start.as_str(), 1, Vec::new(), e))?;

        let started = Instant::now();
        let first = self
            .fetcher
            .fetch(start)
            .await
            .map_err(|e| PaginationError::new(start.as_str(), 1, Vec::new(), e))?;

        let (items, targets) = self
            .extract(&first, pattern)
            .and_then(|items| Ok((items, self.enumerate_page(&first, config)?)))
            .map_err(|e| PaginationError::new(start.as_str(), 1, Vec::new(), e))?;
        tracing::info!(url = %first.url, pages = targets.len(), "enumerated numbered pages");

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(normalize_url(start));
        seen.insert(normalize_url(&first.url));
        let mut pages = vec![PageResult {
            url: first.url.to_string(),
            page_number: 1,
            items,
            fetched_at: Utc::now(),
        }];

        let mut remaining = targets
            .into_iter()
            .filter(|url| !seen.contains(&normalize_url(url)))
            .peekable();

        let stop = loop {
            if remaining.peek().is_none() {
                break StopReason::Exhausted;
            }
            if pages.len() >= config.max_pages {
                break StopReason::MaxPages;
            }
            if started.elapsed() >= config.timeout {
                break StopReason::Timeout;
            }
            let Some(target) = remaining.next() else {
                break StopReason::Exhausted;
            };
            let page_number = pages.len() + 1;

            let fetched = match self.fetcher.fetch(&target).await {
                Ok(page) => page,
                Err(e) => return Err(PaginationError::new(target.as_str(), page_number, pages, e)),
            };
            let items = match self.extract(&fetched, pattern) {
                Ok(items) => items,
                Err(e) => return Err(PaginationError::new(target.as_str(), page_number, pages, e)),
            };
            tracing::info!(url = %fetched.url, page = page_number, items = items.len(), "scraped page");
            pages.push(PageResult {
                url: fetched.url.to_string(),
                page_number,
                items,
                fetched_at: Utc::now(),
            });
        };

        Ok(finish(pages, stop, started))
    }

    fn validate(&self, pattern: &Pattern, config: &PaginationConfig) -> Result<(), ScrapeError> {
        pattern.validate()?;
        config.validate()?;
        self.extractor.check_pipes(
            pattern
                .fields
                .iter()
                .map(|f| f.pipes.as_slice())
                .chain([config.pipes.as_slice()]),
        )
    }

    /// Extracts a page's records and locates its next link.
    ///
    /// The parsed document never outlives this call, so nothing borrowed from
    /// it is held across a fetch.
    fn process_page(
        &self,
        page: &FetchedPage,
        pattern: &Pattern,
        config: &PaginationConfig,
    ) -> Result<(Vec<Record>, Option<Url>), ScrapeError> {
        let doc = Document::parse(&page.body);
        let ctx = PipeContext::with_base_url(page.url.clone());
        let items = self.extractor.extract(&doc, pattern, &ctx)?;
        let next = self.link_targets(&doc, config, &ctx, &page.url, 1)?.into_iter().next();
        Ok((items, next))
    }

    fn extract(&self, page: &FetchedPage, pattern: &Pattern) -> Result<Vec<Record>, ScrapeError> {
        let doc = Document::parse(&page.body);
        let ctx = PipeContext::with_base_url(page.url.clone());
        self.extractor.extract(&doc, pattern, &ctx)
    }

    fn enumerate_page(&self, page: &FetchedPage, config: &PaginationConfig) -> Result<Vec<Url>, ScrapeError> {
        let doc = Document::parse(&page.body);
        let ctx = PipeContext::with_base_url(page.url.clone());
        let mut seen = HashSet::new();
        let targets = self
            .link_targets(&doc, config, &ctx, &page.url, usize::MAX)?
            .into_iter()
            .filter(|url| seen.insert(normalize_url(url)))
            .collect();
        Ok(targets)
    }

    /// Resolves the configured link selectors and turns matches into absolute
    /// URLs, in document order, stopping once `limit` targets are found. Blank
    /// and unresolvable values are skipped. Pipes never run on matches past the limit.
    fn link_targets(
        &self,
        doc: &Document,
        config: &PaginationConfig,
        ctx: &PipeContext,
        base: &Url,
        limit: usize,
    ) -> Result<Vec<Url>, ScrapeError> {
        let nodes = resolve_with_fallback(&config.selector, &config.alternatives, doc.root());
        let mut targets = Vec::new();
        for node in nodes {
            if targets.len() >= limit {
                break;
            }
            let raw = link_value(node);
            let value = self
                .extractor
                .registry()
                .apply(&config.pipes, &raw, ctx)
                .map_err(|e| ScrapeError::from(e).at_url(base.as_str()))?
                .to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match base.join(value) {
                Ok(url) => targets.push(url),
                Err(e) => tracing::warn!(link = value, base = %base, error = %e, "ignoring unresolvable page link"),
            }
        }
        Ok(targets)
    }
}

/// The raw value of a link node: `href` for elements that carry one, text otherwise.
fn link_value(node: Node<'_>) -> String {
    node_attribute(node, "href").unwrap_or_else(|| node_text(node))
}

fn validate_numbered(config: &PaginationConfig) -> Result<(), ScrapeError> {
    if config.kind != PaginationKind::Numbered {
        return Err(ScrapeError::config(
            "Enumerate",
            format!("page enumeration needs numbered pagination, got {}", config.kind),
        ));
    }
    config.validate()
}

fn finish(pages: Vec<PageResult>, stop: StopReason, started: Instant) -> PaginatedResults {
    let results = PaginatedResults::new(pages, stop);
    tracing::info!(
        pages = results.total_pages,
        items = results.total_items,
        stop = %stop,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pagination finished"
    );
    results
}
