// ABOUTME: The Scraper facade: wires options, fetcher, pipe registry and extractor together.
// ABOUTME: Provides single-page scrape/scrape_html plus traverse, enumerate_pages and scrape_numbered.

use std::sync::Arc;

use url::Url;

use crate::config::ScrapeConfig;
use crate::dom::Document;
use crate::error::{PaginationError, ScrapeError};
use crate::extractors::records::Extractor;
use crate::options::{Options, ScraperBuilder};
use crate::pagination::Paginator;
use crate::pipes::{global_registry, PipeContext, PipeRegistry};
use crate::resource::{is_private_ip, Fetcher, HttpFetcher};
use crate::result::{PaginatedResults, Record};

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// Scrapes pages with declarative configurations.
pub struct Scraper {
    opts: Options,
    fetcher: Arc<dyn Fetcher>,
    extractor: Extractor,
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("opts", &self.opts)
            .field("extractor", &self.extractor)
            .finish()
    }
}

impl Scraper {
    /// Create a new ScraperBuilder for configuring the scraper.
    pub fn builder() -> ScraperBuilder {
        ScraperBuilder::new()
    }

    /// Create a new Scraper with the given options.
    pub fn new(opts: Options) -> Result<Self, ScrapeError> {
        let fetcher: Arc<dyn Fetcher> = match &opts.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => {
                let client = match &opts.http_client {
                    Some(client) => client.clone(),
                    None => build_http_client(&opts)?,
                };
                Arc::new(
                    HttpFetcher::new(client)
                        .with_headers(opts.headers.clone())
                        .allow_private_networks(opts.allow_private_networks),
                )
            }
        };
        let registry: Arc<PipeRegistry> = opts.registry.clone().unwrap_or_else(global_registry);

        Ok(Self {
            opts,
            fetcher,
            extractor: Extractor::new(registry),
        })
    }

    /// The pipe registry used by this scraper.
    pub fn registry(&self) -> &Arc<PipeRegistry> {
        self.extractor.registry()
    }

    /// Fetches `url` and extracts records from that single page.
    pub async fn scrape(&self, url: &str, config: &ScrapeConfig) -> Result<Vec<Record>, ScrapeError> {
        let parsed = parse_url(url, "Scrape")?;
        config.validate()?;
        let page = self.fetcher.fetch(&parsed).await?;
        self.extract_page(&page.body, page.url, config)
    }

    /// Extracts records from already retrieved markup; `url` is the page
    /// address used to resolve relative links.
    pub fn scrape_html(&self, html: &str, url: &str, config: &ScrapeConfig) -> Result<Vec<Record>, ScrapeError> {
        if html.trim().is_empty() {
            return Err(ScrapeError::extract(
                url,
                "ScrapeHTML",
                Some(anyhow::anyhow!("empty HTML")),
            ));
        }
        let parsed = parse_url(url, "ScrapeHTML")?;
        config.validate()?;
        self.extract_page(html, parsed, config)
    }

    /// Follows the configured pagination from `url`.
    pub async fn traverse(&self, url: &str, config: &ScrapeConfig) -> Result<PaginatedResults, PaginationError> {
        let (start, pagination) = prepare(url, config, "Traverse")?;
        Paginator::new(self.fetcher.as_ref(), &self.extractor)
            .traverse(&start, &config.pattern, pagination)
            .await
    }

    /// Lists the page URLs linked from `url` under numbered pagination.
    pub async fn enumerate_pages(&self, url: &str, config: &ScrapeConfig) -> Result<Vec<Url>, ScrapeError> {
        let start = parse_url(url, "Enumerate")?;
        config.validate()?;
        let pagination = config.require_pagination("Enumerate")?;
        Paginator::new(self.fetcher.as_ref(), &self.extractor)
            .enumerate(&start, pagination)
            .await
    }

    /// Scrapes `url` and every page it enumerates under numbered pagination.
    pub async fn scrape_numbered(
        &self,
        url: &str,
        config: &ScrapeConfig,
    ) -> Result<PaginatedResults, PaginationError> {
        let (start, pagination) = prepare(url, config, "ScrapeNumbered")?;
        Paginator::new(self.fetcher.as_ref(), &self.extractor)
            .scrape_numbered(&start, &config.pattern, pagination)
            .await
    }

    fn extract_page(&self, html: &str, url: Url, config: &ScrapeConfig) -> Result<Vec<Record>, ScrapeError> {
        let doc = Document::parse(html);
        let ctx = PipeContext::with_base_url(url);
        self.extractor.extract(&doc, &config.pattern, &ctx)
    }
}

/// Validates inputs shared by the traversal entry points. Failures are
/// reported as a pagination failure on page 1 with nothing collected.
fn prepare<'c>(
    url: &str,
    config: &'c ScrapeConfig,
    op: &str,
) -> Result<(Url, &'c crate::pagination::PaginationConfig), PaginationError> {
    let checked = parse_url(url, op).and_then(|start| {
        config.validate()?;
        let pagination = config.require_pagination(op)?;
        Ok((start, pagination))
    });
    checked.map_err(|e| PaginationError::new(url, 1, Vec::new(), e))
}

fn parse_url(url: &str, op: &str) -> Result<Url, ScrapeError> {
    if url.is_empty() {
        return Err(ScrapeError::invalid_url(url, op, None));
    }
    Url::parse(url).map_err(|e| {
        ScrapeError::invalid_url(url, op, Some(anyhow::anyhow!("malformed URL: {}", e)))
    })
}

/// Builds the default HTTP client. Redirects to literal private addresses are
/// refused here; hostnames are checked by the fetcher once the final URL is known.
fn build_http_client(opts: &Options) -> Result<reqwest::Client, ScrapeError> {
    let allow_private = opts.allow_private_networks;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if !allow_private {
            let private = match attempt.url().host() {
                Some(url::Host::Ipv4(ip)) => is_private_ip(&ip.into()),
                Some(url::Host::Ipv6(ip)) => is_private_ip(&ip.into()),
                _ => false,
            };
            if private {
                return attempt.error("redirect to private IP blocked");
            }
        }
        attempt.follow()
    });

    reqwest::Client::builder()
        .redirect(redirect_policy)
        .user_agent(&opts.user_agent)
        .timeout(opts.timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| {
            ScrapeError::config(
                "BuildClient",
                format!("failed to build HTTP client: {}", e),
            )
        })
}
