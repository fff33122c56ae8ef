// ABOUTME: Runtime options for the Ariadne scraper and the ScraperBuilder fluent API.
// ABOUTME: Covers HTTP transport settings, address filtering, custom fetchers and custom pipe registries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::Scraper;
use crate::error::ScrapeError;
use crate::pipes::PipeRegistry;
use crate::resource::Fetcher;

/// Configuration options for the scraper.
#[derive(Clone)]
pub struct Options {
    /// Per-request HTTP timeout (traversal budgets are set per configuration).
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
    /// Pipe registry; the process-wide one when unset.
    pub registry: Option<Arc<PipeRegistry>>,
    /// Replaces the HTTP fetcher entirely; transport options are then unused.
    pub fetcher: Option<Arc<dyn Fetcher>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("allow_private_networks", &self.allow_private_networks)
            .field("headers", &self.headers)
            .field("custom_http_client", &self.http_client.is_some())
            .field("custom_registry", &self.registry.is_some())
            .field("custom_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "Ariadne/1.0".to_string(),
            allow_private_networks: false,
            http_client: None,
            headers: HashMap::new(),
            registry: None,
            fetcher: None,
        }
    }
}

/// Builder for constructing Scraper instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct ScraperBuilder {
    opts: Options,
}

impl ScraperBuilder {
    /// Create a new ScraperBuilder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a dedicated pipe registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<PipeRegistry>) -> Self {
        self.opts.registry = Some(registry);
        self
    }

    /// Fetch pages through `fetcher` instead of HTTP.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.opts.fetcher = Some(fetcher);
        self
    }

    /// Build the Scraper with the configured options.
    pub fn build(self) -> Result<Scraper, ScrapeError> {
        Scraper::new(self.opts)
    }
}
