// ABOUTME: Page fetching: the Fetcher seam used by traversal and its reqwest-backed implementation.
// ABOUTME: HttpFetcher adds SSRF protection, content-length limits, status checks and charset decoding.

use std::collections::HashMap;
use std::net::IpAddr;

use futures::future::BoxFuture;
use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use url::Url;

use crate::error::ScrapeError;

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// A fetched page: the URL it was finally served from, and its decoded body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects; relative links on the page resolve against it.
    pub url: Url,
    pub body: String,
}

/// Retrieves page content for the extraction and traversal engines.
///
/// Implementations apply their own transport policy (timeouts, retries,
/// address filtering). Any error is final for that fetch.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedPage, ScrapeError>>;
}

/// Fetcher over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HashMap<String, String>,
    allow_private_networks: bool,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            headers: HashMap::new(),
            allow_private_networks: false,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.allow_private_networks = allow;
        self
    }

    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, ScrapeError> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ScrapeError::invalid_url(
                url.as_str(),
                "Fetch",
                Some(anyhow::anyhow!("scheme must be http or https")),
            ));
        }

        if !self.allow_private_networks {
            guard_host(url, url, "private IP addresses are not allowed").await?;
        }

        let mut request = self.client.get(url.clone());
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::timeout(url.as_str(), "Fetch", Some(anyhow::anyhow!("request timed out: {}", e)))
            } else {
                ScrapeError::fetch(url.as_str(), "Fetch", Some(anyhow::anyhow!("request failed: {}", e)))
            }
        })?;

        // The redirect target gets the same address check as the request URL.
        let final_url = response.url().clone();
        if !self.allow_private_networks && final_url != *url {
            guard_host(url, &final_url, "redirect to private IP address is not allowed").await?;
        }

        let content_length = response.content_length().or_else(|| {
            response
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        });
        if let Some(len) = content_length {
            if len as usize > MAX_CONTENT_LENGTH {
                return Err(ScrapeError::fetch(
                    url.as_str(),
                    "Fetch",
                    Some(anyhow::anyhow!("content too large")),
                ));
            }
        }

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = response.bytes().await.map_err(|e| {
            ScrapeError::fetch(
                url.as_str(),
                "Fetch",
                Some(anyhow::anyhow!("failed to read body: {}", e)),
            )
        })?;
        if body.len() > MAX_CONTENT_LENGTH {
            return Err(ScrapeError::fetch(
                url.as_str(),
                "Fetch",
                Some(anyhow::anyhow!("content too large")),
            ));
        }

        if status != 200 {
            return Err(ScrapeError::fetch(
                url.as_str(),
                "Fetch",
                Some(anyhow::anyhow!("HTTP status {}", status)),
            ));
        }

        tracing::debug!(url = %url, final_url = %final_url, bytes = body.len(), "fetched page");
        Ok(FetchedPage {
            url: final_url,
            body: decode_body(&body, content_type.as_deref()),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedPage, ScrapeError>> {
        Box::pin(self.fetch_page(url))
    }
}

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "169.254.0.0/16",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Check if an IP address is in a private/reserved range.
pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => PRIVATE_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => ip.is_loopback() || PRIVATE_V6.iter().any(|net| net.contains(ip)),
    }
}

/// Rejects `target` if its host is, or resolves to, a private address.
/// Errors are reported against `requested`, the URL the caller asked for.
async fn guard_host(requested: &Url, target: &Url, reason: &str) -> Result<(), ScrapeError> {
    let host = match target.host() {
        Some(url::Host::Ipv4(ip)) => return check_ip(requested, IpAddr::V4(ip), reason),
        Some(url::Host::Ipv6(ip)) => return check_ip(requested, IpAddr::V6(ip), reason),
        Some(url::Host::Domain(host)) => host,
        None => return Ok(()),
    };

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        ScrapeError::fetch(
            requested.as_str(),
            "Fetch",
            Some(anyhow::anyhow!("DNS lookup failed for {}: {}", host, e)),
        )
    })?;
    for socket_addr in addrs {
        check_ip(requested, socket_addr.ip(), reason)?;
    }
    Ok(())
}

fn check_ip(requested: &Url, ip: IpAddr, reason: &str) -> Result<(), ScrapeError> {
    if is_private_ip(&ip) {
        return Err(ScrapeError::ssrf(
            requested.as_str(),
            "Fetch",
            Some(anyhow::anyhow!("{}", reason)),
        ));
    }
    Ok(())
}

/// Decode body bytes to a String using charset from content-type header or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    lower.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|charset| charset.trim_matches('"').trim_matches('\'').to_string())
    })
}
