// ABOUTME: Integration tests for traversal over a scripted in-memory fetcher.
// ABOUTME: Covers stop reasons, partial results on failure, cycle detection, page caps, time budgets and numbered pages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use digests_ariadne::{
    ContainerDescriptor, FetchedPage, Fetcher, FieldDescriptor, PaginationConfig,
    Pattern, PipeInvocation, ScrapeConfig, ScrapeError, Scraper, StopReason,
};
use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use url::Url;

const BASE: &str = "https://shop.test/list";

enum Reply {
    Page { final_url: Option<String>, body: String },
    Fail,
}

/// Serves canned pages by exact URL and records every fetch.
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, Reply>,
    delay: Option<Duration>,
    log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), Reply::Page { final_url: None, body });
        self
    }

    fn redirect(mut self, url: &str, final_url: &str, body: String) -> Self {
        self.pages.insert(
            url.to_string(),
            Reply::Page {
                final_url: Some(final_url.to_string()),
                body,
            },
        );
        self
    }

    fn fail(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Reply::Fail);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedPage, ScrapeError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.pages.get(url.as_str()) {
                Some(Reply::Page { final_url, body }) => Ok(FetchedPage {
                    url: match final_url {
                        Some(u) => Url::parse(u).unwrap(),
                        None => url.clone(),
                    },
                    body: body.clone(),
                }),
                Some(Reply::Fail) => Err(ScrapeError::fetch(
                    url.as_str(),
                    "Fetch",
                    Some(anyhow::anyhow!("connection reset by peer")),
                )),
                None => Err(ScrapeError::fetch(
                    url.as_str(),
                    "Fetch",
                    Some(anyhow::anyhow!("HTTP status 404")),
                )),
            }
        })
    }
}

fn page_url(n: usize) -> String {
    format!("{}?page={}", BASE, n)
}

fn listing(items: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><ul>");
    for item in items {
        html.push_str(&format!("<li class=\"item\">{}</li>", item));
    }
    html.push_str("</ul>");
    if let Some(next) = next {
        html.push_str(&format!("<a rel=\"next\" href=\"{}\">Next</a>", next));
    }
    html.push_str("</body></html>");
    html
}

fn pattern() -> Pattern {
    Pattern::new(vec![FieldDescriptor::new("name", "./text()")])
        .with_container(ContainerDescriptor::new("//li[@class='item']"))
}

fn next_link_config() -> ScrapeConfig {
    ScrapeConfig::new(pattern()).with_pagination(PaginationConfig::next_link("//a[@rel='next']/@href"))
}

fn scraper(fetcher: &Arc<ScriptedFetcher>) -> Scraper {
    let fetcher: Arc<dyn Fetcher> = fetcher.clone();
    Scraper::builder().fetcher(fetcher).build().unwrap()
}

fn names<'a>(records: impl Iterator<Item = &'a digests_ariadne::Record>) -> Vec<String> {
    records
        .map(|r| r["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// A chain of `count` pages, each linking to the next one.
fn endless_chain(count: usize) -> ScriptedFetcher {
    (1..=count).fold(ScriptedFetcher::default(), |fetcher, n| {
        let item = format!("item-{}", n);
        let next = format!("?page={}", n + 1);
        fetcher.page(&page_url(n), listing(&[item.as_str()], Some(next.as_str())))
    })
}

#[tokio::test]
async fn stops_when_last_page_has_no_next_link() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(&page_url(1), listing(&["a", "b"], Some("?page=2")))
            .page(&page_url(2), listing(&["c", "d", "e"], Some("/list?page=3")))
            .page(&page_url(3), listing(&["f"], None)),
    );

    let results = scraper(&fetcher)
        .traverse(&page_url(1), &next_link_config())
        .await
        .unwrap();

    assert_eq!(results.total_pages, 3);
    assert_eq!(results.total_items, 6);
    assert_eq!(results.stop_reason, StopReason::NoNextLink);
    assert!(!results.is_truncated());
    assert_eq!(names(results.items()), vec!["a", "b", "c", "d", "e", "f"]);
    let numbers: Vec<usize> = results.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(fetcher.fetched(), vec![page_url(1), page_url(2), page_url(3)]);
}

#[tokio::test]
async fn fetch_failure_keeps_earlier_pages() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(&page_url(1), listing(&["a", "b"], Some("?page=2")))
            .fail(&page_url(2)),
    );

    let err = scraper(&fetcher)
        .traverse(&page_url(1), &next_link_config())
        .await
        .unwrap_err();

    assert_eq!(err.failing_page_number, 2);
    assert_eq!(err.failing_url, page_url(2));
    assert_eq!(err.total_scraped, 2);
    assert_eq!(err.partial_pages.len(), 1);
    assert_eq!(names(err.partial_items.iter()), vec!["a", "b"]);
    assert!(err.source.is_fetch());
}

#[tokio::test]
async fn extraction_failure_on_a_later_page_is_a_pagination_error() {
    let config = ScrapeConfig::new(
        Pattern::new(vec![
            FieldDescriptor::new("name", "./text()").with_pipe(PipeInvocation::new("int")),
        ])
        .with_container(ContainerDescriptor::new("//li[@class='item']")),
    )
    .with_pagination(PaginationConfig::next_link("//a[@rel='next']/@href"));
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(&page_url(1), listing(&["1", "2"], Some("?page=2")))
            .page(&page_url(2), listing(&["three"], None)),
    );

    let err = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap_err();
    assert_eq!(err.failing_page_number, 2);
    assert_eq!(err.total_scraped, 2);
    assert!(err.source.is_pipe());
}

#[tokio::test]
async fn failure_on_first_page_has_no_partial_results() {
    let fetcher = Arc::new(ScriptedFetcher::default().fail(&page_url(1)));
    let err = scraper(&fetcher)
        .traverse(&page_url(1), &next_link_config())
        .await
        .unwrap_err();
    assert_eq!(err.failing_page_number, 1);
    assert!(err.partial_pages.is_empty());
    assert_eq!(err.total_scraped, 0);
}

#[tokio::test]
async fn link_back_to_a_visited_page_ends_the_run() {
    // Page 2 links back to page 1 with a fragment and reordered query.
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(
                "https://shop.test/list?page=1&sort=new",
                listing(&["a"], Some("/list?sort=new&page=2")),
            )
            .page(
                "https://shop.test/list?sort=new&page=2",
                listing(&["b"], Some("/list?sort=new&page=1#top")),
            ),
    );

    let results = scraper(&fetcher)
        .traverse("https://shop.test/list?page=1&sort=new", &next_link_config())
        .await
        .unwrap();

    assert_eq!(results.stop_reason, StopReason::CycleDetected);
    assert_eq!(results.total_pages, 2);
    assert_eq!(fetcher.fetched().len(), 2);
}

#[tokio::test]
async fn self_link_is_a_cycle() {
    let fetcher = Arc::new(
        ScriptedFetcher::default().page(&page_url(1), listing(&["only"], Some("?page=1"))),
    );
    let results = scraper(&fetcher)
        .traverse(&page_url(1), &next_link_config())
        .await
        .unwrap();
    assert_eq!(results.stop_reason, StopReason::CycleDetected);
    assert_eq!(results.total_pages, 1);
}

#[tokio::test]
async fn page_cap_is_exact() {
    let fetcher = Arc::new(endless_chain(20));
    let mut config = next_link_config();
    if let Some(pagination) = config.pagination.as_mut() {
        pagination.max_pages = 5;
    }

    let results = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap();

    assert_eq!(results.stop_reason, StopReason::MaxPages);
    assert!(results.is_truncated());
    assert_eq!(results.total_pages, 5);
    assert_eq!(fetcher.fetched().len(), 5);
    assert_eq!(names(results.items()).last().map(String::as_str), Some("item-5"));
}

#[tokio::test]
async fn default_page_cap_is_one_hundred() {
    let fetcher = Arc::new(endless_chain(150));
    let results = scraper(&fetcher)
        .traverse(&page_url(1), &next_link_config())
        .await
        .unwrap();
    assert_eq!(results.stop_reason, StopReason::MaxPages);
    assert_eq!(results.total_pages, 100);
    assert_eq!(fetcher.fetched().len(), 100);
}

#[tokio::test]
async fn cap_is_not_reported_when_pages_run_out_first() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(&page_url(1), listing(&["a"], Some("?page=2")))
            .page(&page_url(2), listing(&["b"], None)),
    );
    let config = ScrapeConfig::new(pattern())
        .with_pagination(PaginationConfig::next_link("//a[@rel='next']/@href").with_max_pages(2));
    let results = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap();
    assert_eq!(results.stop_reason, StopReason::NoNextLink);
    assert_eq!(results.total_pages, 2);
}

#[tokio::test]
async fn time_budget_stops_before_the_next_fetch() {
    let fetcher = Arc::new(endless_chain(50).with_delay(Duration::from_millis(40)));
    let config = ScrapeConfig::new(pattern()).with_pagination(
        PaginationConfig::next_link("//a[@rel='next']/@href").with_timeout(Duration::from_millis(100)),
    );

    let results = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap();

    assert_eq!(results.stop_reason, StopReason::Timeout);
    assert!(results.is_truncated());
    assert!(results.total_pages >= 1);
    assert!(results.total_pages < 10, "got {} pages", results.total_pages);
    assert_eq!(fetcher.fetched().len(), results.total_pages);
}

#[tokio::test]
async fn next_links_resolve_against_the_final_url() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .redirect(
                "https://shop.test/start",
                "https://shop.test/catalog/page1.html",
                listing(&["a"], Some("page2.html")),
            )
            .page("https://shop.test/catalog/page2.html", listing(&["b"], None)),
    );

    let results = scraper(&fetcher)
        .traverse("https://shop.test/start", &next_link_config())
        .await
        .unwrap();

    assert_eq!(results.total_pages, 2);
    assert_eq!(results.pages[0].url, "https://shop.test/catalog/page1.html");
    assert_eq!(results.pages[1].url, "https://shop.test/catalog/page2.html");
}

#[tokio::test]
async fn alternative_next_selector_and_pipes() {
    let page = |item: &str, next: Option<&str>| {
        let mut html = format!("<ul><li class=\"item\">{}</li></ul>", item);
        if let Some(n) = next {
            html.push_str(&format!("<span class=\"more\" data-page=\"{}\">more</span>", n));
        }
        html
    };
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(&page_url(1), page("a", Some("2")))
            .page(&page_url(2), page("b", None)),
    );
    let config = ScrapeConfig::new(pattern()).with_pagination(
        PaginationConfig::next_link("//a[@rel='next']/@href")
            .with_alternatives(["//span[@class='more']/@data-page"])
            .with_pipe(PipeInvocation::with_params("prefix", ["?page="])),
    );

    let results = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap();
    assert_eq!(results.total_pages, 2);
    assert_eq!(names(results.items()), vec!["a", "b"]);
}

fn numbered_site() -> ScriptedFetcher {
    let nav = r#"<nav>
        <a class="pg" href="?page=1">1</a>
        <a class="pg" href="?page=2">2</a>
        <a class="pg" href="/list?page=3">3</a>
        <a class="pg" href="?page=2#top">2</a>
        <a class="pg" href="?page=4">4</a>
    </nav>"#;
    let with_nav = |items: &[&str]| listing(items, None).replace("</body>", &format!("{}</body>", nav));
    ScriptedFetcher::default()
        .page(&page_url(1), with_nav(&["a"]))
        .page(&page_url(2), listing(&["b"], None))
        .page(&page_url(3), listing(&["c", "d"], None))
        .page(&page_url(4), listing(&["e"], None))
}

fn numbered_config() -> ScrapeConfig {
    ScrapeConfig::new(pattern()).with_pagination(PaginationConfig::numbered("//a[@class='pg']/@href"))
}

#[tokio::test]
async fn enumerate_lists_unique_page_links_in_order() {
    let fetcher = Arc::new(numbered_site());
    let urls = scraper(&fetcher)
        .enumerate_pages(&page_url(1), &numbered_config())
        .await
        .unwrap();

    let urls: Vec<String> = urls.into_iter().map(String::from).collect();
    assert_eq!(urls, vec![page_url(1), page_url(2), page_url(3), page_url(4)]);
    assert_eq!(fetcher.fetched().len(), 1);
}

#[tokio::test]
async fn scrape_numbered_visits_every_enumerated_page_once() {
    let fetcher = Arc::new(numbered_site());
    let results = scraper(&fetcher)
        .scrape_numbered(&page_url(1), &numbered_config())
        .await
        .unwrap();

    assert_eq!(results.stop_reason, StopReason::Exhausted);
    assert_eq!(results.total_pages, 4);
    assert_eq!(names(results.items()), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(
        fetcher.fetched(),
        vec![page_url(1), page_url(2), page_url(3), page_url(4)]
    );
}

#[tokio::test]
async fn traverse_with_numbered_config_scrapes_numbered_pages() {
    let fetcher = Arc::new(numbered_site());
    let results = scraper(&fetcher)
        .traverse(&page_url(1), &numbered_config())
        .await
        .unwrap();
    assert_eq!(results.total_pages, 4);
}

#[tokio::test]
async fn numbered_pages_respect_the_cap() {
    let fetcher = Arc::new(numbered_site());
    let mut config = numbered_config();
    if let Some(pagination) = config.pagination.as_mut() {
        pagination.max_pages = 2;
    }
    let results = scraper(&fetcher).scrape_numbered(&page_url(1), &config).await.unwrap();
    assert_eq!(results.stop_reason, StopReason::MaxPages);
    assert_eq!(results.total_pages, 2);
    assert_eq!(fetcher.fetched().len(), 2);
}

#[tokio::test]
async fn numbered_failure_reports_partial_pages() {
    let fetcher = Arc::new(numbered_site().fail(&page_url(3)));
    let err = scraper(&fetcher)
        .scrape_numbered(&page_url(1), &numbered_config())
        .await
        .unwrap_err();
    assert_eq!(err.failing_page_number, 3);
    assert_eq!(err.failing_url, page_url(3));
    assert_eq!(names(err.partial_items.iter()), vec!["a", "b"]);
}

#[tokio::test]
async fn enumerate_rejects_next_link_pagination() {
    let fetcher = Arc::new(numbered_site());
    let err = scraper(&fetcher)
        .enumerate_pages(&page_url(1), &next_link_config())
        .await
        .unwrap_err();
    assert!(err.is_config());
    assert!(fetcher.fetched().is_empty());
}

#[tokio::test]
async fn invalid_configuration_fails_before_fetching() {
    let fetcher = Arc::new(numbered_site());
    let config = ScrapeConfig::new(pattern())
        .with_pagination(PaginationConfig::next_link("//a").with_max_pages(0));
    let err = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap_err();
    assert!(err.source.is_config());
    assert_eq!(err.failing_page_number, 1);
    assert!(fetcher.fetched().is_empty());

    let config = ScrapeConfig::new(pattern())
        .with_pagination(PaginationConfig::next_link("//a").with_alternatives(["//a[("]));
    let err = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap_err();
    assert!(err.source.is_selector() || err.source.is_config());
    assert!(fetcher.fetched().is_empty());
}

#[tokio::test]
async fn unknown_link_pipe_fails_before_fetching() {
    let fetcher = Arc::new(numbered_site());
    let config = ScrapeConfig::new(pattern()).with_pagination(
        PaginationConfig::next_link("//a[@rel='next']/@href").with_pipe(PipeInvocation::new("rot13")),
    );
    let err = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap_err();
    assert!(err.source.is_pipe());
    assert_eq!(err.failing_page_number, 1);
    assert!(fetcher.fetched().is_empty());
}

#[tokio::test]
async fn link_pipes_only_run_until_a_next_page_is_found() {
    let page = |items: &[&str], links: &[&str]| {
        let mut html = listing(items, None);
        for href in links {
            html = html.replace(
                "</body>",
                &format!("<a class=\"n\" href=\"{}\">more</a></body>", href),
            );
        }
        html
    };
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(&page_url(1), page(&["a"], &["?page=2", "javascript:void(0)"]))
            .page(&page_url(2), page(&["b"], &[])),
    );
    // The second link has no "=" so `int` would fail on it.
    let config = ScrapeConfig::new(pattern()).with_pagination(
        PaginationConfig::next_link("//a[@class='n']")
            .with_pipe(PipeInvocation::with_params("split", ["=", "1"]))
            .with_pipe(PipeInvocation::new("int"))
            .with_pipe(PipeInvocation::with_params("prefix", ["?page="])),
    );

    let results = scraper(&fetcher).traverse(&page_url(1), &config).await.unwrap();
    assert_eq!(results.stop_reason, StopReason::NoNextLink);
    assert_eq!(names(results.items()), vec!["a", "b"]);
    assert_eq!(fetcher.fetched(), vec![page_url(1), page_url(2)]);
}
