// ABOUTME: CLI binary for the Ariadne pattern scraper.
// ABOUTME: Scrapes a URL or HTML file with a JSON configuration and prints records or paginated results as JSON.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use digests_ariadne::{
    global_registry, load_config_file, PaginationError, PageResult, Record, ScrapeConfig, Scraper,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ariadne")]
#[command(about = "Extract structured records from web pages with declarative selector patterns")]
struct Args {
    /// JSON scrape configuration (container, fields, optional pagination)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// HTML file to scrape (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL context for HTML file scraping (required with --html)
    #[arg(long = "url")]
    url: Option<String>,

    /// Only list the page URLs found by numbered pagination
    #[arg(long = "enumerate")]
    enumerate: bool,

    /// Scrape only the given page even if pagination is configured
    #[arg(long = "no-paginate")]
    no_paginate: bool,

    /// Override the configured page limit
    #[arg(long = "max-pages")]
    max_pages: Option<usize>,

    /// Print JSON on a single line
    #[arg(long = "compact")]
    compact: bool,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// List the registered pipe names and exit
    #[arg(long = "list-pipes")]
    list_pipes: bool,

    /// URL to scrape (fetch mode)
    #[arg()]
    target: Option<String>,
}

/// What a failed traversal still reports.
#[derive(Serialize)]
struct PartialOutput<'a> {
    error: String,
    failing_url: &'a str,
    failing_page_number: usize,
    total_scraped: usize,
    partial_pages: &'a [PageResult],
    partial_items: &'a [Record],
}

impl<'a> From<&'a PaginationError> for PartialOutput<'a> {
    fn from(err: &'a PaginationError) -> Self {
        Self {
            error: err.source.to_string(),
            failing_url: &err.failing_url,
            failing_page_number: err.failing_page_number,
            total_scraped: err.total_scraped,
            partial_pages: &err.partial_pages,
            partial_items: &err.partial_items,
        }
    }
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String, serde_json::Error> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    if args.list_pipes {
        for name in global_registry().names() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    // Validate args
    let Some(config_path) = &args.config else {
        eprintln!("error: --config is required");
        return ExitCode::from(2);
    };
    if args.html.is_some() && args.url.is_none() {
        eprintln!("error: --url is required when using --html");
        return ExitCode::from(2);
    }
    if args.html.is_none() && args.target.is_none() {
        eprintln!("error: a URL is required, or use --html with --url");
        return ExitCode::from(2);
    }
    if args.html.is_some() && args.target.is_some() {
        eprintln!("error: cannot use both --html and a positional URL");
        return ExitCode::from(2);
    }

    let mut config: ScrapeConfig = match load_config_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let (Some(max_pages), Some(pagination)) = (args.max_pages, config.pagination.as_mut()) {
        pagination.max_pages = max_pages;
    }

    let scraper = match Scraper::builder()
        .allow_private_networks(args.allow_private_networks)
        .build()
    {
        Ok(scraper) => scraper,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    let start = Instant::now();
    let mut had_error = false;

    let rendered = if let Some(html_path) = &args.html {
        // HTML file mode
        let url = args.url.as_deref().unwrap_or_default();
        match fs::read_to_string(html_path) {
            Ok(html) => match scraper.scrape_html(&html, url, &config) {
                Ok(records) => to_json(&records, args.compact),
                Err(e) => {
                    eprintln!("error scraping HTML: {}", e);
                    return ExitCode::from(1);
                }
            },
            Err(e) => {
                eprintln!("error reading file {:?}: {}", html_path, e);
                return ExitCode::from(1);
            }
        }
    } else {
        let url = args.target.as_deref().unwrap_or_default();
        if args.enumerate {
            match scraper.enumerate_pages(url, &config).await {
                Ok(urls) => {
                    let urls: Vec<String> = urls.into_iter().map(String::from).collect();
                    to_json(&urls, args.compact)
                }
                Err(e) => {
                    eprintln!("error enumerating {}: {}", url, e);
                    return ExitCode::from(1);
                }
            }
        } else if config.pagination.is_some() && !args.no_paginate {
            match scraper.traverse(url, &config).await {
                Ok(results) => {
                    if results.is_truncated() {
                        tracing::warn!(stop = %results.stop_reason, "pagination stopped early");
                    }
                    to_json(&results, args.compact)
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    had_error = true;
                    to_json(&PartialOutput::from(&e), args.compact)
                }
            }
        } else {
            match scraper.scrape(url, &config).await {
                Ok(records) => to_json(&records, args.compact),
                Err(e) => {
                    eprintln!("error scraping {}: {}", url, e);
                    return ExitCode::from(1);
                }
            }
        }
    };

    let elapsed = start.elapsed();

    match rendered {
        Ok(output_str) => {
            if let Some(output_path) = &args.output {
                if let Err(e) = fs::write(output_path, &output_str) {
                    eprintln!("error writing to {:?}: {}", output_path, e);
                    had_error = true;
                }
            } else {
                println!("{}", output_str);
            }
        }
        Err(e) => {
            eprintln!("error serializing output: {}", e);
            had_error = true;
        }
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
