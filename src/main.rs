//! # telegraph_news
//!
//! Crawls the news section of [telegraph.bg](https://telegraph.bg/) and keeps
//! a deduplicated SQLite record of its articles.
//!
//! ## Usage
//!
//! ```sh
//! telegraph_news --database telegraph_data.db --output news.json
//! ```
//!
//! ## Architecture
//!
//! The crawl is a three-stage fan-out:
//! 1. **Homepage**: the first navigation link leads to the news section
//! 2. **Listing**: every `h2.second-title` headline link is scheduled
//! 3. **Article**: URL, title and timestamp are extracted, validated against
//!    the JSON Schema, and inserted unless the URL is already stored
//!
//! Per-page failures are logged and never stop the crawl.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod error;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod schema;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use fetch::HttpFetcher;
use outputs::json;
use pipeline::{CrawlConfig, Crawler};
use schema::Schema;
use scrapers::telegraph::SiteLayout;
use store::ArticleStore;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("telegraph_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Startup: schema, layout, store ----
    let schema = Schema::load(&args.schema).await.inspect_err(|e| {
        error!(path = %args.schema.display(), error = %e, "Failed to load schema");
    })?;
    let layout = SiteLayout::telegraph()?;
    let fetcher = HttpFetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?;
    let store = ArticleStore::open(&args.database).await.inspect_err(|e| {
        error!(path = %args.database.display(), error = %e, "Failed to open database");
    })?;

    // ---- Crawl ----
    let config = CrawlConfig::new(args.start_url.clone(), &args.allowed_domain, args.concurrency);
    let report = Crawler::new(fetcher, layout, &schema, &store, config).run().await;

    // ---- Export ----
    if let Some(output) = &args.output {
        if let Err(e) = json::write_records(&report.records, output).await {
            error!(path = %output.display(), error = %e, "Failed to write record export");
        }
    }

    match store.count().await {
        Ok(total) => info!(total, "Rows in database"),
        Err(e) => error!(error = %e, "Failed to count stored rows"),
    }
    store.close().await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        records = report.records.len(),
        pages = report.stats.pages_fetched,
        offsite_skipped = report.stats.offsite_skipped,
        inserted = report.stats.inserted,
        duplicates = report.stats.duplicates,
        invalid = report.stats.invalid,
        failures = report.stats.fetch_failures + report.stats.page_failures + report.stats.storage_failures,
        "Execution complete"
    );

    Ok(())
}
