//! Command-line interface definitions for the telegraph.bg crawler.
//!
//! Every option has a default matching the site, so a bare invocation crawls
//! telegraph.bg into `telegraph_data.db`. All options can also be supplied
//! through environment variables.

use crate::fetch::DEFAULT_USER_AGENT;
use crate::schema::DEFAULT_SCHEMA_PATH;
use crate::scrapers::telegraph::START_URL;
use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl with defaults
/// telegraph_news
///
/// # Keep the database elsewhere and export the crawled records
/// telegraph_news --database /var/lib/news/telegraph.db --output ./news.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Site root the crawl starts from
    #[arg(long, env = "TELEGRAPH_START_URL", default_value = START_URL)]
    pub start_url: Url,

    /// Only hosts under this domain are fetched (empty disables the check)
    #[arg(long, env = "TELEGRAPH_ALLOWED_DOMAIN", default_value = "telegraph.bg")]
    pub allowed_domain: String,

    /// SQLite database file, created if missing
    #[arg(short, long, env = "TELEGRAPH_DATABASE", default_value = "telegraph_data.db")]
    pub database: PathBuf,

    /// JSON Schema every record must satisfy before it is stored
    #[arg(short, long, env = "TELEGRAPH_SCHEMA", default_value = DEFAULT_SCHEMA_PATH)]
    pub schema: PathBuf,

    /// Optional JSON file receiving every crawled record
    #[arg(short, long, env = "TELEGRAPH_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Maximum number of pages fetched at once
    #[arg(short, long, env = "TELEGRAPH_CONCURRENCY", default_value_t = 8)]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "TELEGRAPH_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[arg(long, env = "TELEGRAPH_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}
