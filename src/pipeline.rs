//! Crawl driver.
//!
//! [`Crawler`] owns the traversal queue. It starts from the homepage request,
//! fetches a whole frontier at a time with up to `concurrency` requests in
//! flight, dispatches every page to its stage handler and enqueues the
//! follow-ups in document order. Article pages end in validation and
//! storage.
//!
//! Nothing that goes wrong while handling one page escapes that page: fetch,
//! extraction, validation and storage errors are logged, counted in
//! [`CrawlStats`], and the rest of the crawl carries on.

use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::{ArticleOutcome, ArticleRecord, Request, Stage};
use crate::schema::Schema;
use crate::scrapers::telegraph::{self, SiteLayout};
use crate::store::{ArticleStore, InsertOutcome};
use crate::utils::{host_allowed, normalize_domain, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Runtime settings for a crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub start_url: Url,
    /// Requests to other hosts are dropped. Empty means no restriction.
    pub allowed_domain: String,
    pub concurrency: usize,
}

impl CrawlConfig {
    pub fn new(start_url: Url, allowed_domain: &str, concurrency: usize) -> Self {
        Self {
            start_url,
            allowed_domain: normalize_domain(allowed_domain),
            concurrency: concurrency.max(1),
        }
    }
}

/// Counters collected over one crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    pub page_failures: usize,
    pub offsite_skipped: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub storage_failures: usize,
}

/// Records surfaced by the crawl, plus its counters.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub records: Vec<ArticleRecord>,
    pub stats: CrawlStats,
}

impl CrawlReport {
    fn tally(&mut self, outcome: ArticleOutcome) {
        match &outcome {
            ArticleOutcome::Inserted(_) => self.stats.inserted += 1,
            ArticleOutcome::Duplicate(_) => self.stats.duplicates += 1,
            ArticleOutcome::Invalid { record, reason } => {
                self.stats.invalid += 1;
                debug!(url = %record.url, %reason, "Surfacing record that failed validation");
            }
            ArticleOutcome::StorageFailed { record, reason } => {
                self.stats.storage_failures += 1;
                debug!(url = %record.url, %reason, "Surfacing record that was not stored");
            }
        }
        self.records.push(outcome.into_record());
    }
}

/// What visiting one request produced.
enum Visit {
    FollowUps(Vec<Request>),
    Article(ArticleOutcome),
    FetchFailed,
    PageFailed,
}

/// The three-stage crawl over a [`Fetch`] implementation.
pub struct Crawler<'a, F> {
    fetcher: F,
    layout: SiteLayout,
    schema: &'a Schema,
    store: &'a ArticleStore,
    config: CrawlConfig,
}

impl<'a, F: Fetch> Crawler<'a, F> {
    pub fn new(
        fetcher: F,
        layout: SiteLayout,
        schema: &'a Schema,
        store: &'a ArticleStore,
        config: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            layout,
            schema,
            store,
            config,
        }
    }

    /// Crawl from the start URL until the queue is empty.
    #[instrument(level = "info", skip_all, fields(start = %self.config.start_url))]
    pub async fn run(&self) -> CrawlReport {
        let mut report = CrawlReport::default();
        let mut queue = VecDeque::from([Request::new(self.config.start_url.clone(), Stage::Homepage)]);

        while !queue.is_empty() {
            let mut frontier = Vec::with_capacity(queue.len());
            for request in queue.drain(..) {
                if host_allowed(&request.url, &self.config.allowed_domain) {
                    frontier.push(request);
                } else {
                    debug!(url = %request.url, "Skipping off-site request");
                    report.stats.offsite_skipped += 1;
                }
            }

            let visits = stream::iter(frontier)
                .map(|request| self.visit(request))
                .buffered(self.config.concurrency)
                .collect::<Vec<_>>()
                .await;

            for visit in visits {
                if !matches!(visit, Visit::FetchFailed) {
                    report.stats.pages_fetched += 1;
                }
                match visit {
                    Visit::FollowUps(requests) => queue.extend(requests),
                    Visit::Article(outcome) => report.tally(outcome),
                    Visit::FetchFailed => report.stats.fetch_failures += 1,
                    Visit::PageFailed => report.stats.page_failures += 1,
                }
            }
        }

        info!(
            records = report.records.len(),
            stats = ?report.stats,
            "Crawl finished"
        );
        report
    }

    async fn visit(&self, request: Request) -> Visit {
        let page = match self.fetcher.fetch(&request.url).await {
            Ok(page) => page,
            Err(e) => {
                error!(url = %request.url, stage = ?request.stage, error = %e, "Fetch failed");
                return Visit::FetchFailed;
            }
        };
        debug!(url = %page.url, status = page.status, stage = ?request.stage, "Dispatching page");

        match request.stage {
            Stage::Homepage => match telegraph::resolve_homepage(&self.layout, &page) {
                Ok(listing) => Visit::FollowUps(vec![listing]),
                Err(e) => {
                    error!(url = %page.url, error = %e, "Error parsing homepage");
                    Visit::PageFailed
                }
            },
            Stage::Listing => match telegraph::extract_listing(&self.layout, &page) {
                Ok(articles) => Visit::FollowUps(articles),
                Err(e) => {
                    error!(url = %page.url, error = %e, "Error parsing news listing");
                    Visit::PageFailed
                }
            },
            Stage::Article => {
                let processed = match telegraph::extract_article(&self.layout, &page) {
                    Ok(record) => self.process_article(record).await,
                    Err(e) => Err(e),
                };
                match processed {
                    Ok(outcome) => Visit::Article(outcome),
                    Err(e) => {
                        error!(url = %page.url, error = %e, "Error parsing news article");
                        Visit::PageFailed
                    }
                }
            }
        }
    }

    /// Validate a candidate record and store it if its URL is new.
    ///
    /// A failed existence check is an error for the whole page; a failed
    /// insert is not, and the record is still returned.
    #[instrument(level = "info", skip_all, fields(url = %record.url))]
    pub async fn process_article(&self, record: ArticleRecord) -> Result<ArticleOutcome> {
        if let Err(e) = self.schema.validate(&record) {
            error!(error = %e, "Validation error");
            return Ok(ArticleOutcome::Invalid {
                record,
                reason: e.to_string(),
            });
        }

        if self.store.contains(&record.url).await? {
            return Ok(ArticleOutcome::Duplicate(record));
        }

        match self.store.insert(&record).await {
            Ok(InsertOutcome::Inserted) => {
                info!(
                    title = %truncate_for_log(record.title.as_deref().unwrap_or_default(), 120),
                    "Article stored"
                );
                Ok(ArticleOutcome::Inserted(record))
            }
            Ok(InsertOutcome::AlreadyPresent) => Ok(ArticleOutcome::Duplicate(record)),
            Err(e) => {
                error!(error = %e, "Error inserting article");
                Ok(ArticleOutcome::StorageFailed {
                    reason: e.to_string(),
                    record,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::models::PageResponse;
    use crate::schema::DEFAULT_SCHEMA_PATH;
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory site: URL -> (final URL, body). Unknown URLs fail to fetch.
    #[derive(Default)]
    struct StaticSite {
        pages: HashMap<String, (String, String)>,
        requested: Mutex<Vec<String>>,
    }

    impl StaticSite {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (url.to_string(), body.to_string()));
            self
        }

        fn redirect(mut self, url: &str, target: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (target.to_string(), body.to_string()));
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Fetch for &StaticSite {
        async fn fetch(&self, url: &Url) -> Result<PageResponse> {
            self.requested.lock().unwrap().push(url.to_string());
            let (final_url, body) = self.pages.get(url.as_str()).ok_or_else(|| {
                CrawlError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("404 {url}"),
                ))
            })?;
            Ok(PageResponse {
                url: Url::parse(final_url)?,
                status: 200,
                body: body.clone(),
            })
        }
    }

    /// Formatted log output collected from a test-local subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        /// Install a subscriber on the current thread writing into `self`.
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let logs = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || logs.clone())
                .with_ansi(false)
                .without_time()
                .with_max_level(tracing::Level::INFO)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn error_lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .filter(|line| line.trim_start().starts_with("ERROR"))
                .map(str::to_string)
                .collect()
        }
    }

    const HOMEPAGE: &str = r#"<html><body><header><nav><div><ul>
        <li><a href="/news">News</a></li><li><a href="/sport">Sport</a></li>
        </ul></div></nav></header></body></html>"#;

    fn listing(links: &[&str]) -> String {
        links
            .iter()
            .map(|href| format!(r#"<h2 class="second-title"><a href="{href}">x</a></h2>"#))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn article(title: Option<&str>, time: Option<&str>) -> String {
        let title = title
            .map(|t| format!("<title>{t}</title>"))
            .unwrap_or_default();
        let time = time
            .map(|t| format!(r#"<span class="article-time">{t}</span>"#))
            .unwrap_or_default();
        format!("<html><head>{title}</head><body>{time}</body></html>")
    }

    fn scenario_site() -> StaticSite {
        StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/1", "/news/2"]))
            .page(
                "https://site/news/1",
                &article(Some("Story One"), Some(" 2024-01-01 10:00 ")),
            )
            .page("https://site/news/2", &article(Some("Story Two"), None))
    }

    fn config(concurrency: usize) -> CrawlConfig {
        CrawlConfig::new(Url::parse("https://site/").unwrap(), "site", concurrency)
    }

    async fn fixtures() -> (Schema, ArticleStore) {
        let schema = Schema::load(DEFAULT_SCHEMA_PATH).await.unwrap();
        let store = ArticleStore::in_memory().await.unwrap();
        (schema, store)
    }

    async fn crawl(site: &StaticSite, schema: &Schema, store: &ArticleStore, concurrency: usize) -> CrawlReport {
        Crawler::new(
            site,
            SiteLayout::telegraph().unwrap(),
            schema,
            store,
            config(concurrency),
        )
        .run()
        .await
    }

    #[tokio::test]
    async fn test_scenario_stores_trimmed_rows() {
        let (schema, store) = fixtures().await;
        let site = scenario_site();

        let report = crawl(&site, &schema, &store, 4).await;

        assert_eq!(report.stats.pages_fetched, 4);
        assert_eq!(report.stats.inserted, 2);
        assert_eq!(report.records.len(), 2);
        assert_eq!(
            store.get("https://site/news/1").await.unwrap(),
            Some(ArticleRecord {
                url: "https://site/news/1".to_string(),
                title: Some("Story One".to_string()),
                article_time: Some("2024-01-01 10:00".to_string()),
            })
        );
        let second = store.get("https://site/news/2").await.unwrap().unwrap();
        assert_eq!(second.article_time, None);
    }

    #[tokio::test]
    async fn test_recrawl_is_idempotent() {
        let (schema, store) = fixtures().await;
        let site = scenario_site();

        crawl(&site, &schema, &store, 4).await;
        let second = crawl(&site, &schema, &store, 4).await;

        assert_eq!(second.stats.inserted, 0);
        assert_eq!(second.stats.duplicates, 2);
        // duplicates are still surfaced
        assert_eq!(second.records.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_existing_row_is_skipped_without_error() {
        let (schema, store) = fixtures().await;
        let existing = ArticleRecord {
            url: "https://site/news/1".to_string(),
            title: Some("Old title".to_string()),
            article_time: None,
        };
        store.insert(&existing).await.unwrap();

        let report = crawl(&scenario_site(), &schema, &store, 1).await;

        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(report.stats.inserted, 1);
        assert_eq!(report.stats.page_failures, 0);
        assert_eq!(report.stats.storage_failures, 0);
        assert_eq!(store.get("https://site/news/1").await.unwrap(), Some(existing));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repeated_listing_link_is_stored_once() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/1", "/news/1"]))
            .page("https://site/news/1", &article(Some("Story One"), None));

        let report = crawl(&site, &schema, &store, 2).await;

        assert_eq!(report.stats.inserted, 1);
        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_record_is_surfaced_but_not_stored() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/1"]))
            .page("https://site/news/1", &article(None, Some("10:00")));

        let report = crawl(&site, &schema, &store, 1).await;

        assert_eq!(report.stats.invalid, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].title, None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_listing_fans_out_in_document_order() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/a", "/b", "/c"]))
            .page("https://site/a", &article(Some("A"), None))
            .page("https://site/b", &article(Some("B"), None))
            .page("https://site/c", &article(Some("C"), None));

        crawl(&site, &schema, &store, 1).await;

        assert_eq!(
            site.requested(),
            vec![
                "https://site/",
                "https://site/news",
                "https://site/a",
                "https://site/b",
                "https://site/c",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_nav_ends_the_crawl_quietly() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default().page("https://site/", "<html><body></body></html>");

        let report = crawl(&site, &schema, &store, 1).await;

        assert_eq!(report.stats.page_failures, 1);
        assert!(report.records.is_empty());
        assert_eq!(site.requested(), vec!["https://site/"]);
    }

    #[tokio::test]
    async fn test_failed_article_fetch_does_not_stop_siblings() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/gone", "/news/1"]))
            .page("https://site/news/1", &article(Some("Story One"), None));

        let report = crawl(&site, &schema, &store, 2).await;

        assert_eq!(report.stats.fetch_failures, 1);
        assert_eq!(report.stats.inserted, 1);
        assert!(store.contains("https://site/news/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_url_follows_redirect() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/old"]))
            .redirect(
                "https://site/news/old",
                "https://site/news/new",
                &article(Some("Moved"), None),
            );

        let report = crawl(&site, &schema, &store, 1).await;

        assert_eq!(report.records[0].url, "https://site/news/new");
        assert!(store.contains("https://site/news/new").await.unwrap());
        assert!(!store.contains("https://site/news/old").await.unwrap());
    }

    #[tokio::test]
    async fn test_offsite_links_are_not_fetched() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page(
                "https://site/news",
                &listing(&["https://elsewhere.example/story", "/news/1"]),
            )
            .page("https://site/news/1", &article(Some("Story One"), None));

        let report = crawl(&site, &schema, &store, 1).await;

        assert_eq!(report.stats.offsite_skipped, 1);
        assert_eq!(report.stats.inserted, 1);
        assert!(!site
            .requested()
            .iter()
            .any(|url| url.contains("elsewhere.example")));
    }

    #[tokio::test]
    async fn test_storage_outage_fails_the_page_without_a_record() {
        let (schema, store) = fixtures().await;
        store.clone().close().await;

        let report = crawl(&scenario_site(), &schema, &store, 2).await;

        assert_eq!(report.stats.page_failures, 2);
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_still_surfaces_the_record() {
        let (schema, store) = fixtures().await;
        sqlx::query(
            "CREATE TRIGGER reject_news BEFORE INSERT ON news BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/1"]))
            .page("https://site/news/1", &article(Some("Story One"), Some("10:00")));

        let report = crawl(&site, &schema, &store, 1).await;

        assert_eq!(report.stats.storage_failures, 1);
        assert_eq!(report.stats.page_failures, 0);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].url, "https://site/news/1");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_outcome_carries_reason() {
        let (schema, store) = fixtures().await;
        sqlx::query(
            "CREATE TRIGGER reject_news BEFORE INSERT ON news BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();
        let site = StaticSite::default();
        let crawler = Crawler::new(&site, SiteLayout::telegraph().unwrap(), &schema, &store, config(1));
        let record = ArticleRecord {
            url: "https://site/news/1".to_string(),
            title: Some("Story One".to_string()),
            article_time: None,
        };

        match crawler.process_article(record.clone()).await.unwrap() {
            ArticleOutcome::StorageFailed { record: surfaced, reason } => {
                assert_eq!(surfaced, record);
                assert!(reason.contains("disk full"));
            }
            other => panic!("expected StorageFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_record_logs_one_validation_error() {
        let (schema, store) = fixtures().await;
        let site = StaticSite::default()
            .page("https://site/", HOMEPAGE)
            .page("https://site/news", &listing(&["/news/1"]))
            .page("https://site/news/1", &article(None, Some("10:00")));

        let logs = CapturedLogs::default();
        let report = {
            let _guard = logs.install();
            crawl(&site, &schema, &store, 1).await
        };

        assert_eq!(report.stats.invalid, 1);
        assert_eq!(store.count().await.unwrap(), 0);
        let errors = logs.error_lines();
        assert_eq!(errors.len(), 1, "error lines: {errors:?}");
        assert!(errors[0].contains("Validation error"));
    }

    #[tokio::test]
    async fn test_duplicate_skip_logs_no_error() {
        let (schema, store) = fixtures().await;
        let site = scenario_site();
        crawl(&site, &schema, &store, 1).await;

        let logs = CapturedLogs::default();
        let report = {
            let _guard = logs.install();
            crawl(&site, &schema, &store, 1).await
        };

        assert_eq!(report.stats.duplicates, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(logs.error_lines().is_empty(), "error lines: {:?}", logs.error_lines());
    }
}
