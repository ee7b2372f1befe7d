//! telegraph.bg scraper.
//!
//! The homepage navigation links to the news section; the news section lists
//! headlines as `h2.second-title` blocks; each article page carries its
//! publication time in `span.article-time`.

use crate::error::{CrawlError, Result};
use crate::models::{ArticleRecord, PageResponse, Request, Stage};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Site root the crawl starts from.
pub const START_URL: &str = "https://telegraph.bg/";

const NAV_LINK: &str = "body > header > nav > div > ul > li:first-of-type > a[href]";
const HEADLINE_LINKS: &str = r#"h2[class="second-title"] a[href]"#;
const TITLE: &str = "title";
const ARTICLE_TIME: &str = r#"span[class="article-time"]"#;

/// Compiled selectors for the three stages.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    nav_link: (String, Selector),
    headline_links: (String, Selector),
    title: (String, Selector),
    article_time: (String, Selector),
}

fn compile(selector: &str) -> Result<(String, Selector)> {
    Selector::parse(selector)
        .map(|compiled| (selector.to_string(), compiled))
        .map_err(|e| CrawlError::Selector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
}

impl SiteLayout {
    /// Build a layout from raw CSS selectors.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Selector`] for the first selector that fails to parse.
    pub fn new(nav_link: &str, headline_links: &str, title: &str, article_time: &str) -> Result<Self> {
        Ok(Self {
            nav_link: compile(nav_link)?,
            headline_links: compile(headline_links)?,
            title: compile(title)?,
            article_time: compile(article_time)?,
        })
    }

    /// The telegraph.bg page structure.
    pub fn telegraph() -> Result<Self> {
        Self::new(NAV_LINK, HEADLINE_LINKS, TITLE, ARTICLE_TIME)
    }
}

/// Homepage: pick the first navigation link and schedule the listing page.
#[instrument(level = "info", skip_all, fields(url = %page.url))]
pub fn resolve_homepage(layout: &SiteLayout, page: &PageResponse) -> Result<Request> {
    let document = Html::parse_document(&page.body);
    let (selector, compiled) = &layout.nav_link;

    let href = document
        .select(compiled)
        .find_map(|a| a.value().attr("href"))
        .ok_or_else(|| CrawlError::MissingElement {
            selector: selector.clone(),
            page: page.url.to_string(),
        })?;

    let listing = page.url.join(href)?;
    info!(%listing, "Resolved news section link");
    Ok(Request::new(listing, Stage::Listing))
}

/// Listing: one article request per headline anchor, in document order.
///
/// Links are not deduplicated here; repeated URLs are caught at storage.
#[instrument(level = "info", skip_all, fields(url = %page.url))]
pub fn extract_listing(layout: &SiteLayout, page: &PageResponse) -> Result<Vec<Request>> {
    let document = Html::parse_document(&page.body);
    let (_, compiled) = &layout.headline_links;

    let mut requests = Vec::new();
    for anchor in document.select(compiled) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        match page.url.join(href) {
            Ok(resolved) => requests.push(Request::new(resolved, Stage::Article)),
            Err(e) => warn!(%href, error = %e, "Skipping unresolvable headline link"),
        }
    }

    info!(count = requests.len(), "Indexed article links");
    let urls: Vec<&str> = requests.iter().map(|r| r.url.as_str()).collect();
    debug!(?urls, "Article links");
    Ok(requests)
}

/// Article: build the candidate record from the page.
///
/// `url` is the response address, so redirects are reflected. An empty
/// `<title>` becomes `None`; the timestamp is trimmed.
#[instrument(level = "info", skip_all, fields(url = %page.url))]
pub fn extract_article(layout: &SiteLayout, page: &PageResponse) -> Result<ArticleRecord> {
    let document = Html::parse_document(&page.body);

    let title = document
        .select(&layout.title.1)
        .next()
        .map(|element| element.text().collect::<String>())
        .filter(|text| !text.is_empty());

    let article_time = document
        .select(&layout.article_time.1)
        .find_map(first_text_child)
        .map(|text| text.trim().to_string());

    debug!(?title, ?article_time, "Parsed article");
    Ok(ArticleRecord {
        url: page.url.to_string(),
        title,
        article_time,
    })
}

/// The first text node directly under `element`, if any.
fn first_text_child(element: ElementRef<'_>) -> Option<String> {
    element
        .children()
        .find_map(|node| node.value().as_text().map(|text| text.to_string()))
}
