//! Data models shared by the crawl stages.
//!
//! - [`ArticleRecord`]: the only domain entity, one per article page
//! - [`PageResponse`]: a fetched page as handed over by the HTTP layer
//! - [`Stage`] and [`Request`]: entries of the traversal queue
//! - [`ArticleOutcome`]: what happened to a record after validation and storage

use serde::{Deserialize, Serialize};
use url::Url;

/// Metadata extracted from a single article page.
///
/// `url` is the natural key in storage. Optional fields serialize as `null`
/// so that the record always carries all three keys when validated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Final address of the article page, after redirects.
    pub url: String,
    /// Text of the page `<title>`.
    pub title: Option<String>,
    /// Publication timestamp text, trimmed.
    pub article_time: Option<String>,
}

/// A fetched page.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// Resolved address of the response (after any redirects).
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Which handler a queued request is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Homepage,
    Listing,
    Article,
}

/// A follow-up fetch scheduled by one of the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub stage: Stage,
}

impl Request {
    pub fn new(url: Url, stage: Stage) -> Self {
        Self { url, stage }
    }
}

/// Result of running an extracted record through validation and storage.
///
/// Every variant still carries the record: a page that was extracted is always
/// surfaced downstream, whether or not it made it into the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleOutcome {
    Inserted(ArticleRecord),
    Duplicate(ArticleRecord),
    Invalid { record: ArticleRecord, reason: String },
    StorageFailed { record: ArticleRecord, reason: String },
}

impl ArticleOutcome {
    pub fn into_record(self) -> ArticleRecord {
        match self {
            ArticleOutcome::Inserted(record) | ArticleOutcome::Duplicate(record) => record,
            ArticleOutcome::Invalid { record, .. } | ArticleOutcome::StorageFailed { record, .. } => {
                record
            }
        }
    }
}
