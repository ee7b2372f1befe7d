//! Error taxonomy for the crawler.
//!
//! Every page handler returns [`CrawlError`]; the pipeline driver logs it and
//! ends that branch of the traversal. Only startup failures (schema, database)
//! ever reach `main`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("no element matched `{selector}` on {page}")]
    MissingElement { selector: String, page: String },

    #[error("could not load schema {path}: {message}")]
    SchemaLoad { path: String, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
