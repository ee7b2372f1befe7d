//! Small helpers shared across the crawler.
//!
//! - Log-friendly string truncation
//! - Allowed-domain normalization and host matching
//! - Output directory creation for the record export

use crate::error::Result;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};
use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (backing off to a char boundary) with
/// `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Reduce a configured domain to a bare lowercase host.
///
/// Accepts values such as `telegraph.bg/`, `https://telegraph.bg` or
/// `.telegraph.bg` and returns `telegraph.bg`.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim_matches('.')
        .to_lowercase()
}

/// Whether `url` points at `domain` or one of its subdomains.
///
/// `domain` must already be normalized. An empty domain allows everything.
pub fn host_allowed(url: &Url, domain: &str) -> bool {
    if domain.is_empty() {
        return true;
    }
    match url.host_str() {
        Some(host) => {
            let host = host.to_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        }
        None => false,
    }
}

/// Create the directory that will hold `path`, if missing.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
        debug!(dir = %parent.display(), "Output directory ready");
    }
    Ok(())
}
