//! JSON export of crawled records.
//!
//! The file holds a single pretty-printed array, one object per article page
//! in listing order:
//!
//! ```text
//! [
//!   { "url": "https://telegraph.bg/...", "title": "...", "article_time": "..." },
//!   ...
//! ]
//! ```

use crate::error::Result;
use crate::models::ArticleRecord;
use crate::utils::ensure_parent_dir;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `records` as a JSON array to `path`, replacing any previous file.
///
/// The parent directory is created if missing.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_records(records: &[ArticleRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;

    ensure_parent_dir(path).await?;
    if let Err(e) = fs::write(path, json).await {
        error!(error = %e, "Failed to write record export");
        return Err(e.into());
    }
    info!("Wrote record export");
    Ok(())
}
