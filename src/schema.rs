//! Schema validation gate for extracted records.
//!
//! The schema is a JSON Schema document read once at startup. A record that
//! fails it is never written to the database.

use crate::error::{CrawlError, Result};
use crate::models::ArticleRecord;
use jsonschema::Validator;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Default location of the schema file, next to the crate sources.
pub const DEFAULT_SCHEMA_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/schema.json");

/// A compiled, read-only record schema.
pub struct Schema {
    source: String,
    validator: Validator,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("source", &self.source).finish()
    }
}

impl Schema {
    /// Read and compile the schema file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::SchemaLoad`] if the file cannot be read, is not
    /// JSON, or is not a valid JSON Schema.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |message: String| CrawlError::SchemaLoad {
            path: path.display().to_string(),
            message,
        };

        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| load_error(e.to_string()))?;
        let document: Value = serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;
        let validator = jsonschema::validator_for(&document).map_err(|e| load_error(e.to_string()))?;

        info!("Loaded record schema");
        Ok(Self {
            source: path.display().to_string(),
            validator,
        })
    }

    /// Check a candidate record against the schema.
    ///
    /// All violations are joined into the message of the returned
    /// [`CrawlError::Validation`].
    pub fn validate(&self, record: &ArticleRecord) -> Result<()> {
        let instance = serde_json::to_value(record)?;
        let violations = self
            .validator
            .iter_errors(&instance)
            .map(|e| e.to_string())
            .collect::<Vec<_>>();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CrawlError::Validation(violations.join("; ")))
        }
    }
}
