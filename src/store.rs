//! SQLite persistence for article records.
//!
//! The `news` table keeps one row per article URL. Rows are only ever
//! inserted: a URL that is already present is left untouched. A unique index
//! on `url` backs the application-level existence check so that two
//! concurrent inserts of the same URL cannot both succeed.

use crate::error::Result;
use crate::models::ArticleRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, instrument};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news (
        url TEXT,
        title TEXT,
        article_time TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS news_url_unique ON news (url)
    "#,
];

/// What an insert attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Handle to the article database.
///
/// Holds a single-connection pool: the whole crawl shares one connection,
/// which is released by [`ArticleStore::close`] or when the store is dropped.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    /// Open (creating if needed) the database file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration).execute(&pool).await?;
            debug!(migration = i, "Applied migration");
        }

        info!("Article store ready");
        Ok(Self { pool })
    }

    /// Whether a row for `url` already exists.
    pub async fn contains(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT url FROM news WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert `record` unless a row with the same URL exists.
    ///
    /// The unique index decides: if another insert for the same URL won the
    /// race, this one reports [`InsertOutcome::AlreadyPresent`].
    pub async fn insert(&self, record: &ArticleRecord) -> Result<InsertOutcome> {
        let result = sqlx::query("INSERT OR IGNORE INTO news (url, title, article_time) VALUES (?, ?, ?)")
            .bind(&record.url)
            .bind(record.title.as_deref())
            .bind(record.article_time.as_deref())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyPresent)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM news")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Close the connection, waiting for in-flight queries.
    pub async fn close(self) {
        self.pool.close().await;
        info!("Article store closed");
    }
}

#[cfg(test)]
impl ArticleStore {
    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        use std::str::FromStr;
        Self::connect(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    /// Fetch the stored row for `url`.
    pub async fn get(&self, url: &str) -> Result<Option<ArticleRecord>> {
        let row = sqlx::query("SELECT url, title, article_time FROM news WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| ArticleRecord {
            url: row.get("url"),
            title: row.get("title"),
            article_time: row.get("article_time"),
        }))
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
