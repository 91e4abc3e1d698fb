use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, NewArticle, Site};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, site_id, remote_post_id, remote_status, remote_url, title, \
     content, excerpt, topic_key, fingerprint, meta, created_at";

/// Result of recording a published article.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Inserted(i64),
    /// Another row with the same fingerprint won the race; this is it.
    Existing(Article),
}

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Site operations

    pub async fn insert_site(&self, site_url: &str, secret: &str) -> Result<i64> {
        let site_url = site_url.trim_end_matches('/').to_string();
        let secret = secret.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sites (site_url, secret) VALUES (?1, ?2)",
                    params![site_url, secret],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    /// Returns the site only when it exists and is active.
    pub async fn get_active_site(&self, id: i64) -> Result<Option<Site>> {
        let site = self
            .conn
            .call(move |conn| {
                let site = conn
                    .query_row(
                        "SELECT id, site_url, secret, is_active, created_at FROM sites
                         WHERE id = ?1 AND is_active = 1",
                        params![id],
                        site_from_row,
                    )
                    .optional()?;
                Ok(site)
            })
            .await?;
        Ok(site)
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, site_url, secret, is_active, created_at FROM sites ORDER BY id",
                )?;
                let sites = stmt
                    .query_map([], site_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sites)
            })
            .await?;
        Ok(sites)
    }

    /// Returns false when no site has this id.
    pub async fn set_site_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE sites SET is_active = ?1 WHERE id = ?2",
                    params![is_active, id],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    // Memory operations

    pub async fn upsert_memory(&self, site_id: i64, key: &str, value: &Value) -> Result<()> {
        let key = key.to_string();
        let value = serde_json::to_string(value)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO memories (site_id, key, value)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(site_id, key) DO UPDATE SET
                           value = excluded.value,
                           updated_at = datetime('now')"#,
                    params![site_id, key, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_memory(&self, site_id: i64, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        let raw: Option<String> = self
            .conn
            .call(move |conn| {
                let raw = conn
                    .query_row(
                        "SELECT value FROM memories WHERE site_id = ?1 AND key = ?2",
                        params![site_id, key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(raw)
            })
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // Article operations

    pub async fn find_article_by_fingerprint(
        &self,
        site_id: i64,
        fingerprint: &str,
    ) -> Result<Option<Article>> {
        let fingerprint = fingerprint.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!(
                            "SELECT {ARTICLE_COLUMNS} FROM articles
                             WHERE site_id = ?1 AND fingerprint = ?2"
                        ),
                        params![site_id, fingerprint],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Newest-first articles of one topic cluster that have a public URL.
    pub async fn recent_articles_for_topic(
        &self,
        site_id: i64,
        topic_key: &str,
        limit: usize,
    ) -> Result<Vec<Article>> {
        let topic_key = topic_key.to_string();
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     WHERE site_id = ?1 AND topic_key = ?2
                       AND remote_url IS NOT NULL AND remote_url != ''
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?3"
                ))?;
                let articles = stmt
                    .query_map(params![site_id, topic_key, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn list_articles(&self, site_id: i64, limit: usize) -> Result<Vec<Article>> {
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     WHERE site_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2"
                ))?;
                let articles = stmt
                    .query_map(params![site_id, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Inserts the article unless its fingerprint is already recorded for the
    /// site, in which case the existing row is returned. Runs in one transaction.
    pub async fn record_article(&self, article: NewArticle) -> Result<RecordOutcome> {
        let meta = serde_json::to_string(&article.meta)?;
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let inserted = tx.execute(
                    r#"INSERT INTO articles (site_id, remote_post_id, remote_status, remote_url,
                                            title, content, excerpt, topic_key, fingerprint, meta)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                       ON CONFLICT(site_id, fingerprint) DO NOTHING"#,
                    params![
                        article.site_id,
                        article.remote_post_id,
                        article.remote_status,
                        article.remote_url,
                        article.title,
                        article.content,
                        article.excerpt,
                        article.topic_key,
                        article.fingerprint,
                        meta,
                    ],
                )?;

                let outcome = if inserted == 1 {
                    RecordOutcome::Inserted(tx.last_insert_rowid())
                } else {
                    let existing = tx.query_row(
                        &format!(
                            "SELECT {ARTICLE_COLUMNS} FROM articles
                             WHERE site_id = ?1 AND fingerprint = ?2"
                        ),
                        params![article.site_id, article.fingerprint],
                        article_from_row,
                    )?;
                    RecordOutcome::Existing(existing)
                };

                tx.commit()?;
                Ok(outcome)
            })
            .await?;
        Ok(outcome)
    }

    // Schedule tracking

    pub async fn get_last_run(&self, job_key: &str) -> Result<Option<i64>> {
        let job_key = job_key.to_string();
        let last_run = self
            .conn
            .call(move |conn| {
                let last_run = conn
                    .query_row(
                        "SELECT last_run_at FROM schedule_runs WHERE job_key = ?1",
                        params![job_key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(last_run)
            })
            .await?;
        Ok(last_run)
    }

    pub async fn set_last_run(&self, job_key: &str, timestamp: i64) -> Result<()> {
        let job_key = job_key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO schedule_runs (job_key, last_run_at) VALUES (?1, ?2)",
                    params![job_key, timestamp],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp_column(row: &Row, idx: usize) -> DateTime<Utc> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now)
}

fn site_from_row(row: &Row) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        site_url: row.get(1)?,
        secret: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        created_at: timestamp_column(row, 4),
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    let meta: String = row.get(10)?;
    Ok(Article {
        id: row.get(0)?,
        site_id: row.get(1)?,
        remote_post_id: row.get(2)?,
        remote_status: row.get(3)?,
        remote_url: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        excerpt: row.get(7)?,
        topic_key: row.get(8)?,
        fingerprint: row.get(9)?,
        meta: serde_json::from_str(&meta).unwrap_or(Value::Null),
        created_at: timestamp_column(row, 11),
    })
}
