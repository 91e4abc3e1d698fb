use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A draft confirmed by the remote site. Rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub site_id: i64,
    pub remote_post_id: i64,
    pub remote_status: String,
    pub remote_url: Option<String>,
    pub title: String,
    #[serde(skip_serializing)]
    pub content: String,
    pub excerpt: String,
    pub topic_key: Option<String>,
    pub fingerprint: String,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub site_id: i64,
    pub remote_post_id: i64,
    pub remote_status: String,
    pub remote_url: Option<String>,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub topic_key: Option<String>,
    pub fingerprint: String,
    pub meta: Value,
}
