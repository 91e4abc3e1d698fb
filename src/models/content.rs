use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MediaItem;

fn default_images_count() -> u8 {
    1
}

/// Body of a generate-draft call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRequest {
    pub topic_key: String,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default = "default_images_count")]
    pub images_count: u8,
}

impl DraftRequest {
    pub fn new(topic_key: impl Into<String>, images_count: u8) -> Self {
        Self {
            topic_key: topic_key.into(),
            frequency: None,
            images_count,
        }
    }
}

/// Body of a create-draft call: content supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualDraft {
    pub title: String,
    pub content_html: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub topic_key: Option<String>,
}

/// Output of a content builder, before enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub content_html: String,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(skip)]
    pub images: Vec<MediaItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DraftOutcome {
    Created {
        article_id: i64,
        post_id: i64,
        url: Option<String>,
    },
    Duplicate {
        article_id: i64,
        post_id: i64,
        url: Option<String>,
    },
}

impl DraftOutcome {
    pub fn post_id(&self) -> i64 {
        match self {
            DraftOutcome::Created { post_id, .. } | DraftOutcome::Duplicate { post_id, .. } => {
                *post_id
            }
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            DraftOutcome::Created { url, .. } | DraftOutcome::Duplicate { url, .. } => {
                url.as_deref()
            }
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DraftOutcome::Duplicate { .. })
    }
}
