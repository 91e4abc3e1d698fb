use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::ai::ClaudeGenerator;
use crate::config::{Config, ContentMode};
use crate::content::{
    fingerprint, inject_images, render_related_links, select_images, ContentBuilder,
};
use crate::db::{RecordOutcome, Repository};
use crate::error::{AppError, Result};
use crate::models::{
    Article, DraftOutcome, DraftRequest, GeneratedContent, ManualDraft, MediaInventory, MediaItem,
    NewArticle, Site, SiteProfile,
};
use crate::services::{DraftPayload, RemoteSite, WpClient};

pub const SITE_PROFILE_KEY: &str = "site_profile";
pub const MEDIA_CACHE_KEY: &str = "media_cache";

const MAX_IMAGES: u8 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeReport {
    pub site_id: i64,
    pub profile_name: String,
    pub media_count: usize,
}

pub struct Engine {
    repository: Repository,
    remote: Arc<dyn RemoteSite>,
    builder: ContentBuilder,
    media_per_page: u32,
    related_links: usize,
}

impl Engine {
    pub fn new(repository: Repository, remote: Arc<dyn RemoteSite>, builder: ContentBuilder) -> Self {
        Self {
            repository,
            remote,
            builder,
            media_per_page: 50,
            related_links: 5,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let remote = Arc::new(WpClient::new(config.http_timeout())?);

        let builder = match (config.content_mode, &config.anthropic_api_key) {
            (ContentMode::Llm, Some(key)) => ContentBuilder::Generative(Arc::new(
                ClaudeGenerator::new(key.clone(), config.generator_timeout())?,
            )),
            (ContentMode::Llm, None) => {
                return Err(AppError::Config(
                    "content_mode = \"llm\" requires anthropic_api_key".to_string(),
                ))
            }
            (ContentMode::Template, _) => ContentBuilder::Template,
        };

        let mut engine = Self::new(repository, remote, builder);
        engine.media_per_page = config.media_per_page;
        engine.related_links = config.related_links;
        Ok(engine)
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    async fn resolve_site(&self, site_id: i64) -> Result<Site> {
        self.repository
            .get_active_site(site_id)
            .await?
            .ok_or(AppError::SiteNotFound(site_id))
    }

    /// Refreshes the cached profile and media inventory of a site.
    pub async fn analyze(&self, site_id: i64) -> Result<AnalyzeReport> {
        let site = self.resolve_site(site_id).await?;

        // Fetch both before writing so a failure leaves the cache untouched.
        let profile = self.remote.fetch_profile(&site).await?;
        let media = self.remote.fetch_media(&site, self.media_per_page).await?;

        self.repository
            .upsert_memory(site.id, SITE_PROFILE_KEY, &profile)
            .await?;
        self.repository
            .upsert_memory(site.id, MEDIA_CACHE_KEY, &media)
            .await?;

        let parsed_profile: SiteProfile = serde_json::from_value(profile).unwrap_or_default();
        let parsed_media: MediaInventory = serde_json::from_value(media).unwrap_or_default();
        let report = AnalyzeReport {
            site_id: site.id,
            profile_name: parsed_profile.display_name().to_string(),
            media_count: parsed_media.usable().len(),
        };

        tracing::info!(
            site_id = site.id,
            media_count = report.media_count,
            "Site analyzed"
        );
        Ok(report)
    }

    async fn load_site_memory(&self, site_id: i64) -> Result<(SiteProfile, MediaInventory)> {
        let profile = self
            .repository
            .get_memory(site_id, SITE_PROFILE_KEY)
            .await?
            .ok_or(AppError::NotAnalyzed(site_id))?;
        let profile = serde_json::from_value(profile).unwrap_or_else(|e| {
            tracing::warn!(site_id, "Cached site profile is malformed, using defaults: {}", e);
            SiteProfile::default()
        });

        let media = match self.repository.get_memory(site_id, MEDIA_CACHE_KEY).await? {
            Some(media) => serde_json::from_value(media).unwrap_or_else(|e| {
                tracing::warn!(site_id, "Cached media inventory is malformed, ignoring it: {}", e);
                MediaInventory::default()
            }),
            None => MediaInventory::default(),
        };

        Ok((profile, media))
    }

    /// Generates content for a topic and publishes it as a draft.
    pub async fn generate_draft(&self, site_id: i64, request: &DraftRequest) -> Result<DraftOutcome> {
        if request.topic_key.trim().is_empty() {
            return Err(AppError::Validation("topic_key must not be empty".to_string()));
        }
        if request.images_count > MAX_IMAGES {
            return Err(AppError::Validation(format!(
                "images_count must be between 0 and {}",
                MAX_IMAGES
            )));
        }

        let site = self.resolve_site(site_id).await?;
        let (profile, media) = self.load_site_memory(site.id).await?;

        let content = self.builder.build(&profile, &media, request).await?;

        let images = if self.builder.injects_images() {
            let mut rng = rand::thread_rng();
            select_images(&media, request.images_count as usize, &mut rng)
        } else {
            Vec::new()
        };

        self.publish(&site, content, Some(request.topic_key.trim()), images)
            .await
    }

    /// Publishes caller-supplied content through the same dedup and
    /// enrichment steps as generated content.
    pub async fn create_draft(&self, site_id: i64, draft: &ManualDraft) -> Result<DraftOutcome> {
        if draft.title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }
        if draft.content_html.trim().is_empty() {
            return Err(AppError::Validation("content_html must not be empty".to_string()));
        }

        let site = self.resolve_site(site_id).await?;
        let content = GeneratedContent {
            title: draft.title.trim().to_string(),
            excerpt: draft.excerpt.clone().unwrap_or_default(),
            content_html: draft.content_html.clone(),
            meta: Some(json!({"builder": "manual"})),
            images: Vec::new(),
        };
        let topic_key = draft
            .topic_key
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        self.publish(&site, content, topic_key, Vec::new()).await
    }

    pub async fn list_articles(&self, site_id: i64, limit: usize) -> Result<Vec<Article>> {
        let site = self.resolve_site(site_id).await?;
        self.repository.list_articles(site.id, limit).await
    }

    async fn publish(
        &self,
        site: &Site,
        content: GeneratedContent,
        topic_key: Option<&str>,
        inject: Vec<MediaItem>,
    ) -> Result<DraftOutcome> {
        // Fingerprint the base content, before any enrichment.
        let fingerprint = fingerprint(&content.content_html);

        if let Some(existing) = self
            .repository
            .find_article_by_fingerprint(site.id, &fingerprint)
            .await?
        {
            tracing::info!(
                site_id = site.id,
                post_id = existing.remote_post_id,
                fingerprint = %fingerprint,
                "Duplicate content, skipping publish"
            );
            return Ok(DraftOutcome::Duplicate {
                article_id: existing.id,
                post_id: existing.remote_post_id,
                url: existing.remote_url,
            });
        }

        let related = match topic_key {
            Some(topic) => {
                self.repository
                    .recent_articles_for_topic(site.id, topic, self.related_links)
                    .await?
            }
            None => Vec::new(),
        };

        let mut html = inject_images(&content.content_html, &inject);
        html.push_str(&render_related_links(&related));

        let payload = DraftPayload {
            title: content.title.clone(),
            content: html,
            excerpt: content.excerpt.clone(),
        };

        // No retry: an interrupted create may already exist remotely.
        let receipt = match self.remote.create_draft(site, &payload).await {
            Ok(receipt) => receipt,
            Err(err) if err.is_ambiguous() => {
                tracing::warn!(
                    site_id = site.id,
                    fingerprint = %fingerprint,
                    kind = err.kind(),
                    "Draft publish outcome unknown; the draft may exist remotely, not recording it"
                );
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(site_id = site.id, kind = err.kind(), "Draft publish failed: {}", err);
                return Err(err);
            }
        };

        let images_used: Vec<&str> = if inject.is_empty() {
            content.images.iter().map(|i| i.url.as_str()).collect()
        } else {
            inject.iter().map(|i| i.url.as_str()).collect()
        };
        let meta = json!({
            "builder": self.builder_label(&content),
            "generated": content.meta.clone().unwrap_or(Value::Null),
            "images": images_used,
            "related_article_ids": related.iter().map(|a| a.id).collect::<Vec<_>>(),
            "edit_link": receipt.edit_link,
            "notified": receipt.notified,
        });

        let record = NewArticle {
            site_id: site.id,
            remote_post_id: receipt.id,
            remote_status: receipt.status.clone().unwrap_or_else(|| "draft".to_string()),
            remote_url: receipt.link.clone(),
            title: payload.title,
            content: payload.content,
            excerpt: payload.excerpt,
            topic_key: topic_key.map(str::to_string),
            fingerprint: fingerprint.clone(),
            meta,
        };

        match self.repository.record_article(record).await? {
            RecordOutcome::Inserted(article_id) => {
                tracing::info!(
                    site_id = site.id,
                    post_id = receipt.id,
                    topic_key = topic_key.unwrap_or_default(),
                    "Draft created"
                );
                Ok(DraftOutcome::Created {
                    article_id,
                    post_id: receipt.id,
                    url: receipt.link,
                })
            }
            RecordOutcome::Existing(existing) => {
                tracing::warn!(
                    site_id = site.id,
                    orphaned_post_id = receipt.id,
                    post_id = existing.remote_post_id,
                    "Concurrent publish of identical content; remote draft {} is orphaned",
                    receipt.id
                );
                Ok(DraftOutcome::Duplicate {
                    article_id: existing.id,
                    post_id: existing.remote_post_id,
                    url: existing.remote_url,
                })
            }
        }
    }

    fn builder_label(&self, content: &GeneratedContent) -> Value {
        content
            .meta
            .as_ref()
            .and_then(|m| m.get("builder"))
            .cloned()
            .unwrap_or_else(|| Value::from(self.builder.mode()))
    }
}
