//! Article content: building the base HTML, fingerprinting it, and the
//! enrichment applied after the duplicate check.

mod enrich;
mod fingerprint;
mod generative;
mod template;

use std::sync::Arc;

use crate::ai::TextGenerator;
use crate::error::Result;
use crate::models::{DraftRequest, GeneratedContent, MediaInventory, SiteProfile};

pub use enrich::{inject_images, render_related_links, select_images};
pub use fingerprint::fingerprint;

#[derive(Clone)]
pub enum ContentBuilder {
    /// Fixed-structure article, no generation cost. Deterministic for a
    /// given profile, media inventory and request.
    Template,
    /// Article written by an external text generator.
    Generative(Arc<dyn TextGenerator>),
}

impl ContentBuilder {
    pub async fn build(
        &self,
        profile: &SiteProfile,
        media: &MediaInventory,
        request: &DraftRequest,
    ) -> Result<GeneratedContent> {
        match self {
            ContentBuilder::Template => Ok(template::build(profile, media, request)),
            ContentBuilder::Generative(generator) => {
                generative::build(generator.as_ref(), profile, request).await
            }
        }
    }

    /// Whether images still have to be injected after the build.
    pub fn injects_images(&self) -> bool {
        matches!(self, ContentBuilder::Generative(_))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ContentBuilder::Template => "template",
            ContentBuilder::Generative(_) => "llm",
        }
    }
}

/// `roof-repair` -> `Roof repair`
pub(crate) fn humanize_topic(topic_key: &str) -> String {
    let words = topic_key
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
