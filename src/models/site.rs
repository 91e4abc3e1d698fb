use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A WordPress installation running the llmgeo plugin.
#[derive(Clone)]
pub struct Site {
    pub id: i64,
    pub site_url: String,
    pub secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id", &self.id)
            .field("site_url", &self.site_url)
            .field("secret", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Business profile as reported by the plugin's `/site-profile` route.
///
/// Each field is read on its own: a missing, null or oddly typed value falls
/// back to that field's default without affecting the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    #[serde(alias = "name", deserialize_with = "lenient_string")]
    pub site_name: String,
    #[serde(alias = "business_name", deserialize_with = "lenient_string")]
    pub company_name: String,
    #[serde(alias = "tagline", deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(alias = "url", deserialize_with = "lenient_string")]
    pub site_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub language: String,
    #[serde(deserialize_with = "lenient_string")]
    pub service_area: String,
    #[serde(deserialize_with = "lenient_string")]
    pub audience: String,
    #[serde(deserialize_with = "lenient_services")]
    pub services: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub tone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub contact_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
}

impl SiteProfile {
    /// Name used when the content speaks about the business.
    pub fn display_name(&self) -> &str {
        [&self.company_name, &self.site_name, &self.site_url]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("our team")
    }

    pub fn language_or_default(&self) -> &str {
        match self.language.trim() {
            "" => "en",
            lang => lang,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaItem {
    #[serde(alias = "source_url", deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub alt: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub caption: String,
    #[serde(deserialize_with = "lenient_dimension")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "lenient_dimension")]
    pub height: Option<u32>,
}

impl MediaItem {
    pub fn caption_or_title(&self) -> &str {
        if self.caption.trim().is_empty() {
            self.title.trim()
        } else {
            self.caption.trim()
        }
    }
}

/// Cached answer of the plugin's `/media` route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaInventory {
    #[serde(deserialize_with = "lenient_count")]
    pub count: usize,
    /// Entries that are not objects are dropped.
    #[serde(deserialize_with = "lenient_items")]
    pub items: Vec<MediaItem>,
}

impl MediaInventory {
    /// Items that can actually be rendered.
    pub fn usable(&self) -> Vec<&MediaItem> {
        self.items
            .iter()
            .filter(|item| !item.url.trim().is_empty())
            .collect()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        // WordPress REST shape: {"rendered": "..."}
        Value::Object(map) => map
            .get("rendered")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    })
}

/// Accepts `"a, b"`, `["a", "b"]` or `[{"name": "a"}, {"title": "b"}]`.
fn lenient_services<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn entry(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    let list: Vec<String> = match Value::deserialize(deserializer)? {
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Array(items) => items.into_iter().filter_map(entry).collect(),
        _ => Vec::new(),
    };
    Ok(list
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn lenient_dimension<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<MediaItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_profile_falls_back_to_defaults() {
        let profile: SiteProfile = serde_json::from_value(json!({
            "name": "Acme Roofing",
            "language": null,
            "services": "roof repair, gutters ,",
            "unknown_field": 42
        }))
        .unwrap();

        assert_eq!(profile.site_name, "Acme Roofing");
        assert_eq!(profile.display_name(), "Acme Roofing");
        assert_eq!(profile.language_or_default(), "en");
        assert_eq!(profile.services, vec!["roof repair", "gutters"]);
        assert!(profile.service_area.is_empty());
    }

    #[test]
    fn odd_field_types_only_reset_that_field() {
        let profile: SiteProfile = serde_json::from_value(json!({
            "name": "Acme Roofing",
            "service_area": "Lyon",
            "services": [{"name": "Roof repair"}, {"title": "Gutters"}, 7, {"slug": "x"}, "Skylights"],
            "phone": 33123456,
            "tone": {"style": "warm"}
        }))
        .unwrap();

        assert_eq!(profile.display_name(), "Acme Roofing");
        assert_eq!(profile.service_area, "Lyon");
        assert_eq!(profile.services, vec!["Roof repair", "Gutters", "Skylights"]);
        assert_eq!(profile.phone, "33123456");
        assert!(profile.tone.is_empty());

        let profile: SiteProfile =
            serde_json::from_value(json!({"company_name": "Acme", "services": 12})).unwrap();
        assert_eq!(profile.company_name, "Acme");
        assert!(profile.services.is_empty());
    }

    #[test]
    fn company_name_wins_over_site_name() {
        let profile = SiteProfile {
            site_name: "acme.test".into(),
            company_name: "Acme SARL".into(),
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "Acme SARL");
        assert_eq!(SiteProfile::default().display_name(), "our team");
    }

    #[test]
    fn media_inventory_skips_items_without_url() {
        let inventory: MediaInventory = serde_json::from_value(json!({
            "count": 2,
            "items": [
                {"url": "https://acme.test/a.jpg", "alt": "A", "width": 800, "height": null},
                {"url": null, "caption": "orphan"}
            ]
        }))
        .unwrap();

        let usable = inventory.usable();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].width, Some(800));
        assert_eq!(usable[0].height, None);
    }

    #[test]
    fn string_dimensions_keep_the_image() {
        let inventory: MediaInventory = serde_json::from_value(json!({
            "count": "3",
            "items": [
                {"url": "https://acme.test/a.jpg", "width": "800", "height": "600", "title": {"rendered": "Roof"}},
                {"url": "https://acme.test/b.jpg", "width": "wide", "height": -4},
                "not an item"
            ]
        }))
        .unwrap();

        assert_eq!(inventory.count, 3);
        let usable = inventory.usable();
        assert_eq!(usable.len(), 2);
        assert_eq!((usable[0].width, usable[0].height), (Some(800), Some(600)));
        assert_eq!(usable[0].caption_or_title(), "Roof");
        assert_eq!((usable[1].width, usable[1].height), (None, None));
    }

    #[test]
    fn debug_output_hides_secret() {
        let site = Site {
            id: 1,
            site_url: "https://acme.test".into(),
            secret: "hunter2".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        let printed = format!("{site:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
