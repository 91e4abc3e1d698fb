use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "llm-geo-engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    #[default]
    Template,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Bearer token for mutating API routes. Unset means the API is open.
    pub admin_token: Option<String>,
    pub anthropic_api_key: Option<String>,

    #[serde(default)]
    pub content_mode: ContentMode,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_generator_timeout")]
    pub generator_timeout_secs: u64,

    #[serde(default = "default_media_per_page")]
    pub media_per_page: u32,

    #[serde(default = "default_related_links")]
    pub related_links: usize,

    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_analyze_interval")]
    pub analyze_interval_secs: i64,

    /// Keep schedule timestamps in the database instead of process memory.
    #[serde(default = "default_true")]
    pub durable_schedule: bool,

    #[serde(default)]
    pub jobs: Vec<WorkerJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerJob {
    pub site_id: i64,
    pub topic_key: String,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_images_count")]
    pub images_count: u8,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("engine.db").to_string_lossy().to_string()
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_http_timeout() -> u64 {
    30
}

fn default_generator_timeout() -> u64 {
    60
}

fn default_media_per_page() -> u32 {
    50
}

fn default_related_links() -> usize {
    5
}

fn default_poll_interval() -> u64 {
    60
}

fn default_analyze_interval() -> i64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_frequency() -> String {
    "1_per_week".to_string()
}

fn default_images_count() -> u8 {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            analyze_interval_secs: default_analyze_interval(),
            durable_schedule: true,
            jobs: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: default_bind(),
            admin_token: None,
            anthropic_api_key: None,
            content_mode: ContentMode::Template,
            http_timeout_secs: default_http_timeout(),
            generator_timeout_secs: default_generator_timeout(),
            media_per_page: default_media_per_page(),
            related_links: default_related_links(),
            worker: WorkerConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`. A missing default
    /// file is created; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let config_path = Self::config_path();
                if config_path.exists() {
                    Self::read(&config_path)?
                } else {
                    let config = Config::default();
                    config.save(&config_path)?;
                    config
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(token) = non_empty("LLMGEO_ADMIN_TOKEN") {
            self.admin_token = Some(token);
        }
        if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(key);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.content_mode == ContentMode::Llm && self.anthropic_api_key.is_none() {
            return Err(AppError::Config(
                "content_mode = \"llm\" requires anthropic_api_key".to_string(),
            ));
        }
        if let Some(job) = self.worker.jobs.iter().find(|job| job.images_count > 3) {
            return Err(AppError::Config(format!(
                "worker job {}:{} has images_count {} (max 3)",
                job.site_id, job.topic_key, job.images_count
            )));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_secs)
    }

    /// Admin token with blank values treated as unset.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_path = "/tmp/engine.db"
admin_token = "t0ken"

[worker]
poll_interval_secs = 5

[[worker.jobs]]
site_id = 1
topic_key = "roofing"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.db_path, "/tmp/engine.db");
        assert_eq!(config.content_mode, ContentMode::Template);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.related_links, 5);
        assert_eq!(config.worker.poll_interval_secs, 5);
        assert_eq!(config.worker.analyze_interval_secs, 86_400);
        assert!(config.worker.durable_schedule);
        assert_eq!(config.worker.jobs[0].frequency, "1_per_week");
        assert_eq!(config.worker.jobs[0].images_count, 1);
    }

    #[test]
    fn llm_mode_without_key_is_rejected() {
        let config = Config {
            content_mode: ContentMode::Llm,
            anthropic_api_key: None,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn environment_overrides_secrets() {
        let mut config = Config {
            admin_token: Some("from-file".into()),
            ..Config::default()
        };
        config.apply_env(|name| match name {
            "LLMGEO_ADMIN_TOKEN" => Some("from-env".into()),
            "ANTHROPIC_API_KEY" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.admin_token(), Some("from-env"));
        assert_eq!(config.anthropic_api_key, None);
    }

    #[test]
    fn blank_admin_token_counts_as_unset() {
        let config = Config {
            admin_token: Some("   ".into()),
            ..Config::default()
        };
        assert_eq!(config.admin_token(), None);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            media_per_page: 20,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().media_per_page, 20);
    }
}
