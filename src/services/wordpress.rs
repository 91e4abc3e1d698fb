use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::signer::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::error::{AppError, Result};
use crate::models::Site;

/// REST namespace registered by the llmgeo WordPress plugin.
pub const API_NAMESPACE: &str = "/wp-json/llmgeo/v1";

const USER_AGENT: &str = concat!("llm-geo-engine/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize)]
pub struct DraftPayload {
    pub title: String,
    pub content: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftReceipt {
    pub id: i64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub edit_link: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notified: Option<Value>,
}

/// Operations the engine needs from a remote WordPress site.
#[async_trait]
pub trait RemoteSite: Send + Sync {
    async fn fetch_profile(&self, site: &Site) -> Result<Value>;

    async fn fetch_media(&self, site: &Site, per_page: u32) -> Result<Value>;

    /// Creates a draft post. Must not be retried on an ambiguous error.
    async fn create_draft(&self, site: &Site, draft: &DraftPayload) -> Result<DraftReceipt>;
}

pub struct WpClient {
    client: Client,
}

impl WpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    fn endpoint(site: &Site, route: &str) -> Result<Url> {
        let raw = format!(
            "{}{}{}",
            site.site_url.trim_end_matches('/'),
            API_NAMESPACE,
            route
        );
        Url::parse(&raw)
            .map_err(|e| AppError::Config(format!("invalid site URL {}: {}", site.site_url, e)))
    }

    async fn signed_get(&self, site: &Site, route: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut url = Self::endpoint(site, route)?;
        // Signed before the query is attached: the plugin strips it too.
        let path = url.path().to_string();
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let timestamp = Utc::now().timestamp().to_string();
        let signature = signer::sign(&site.secret, "GET", &path, &timestamp, b"");

        let request = self
            .client
            .get(url)
            .header(TIMESTAMP_HEADER, &timestamp)
            .header(SIGNATURE_HEADER, signature);

        self.execute(request, &path, false).await
    }

    async fn signed_post<T: Serialize>(&self, site: &Site, route: &str, body: &T) -> Result<Value> {
        let url = Self::endpoint(site, route)?;
        let path = url.path().to_string();

        // These bytes are signed and sent as-is; never re-serialize.
        let body = serde_json::to_vec(body)?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = signer::sign(&site.secret, "POST", &path, &timestamp, &body);

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(TIMESTAMP_HEADER, &timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(body);

        self.execute(request, &path, true).await
    }

    /// `mutating` marks requests whose effect may survive a lost response.
    async fn execute(&self, request: RequestBuilder, path: &str, mutating: bool) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, path, mutating))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, path, mutating))?;

        if status.as_u16() >= 400 {
            tracing::warn!(path, status = status.as_u16(), "Remote call rejected");
            return Err(AppError::remote(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            AppError::Protocol(format!(
                "{} answered {} with a non-JSON body: {}",
                path, status, e
            ))
        })
    }
}

fn classify_transport_error(err: reqwest::Error, path: &str, mutating: bool) -> AppError {
    let path = path.to_string();
    if err.is_timeout() {
        AppError::RemoteTimeout { path }
    } else if mutating && !err.is_connect() && !err.is_builder() {
        AppError::RemoteInterrupted {
            path,
            reason: err.to_string(),
        }
    } else {
        AppError::RemoteUnreachable {
            path,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl RemoteSite for WpClient {
    async fn fetch_profile(&self, site: &Site) -> Result<Value> {
        self.signed_get(site, "/site-profile", &[]).await
    }

    async fn fetch_media(&self, site: &Site, per_page: u32) -> Result<Value> {
        self.signed_get(site, "/media", &[("per_page", per_page.to_string())])
            .await
    }

    async fn create_draft(&self, site: &Site, draft: &DraftPayload) -> Result<DraftReceipt> {
        let value = self.signed_post(site, "/draft", draft).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::Protocol(format!("unexpected draft response: {}", e)))
    }
}
