//! Comment source backed by the same-origin header-forging proxy

use async_trait::async_trait;
use luckydraw_domain::{ApiEnvelope, CommentSource, ReplyPage, SourceError, VideoView};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Configuration for the proxy client
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            timeout_secs: 15,
            user_agent: concat!("luckydraw/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Talks to `{base_url}/api/proxy`, which relays to the comment API
pub struct ProxyCommentSource {
    client: Client,
    base_url: String,
}

impl ProxyCommentSource {
    pub fn new(config: ProxyConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self::new(ProxyConfig {
            base_url,
            ..Default::default()
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/proxy", self.base_url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        query: &[(&str, String)],
    ) -> Result<ApiEnvelope<T>, SourceError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CommentSource for ProxyCommentSource {
    async fn lookup_video(&self, video_id: &str) -> Result<ApiEnvelope<VideoView>, SourceError> {
        tracing::debug!(video_id = %video_id, "Looking up video");
        self.get(&[("type", "view".to_string()), ("bvid", video_id.to_string())])
            .await
    }

    async fn fetch_page(
        &self,
        object_id: u64,
        video_id: &str,
        page: u32,
    ) -> Result<ApiEnvelope<ReplyPage>, SourceError> {
        tracing::debug!(object_id, page, "Fetching reply page");
        self.get(&[
            ("type", "reply".to_string()),
            ("oid", object_id.to_string()),
            ("bvid", video_id.to_string()),
            ("next", page.to_string()),
        ])
        .await
    }
}
