//! REST store client
//!
//! Speaks the hosted JSON API. The messaging core never sees HTTP details;
//! everything surfaces through the [`MessageStore`] / [`ProfileLookup`]
//! contracts with failures mapped to [`StoreError::Read`] / [`StoreError::Write`]
//! by call direction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::store::{MessageStore, ProfileLookup};
use crate::types::{Message, Profile};

/// Configuration for the REST store client
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base service URL (e.g., "https://api.reelhouse.film")
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Custom headers to include in all requests
    pub default_headers: HashMap<String, String>,
    /// Bearer token, if the caller is authenticated
    pub auth_token: Option<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.reelhouse.film".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("Reelhouse/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
            auth_token: None,
        }
    }
}

impl RestConfig {
    /// Create a new config with a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set the bearer token
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageRequest<'a> {
    sender_id: &'a str,
    receiver_id: &'a str,
    content: &'a str,
    subject: &'a str,
}

#[derive(Debug, Serialize)]
struct MarkReadRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ProfilesResponse {
    profiles: Vec<Profile>,
}

/// HTTP-backed [`MessageStore`] and [`ProfileLookup`]
pub struct RestStore {
    client: reqwest::Client,
    config: RestConfig,
}

impl RestStore {
    /// Create a new REST store client
    pub fn new(config: RestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn apply_headers(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.config.default_headers {
            builder = builder.header(key, value);
        }
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let builder = self.apply_headers(self.client.get(self.url(path)).query(params));
        let response = builder.send().await.map_err(|e| {
            warn!(path, error = %e, "GET request failed");
            StoreError::Read(e.to_string())
        })?;

        if !response.status().is_success() {
            warn!(path, status = %response.status(), "GET returned error status");
            return Err(StoreError::Read(format!(
                "GET {} returned {}",
                path,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let builder = self.apply_headers(self.client.post(self.url(path)).json(body));
        let response = builder.send().await.map_err(|e| {
            warn!(path, error = %e, "POST request failed");
            StoreError::Write(e.to_string())
        })?;

        if !response.status().is_success() {
            warn!(path, status = %response.status(), "POST returned error status");
            return Err(StoreError::Write(format!(
                "POST {} returned {}",
                path,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))
    }
}

#[async_trait]
impl MessageStore for RestStore {
    async fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        subject: &str,
    ) -> Result<Message> {
        let body = CreateMessageRequest {
            sender_id,
            receiver_id,
            content,
            subject,
        };
        self.post_json("/api/messages", &body).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Message>> {
        let response: MessagesResponse = self
            .get_json("/api/messages", &[("user", user_id.to_string())])
            .await?;
        Ok(response.messages)
    }

    async fn list_between(&self, user_id: &str, counterpart_id: &str) -> Result<Vec<Message>> {
        let response: MessagesResponse = self
            .get_json(
                "/api/messages/thread",
                &[
                    ("user", user_id.to_string()),
                    ("counterpart", counterpart_id.to_string()),
                ],
            )
            .await?;
        Ok(response.messages)
    }

    async fn mark_read(&self, ids: &[String]) -> Result<()> {
        let body = MarkReadRequest { ids };
        let _: serde_json::Value = self.post_json("/api/messages/read", &body).await?;
        Ok(())
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64> {
        let response: UnreadCountResponse = self
            .get_json(
                "/api/messages/unread-count",
                &[("user", user_id.to_string())],
            )
            .await?;
        Ok(response.count)
    }
}

#[async_trait]
impl ProfileLookup for RestStore {
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, Profile>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response: ProfilesResponse = self
            .get_json("/api/profiles", &[("ids", ids.join(","))])
            .await?;
        Ok(response
            .profiles
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect())
    }

    async fn search_by_name(
        &self,
        query: &str,
        excluding: &str,
        limit: usize,
    ) -> Result<Vec<Profile>> {
        let response: ProfilesResponse = self
            .get_json(
                "/api/profiles/search",
                &[
                    ("q", query.to_string()),
                    ("excluding", excluding.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(response.profiles)
    }
}
