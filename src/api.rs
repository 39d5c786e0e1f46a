//! Agent HTTP API — models, suggestions, skills and sessions
//!
//! The chat socket carries conversation traffic only; everything else the
//! client needs comes from a handful of JSON endpoints. `AgentApi` is the
//! seam: `HttpAgentApi` talks to a live server, `MemoryAgentApi` serves
//! canned data for tests and offline use.

use crate::error::{ChatError, Result};
use crate::types::{ModelList, SessionInfo, SkillInfo};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::Duration;

const USER_AGENT: &str = concat!("a3s-chat/", env!("CARGO_PKG_VERSION"));

/// Request timeout for agent API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Read-only agent API used by the chat client
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Available models and the active one
    async fn list_models(&self) -> Result<ModelList>;

    /// Prompt suggestions for an empty conversation
    async fn suggestions(&self) -> Result<Vec<String>>;

    /// Skills installed on the agent
    async fn installed_skills(&self) -> Result<Vec<SkillInfo>>;

    /// Stored sessions, newest first as returned by the server
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>>;
}

#[derive(Debug, Deserialize)]
struct SuggestionsResponse {
    #[serde(default)]
    suggestions: Vec<String>,
}

/// `reqwest`-backed agent API
#[derive(Debug, Clone)]
pub struct HttpAgentApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(client, base_url)
    }

    /// Use a preconfigured client (proxies, auth headers)
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let api_error = |reason: String| ChatError::Api {
            endpoint: path.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| api_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(api_error(format!("HTTP {}: {}", status, preview)));
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| api_error(format!("invalid response body: {}", e)))?;
        tracing::debug!(endpoint = path, "Agent API request complete");
        Ok(value)
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn list_models(&self) -> Result<ModelList> {
        self.get_json("/api/models").await
    }

    async fn suggestions(&self) -> Result<Vec<String>> {
        let response: SuggestionsResponse = self.get_json("/api/chat/suggestions").await?;
        Ok(response.suggestions)
    }

    async fn installed_skills(&self) -> Result<Vec<SkillInfo>> {
        self.get_json("/api/skills/installed").await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        self.get_json("/api/sessions").await
    }
}

#[derive(Debug, Default, Clone)]
struct MemoryApiState {
    models: ModelList,
    suggestions: Vec<String>,
    skills: Vec<SkillInfo>,
    sessions: Vec<SessionInfo>,
}

/// In-memory agent API for testing
#[derive(Debug, Default)]
pub struct MemoryAgentApi {
    state: RwLock<MemoryApiState>,
}

impl MemoryAgentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_models(&self, models: ModelList) {
        if let Ok(mut state) = self.state.write() {
            state.models = models;
        }
    }

    pub fn set_suggestions(&self, suggestions: Vec<String>) {
        if let Ok(mut state) = self.state.write() {
            state.suggestions = suggestions;
        }
    }

    pub fn set_skills(&self, skills: Vec<SkillInfo>) {
        if let Ok(mut state) = self.state.write() {
            state.skills = skills;
        }
    }

    pub fn set_sessions(&self, sessions: Vec<SessionInfo>) {
        if let Ok(mut state) = self.state.write() {
            state.sessions = sessions;
        }
    }

    fn read<T>(&self, f: impl FnOnce(&MemoryApiState) -> T) -> Result<T> {
        let state = self
            .state
            .read()
            .map_err(|e| ChatError::Config(format!("Failed to acquire API state lock: {}", e)))?;
        Ok(f(&state))
    }
}

#[async_trait]
impl AgentApi for MemoryAgentApi {
    async fn list_models(&self) -> Result<ModelList> {
        self.read(|s| s.models.clone())
    }

    async fn suggestions(&self) -> Result<Vec<String>> {
        self.read(|s| s.suggestions.clone())
    }

    async fn installed_skills(&self) -> Result<Vec<SkillInfo>> {
        self.read(|s| s.skills.clone())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        self.read(|s| s.sessions.clone())
    }
}
