//! Platform CRUD API
//!
//! JSON in, JSON out under a `data` envelope; failures carry `error.message`.
//! The console needs the agent surface and read-only prompt metadata, nothing
//! else. [`MemoryAgentApi`] backs tests and offline development.

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::wizard::{AgentStatus, WizardData};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

// ============================================================================
// Records
// ============================================================================

/// An agent as the platform stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub welcome_message: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub is_default: bool,
}

impl AgentRecord {
    /// Hydrate a wizard draft from this record
    pub fn into_draft(self) -> WizardData {
        WizardData {
            name: self.name,
            description: self.description,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            vector_store_ids: self.vector_store_ids,
            system_prompt: self.system_prompt,
            welcome_message: self.welcome_message,
            status: self.status,
            is_default: self.is_default,
        }
    }
}

/// Partial agent update; unset fields are left untouched by the server
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_store_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
}

impl AgentPatch {
    /// Patch carrying only a status transition
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch carrying every editable field of the draft
    pub fn from_draft(draft: &WizardData) -> Self {
        Self {
            name: Some(draft.name.clone()),
            description: Some(draft.description.clone()),
            model: Some(draft.model.clone()),
            temperature: Some(draft.temperature),
            max_tokens: Some(draft.max_tokens),
            vector_store_ids: Some(draft.vector_store_ids.clone()),
            system_prompt: Some(draft.system_prompt.clone()),
            welcome_message: Some(draft.welcome_message.clone()),
            status: None,
        }
    }
}

/// One published prompt version of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVersion {
    pub version: String,
    #[serde(default)]
    pub guardrails: Vec<String>,
}

/// Read-only prompt metadata fetched lazily for the test tab
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVersionList {
    #[serde(default)]
    pub versions: Vec<PromptVersion>,
    #[serde(default)]
    pub active_version: Option<String>,
}

// ============================================================================
// API Trait
// ============================================================================

/// Agent surface of the platform API
#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentRecord>>;

    async fn get_agent(&self, id: &str) -> Result<AgentRecord>;

    async fn create_agent(&self, draft: &WizardData) -> Result<AgentRecord>;

    /// Partial update. Servers may answer without a record body, in which
    /// case callers fall back to their optimistic view.
    async fn update_agent(&self, id: &str, patch: &AgentPatch) -> Result<Option<AgentRecord>>;

    /// Promote the agent to tenant default
    async fn make_default_agent(&self, id: &str) -> Result<Option<AgentRecord>>;

    async fn list_prompt_versions(&self, agent_id: &str) -> Result<PromptVersionList>;
}

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    message: String,
}

fn check_failure(status: u16, body: &str) -> Result<()> {
    if status == 401 {
        return Err(ConsoleError::Unauthorized);
    }
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(body)
            .ok()
            .and_then(|envelope| envelope.error)
            .map(|e| e.message)
            .unwrap_or_else(|| body.trim().to_string());
        return Err(ConsoleError::Remote { status, message });
    }
    Ok(())
}

/// Unwrap a successful envelope whose `data` may legitimately be absent
fn parse_optional<T: DeserializeOwned>(status: u16, body: &str) -> Result<Option<T>> {
    check_failure(status, body)?;
    if body.trim().is_empty() {
        return Ok(None);
    }
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    Ok(envelope.data)
}

/// Unwrap a successful envelope that must carry `data`
fn parse_required<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    match parse_optional(status, body)? {
        Some(data) => Ok(data),
        None => Err(ConsoleError::Remote {
            status,
            message: "response is missing the data envelope".to_string(),
        }),
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client for the platform API
pub struct HttpAgentApi {
    config: ConsoleConfig,
    client: reqwest::Client,
}

impl HttpAgentApi {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConsoleError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn request_raw(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(u16, String)> {
        let url = self.config.endpoint(path);
        tracing::debug!(method = %method, %url, "platform API request");

        let mut request = self.client.request(method, &url).header(
            "Authorization",
            format!("Bearer {}", self.config.api_token.expose()),
        );
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConsoleError::Transport(format!("request to {url} failed: {e}")))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ConsoleError::Transport(format!("failed to read response body: {e}")))?;
        Ok((status, text))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>> {
        let (status, text) = self.request_raw(method, path, body).await?;
        parse_optional(status, &text)
    }

    async fn request_required<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let (status, text) = self.request_raw(method, path, body).await?;
        parse_required(status, &text)
    }
}

#[async_trait]
impl AgentApi for HttpAgentApi {
    async fn list_agents(&self) -> Result<Vec<AgentRecord>> {
        self.request_required(reqwest::Method::GET, "agents", None)
            .await
    }

    async fn get_agent(&self, id: &str) -> Result<AgentRecord> {
        self.request_required(reqwest::Method::GET, &format!("agents/{id}"), None)
            .await
    }

    async fn create_agent(&self, draft: &WizardData) -> Result<AgentRecord> {
        let body = serde_json::to_value(draft)?;
        self.request_required(reqwest::Method::POST, "agents", Some(body))
            .await
    }

    async fn update_agent(&self, id: &str, patch: &AgentPatch) -> Result<Option<AgentRecord>> {
        let body = serde_json::to_value(patch)?;
        self.request(reqwest::Method::PATCH, &format!("agents/{id}"), Some(body))
            .await
    }

    async fn make_default_agent(&self, id: &str) -> Result<Option<AgentRecord>> {
        self.request(
            reqwest::Method::POST,
            &format!("agents/{id}/make-default"),
            None,
        )
        .await
    }

    async fn list_prompt_versions(&self, agent_id: &str) -> Result<PromptVersionList> {
        self.request_required(
            reqwest::Method::GET,
            &format!("agents/{agent_id}/prompt-versions"),
            None,
        )
        .await
    }
}

// ============================================================================
// In-Memory API (for testing)
// ============================================================================

/// In-memory API double
///
/// Behaves like the platform for the slice the console uses: records live in
/// a map, `make-default` is exclusive, prompt metadata is served per agent.
/// `fail_next_mutation` makes the next create/update/promote fail, for
/// exercising error paths.
#[derive(Default)]
pub struct MemoryAgentApi {
    agents: RwLock<HashMap<String, AgentRecord>>,
    prompt_versions: RwLock<HashMap<String, PromptVersionList>>,
    next_id: AtomicU64,
    fail_next: AtomicU16,
    fail_next_prompt_fetch: AtomicBool,
    prompt_version_calls: AtomicUsize,
}

impl MemoryAgentApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record
    pub async fn insert(&self, record: AgentRecord) {
        self.agents.write().await.insert(record.id.clone(), record);
    }

    /// Seed prompt metadata for an agent
    pub async fn set_prompt_versions(&self, agent_id: &str, versions: PromptVersionList) {
        self.prompt_versions
            .write()
            .await
            .insert(agent_id.to_string(), versions);
    }

    /// Make the next mutating call fail with a 500
    pub fn fail_next_mutation(&self) {
        self.fail_next_with(500);
    }

    /// Make the next mutating call fail with the given status
    pub fn fail_next_with(&self, status: u16) {
        self.fail_next.store(status, Ordering::SeqCst);
    }

    /// Make the next prompt-metadata fetch fail
    pub fn fail_next_prompt_fetch(&self) {
        self.fail_next_prompt_fetch.store(true, Ordering::SeqCst);
    }

    /// Number of prompt-metadata fetches observed
    pub fn prompt_version_calls(&self) -> usize {
        self.prompt_version_calls.load(Ordering::SeqCst)
    }

    fn check_fail(&self) -> Result<()> {
        match self.fail_next.swap(0, Ordering::SeqCst) {
            0 => Ok(()),
            401 => Err(ConsoleError::Unauthorized),
            status => Err(ConsoleError::Remote {
                status,
                message: "injected failure".to_string(),
            }),
        }
    }
}

#[async_trait]
impl AgentApi for MemoryAgentApi {
    async fn list_agents(&self) -> Result<Vec<AgentRecord>> {
        let mut agents: Vec<AgentRecord> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    async fn get_agent(&self, id: &str) -> Result<AgentRecord> {
        self.agents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ConsoleError::Remote {
                status: 404,
                message: format!("agent {id} not found"),
            })
    }

    async fn create_agent(&self, draft: &WizardData) -> Result<AgentRecord> {
        self.check_fail()?;
        let id = format!("agent-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = AgentRecord {
            id: id.clone(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            model: draft.model.clone(),
            temperature: draft.temperature,
            max_tokens: draft.max_tokens,
            vector_store_ids: draft.vector_store_ids.clone(),
            system_prompt: draft.system_prompt.clone(),
            welcome_message: draft.welcome_message.clone(),
            status: AgentStatus::Draft,
            is_default: false,
        };
        self.agents.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn update_agent(&self, id: &str, patch: &AgentPatch) -> Result<Option<AgentRecord>> {
        self.check_fail()?;
        let mut agents = self.agents.write().await;
        let record = agents.get_mut(id).ok_or_else(|| ConsoleError::Remote {
            status: 404,
            message: format!("agent {id} not found"),
        })?;

        if let Some(name) = &patch.name {
            record.name = name.clone();
        }
        if let Some(description) = &patch.description {
            record.description = description.clone();
        }
        if let Some(model) = &patch.model {
            record.model = model.clone();
        }
        if let Some(temperature) = patch.temperature {
            record.temperature = temperature;
        }
        if let Some(max_tokens) = patch.max_tokens {
            record.max_tokens = max_tokens;
        }
        if let Some(ids) = &patch.vector_store_ids {
            record.vector_store_ids = ids.clone();
        }
        if let Some(prompt) = &patch.system_prompt {
            record.system_prompt = prompt.clone();
        }
        if let Some(welcome) = &patch.welcome_message {
            record.welcome_message = welcome.clone();
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        Ok(Some(record.clone()))
    }

    async fn make_default_agent(&self, id: &str) -> Result<Option<AgentRecord>> {
        self.check_fail()?;
        let mut agents = self.agents.write().await;
        if !agents.contains_key(id) {
            return Err(ConsoleError::Remote {
                status: 404,
                message: format!("agent {id} not found"),
            });
        }
        for record in agents.values_mut() {
            record.is_default = record.id == id;
        }
        Ok(agents.get(id).cloned())
    }

    async fn list_prompt_versions(&self, agent_id: &str) -> Result<PromptVersionList> {
        self.prompt_version_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_prompt_fetch.swap(false, Ordering::SeqCst) {
            return Err(ConsoleError::Remote {
                status: 503,
                message: "prompt metadata unavailable".to_string(),
            });
        }
        Ok(self
            .prompt_versions
            .read()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================
