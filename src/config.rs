//! Endpoint configuration
//!
//! Connection settings for the platform API: base URL, bearer credential,
//! optional tenant scope. Built programmatically and handed to the console;
//! the bearer credential is redacted in all log and debug output.

use std::time::Duration;

/// Default timeout for non-streaming CRUD calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A string wrapper that redacts its value in Debug and Display output
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value (use sparingly — only for HTTP headers)
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&String> for SecretString {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

/// Connection settings for the AgentDesk platform API
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    /// Base URL of the platform API, without a trailing slash
    pub base_url: String,
    /// Bearer credential sent on every request
    pub api_token: SecretString,
    /// Optional tenant scope forwarded to the test endpoint
    pub tenant_id: Option<String>,
    /// Timeout for non-streaming CRUD calls (streaming reads are unbounded)
    pub request_timeout: Duration,
}

impl ConsoleConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<SecretString>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_token: api_token.into(),
            tenant_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Scope test exchanges to a tenant
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL of the streaming test endpoint for an agent
    pub fn test_endpoint(&self, agent_id: &str) -> String {
        format!("{}/agents/{}/test", self.base_url, agent_id)
    }

    /// URL of a CRUD endpoint under the API base
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

// ============================================================================
// Tests
// ============================================================================
