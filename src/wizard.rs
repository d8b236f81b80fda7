//! Agent configuration wizard
//!
//! Four linear steps gather the agent draft: identity, runtime, knowledge,
//! behavior. The draft itself is plain serializable state; step and tab
//! lifecycle decisions live in the workspace.

use serde::{Deserialize, Deserializer, Serialize};

/// Wizard steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Identity,
    Runtime,
    Knowledge,
    Behavior,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Identity,
        WizardStep::Runtime,
        WizardStep::Knowledge,
        WizardStep::Behavior,
    ];

    pub fn index(self) -> usize {
        match self {
            WizardStep::Identity => 0,
            WizardStep::Runtime => 1,
            WizardStep::Knowledge => 2,
            WizardStep::Behavior => 3,
        }
    }

    pub fn next(self) -> Option<WizardStep> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<WizardStep> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WizardStep::Identity => "identity",
            WizardStep::Runtime => "runtime",
            WizardStep::Knowledge => "knowledge",
            WizardStep::Behavior => "behavior",
        };
        f.write_str(name)
    }
}

/// Workspace tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceTab {
    Configure,
    Test,
}

/// Agent lifecycle status as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Draft,
    Ready,
    /// Any status this console version does not model
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Wizard Data
// ============================================================================

/// The agent draft under edit
///
/// Field groups follow the wizard steps; `status` and `is_default` are
/// derived from the server and only change through CRUD responses or the
/// publish flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardData {
    // Identity
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,

    // Runtime
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // Knowledge
    #[serde(default, deserialize_with = "string_or_seq")]
    pub vector_store_ids: Vec<String>,

    // Behavior
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub welcome_message: String,

    // Derived
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub is_default: bool,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

/// Accept both a single id and a list; older drafts stored a scalar
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(OneOrMany::One(id)) => Ok(vec![id]),
        Some(OneOrMany::Many(ids)) => Ok(ids),
    }
}

impl Default for WizardData {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            vector_store_ids: Vec::new(),
            system_prompt: String::new(),
            welcome_message: String::new(),
            status: AgentStatus::Draft,
            is_default: false,
        }
    }
}

impl WizardData {
    /// Required-field check run before create and before mark-ready
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::error::ConsoleError::Validation {
                step: WizardStep::Identity,
                reason: "agent name is required".to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(crate::error::ConsoleError::Validation {
                step: WizardStep::Runtime,
                reason: "model is required".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(crate::error::ConsoleError::Validation {
                step: WizardStep::Runtime,
                reason: format!("temperature {} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }

    /// Review summary for the final step, derived from the draft alone
    pub fn summarize(&self) -> DraftSummary {
        DraftSummary {
            name: self.name.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            knowledge_sources: self.vector_store_ids.len(),
            has_system_prompt: !self.system_prompt.trim().is_empty(),
            status: self.status,
        }
    }
}

/// Read-only review of the draft, shown on the behavior step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub name: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub knowledge_sources: usize,
    pub has_system_prompt: bool,
    pub status: AgentStatus,
}

// ============================================================================
// Tests
// ============================================================================
