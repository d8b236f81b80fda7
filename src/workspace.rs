//! Agent configuration workspace
//!
//! One explicit context object per open editor: wizard step and tab state,
//! the draft under edit, the streaming test session, lazily fetched prompt
//! metadata, and the publish flow. The embedding UI dispatches user intent
//! here and renders snapshots; there is no module-level state anywhere.
//!
//! Lifecycle rules enforced here:
//! - the test tab is reachable only once the agent has been persisted
//! - prompt metadata is fetched on first test-tab activation only
//! - the transcript survives tab and step switches; it is torn down only on
//!   close, on opening a different agent, or on explicit reset
//! - create-mode drafts can be snapshotted and resumed; a successful create
//!   clears the snapshot

use crate::api::{AgentApi, AgentPatch, PromptVersionList};
use crate::draft::{DraftSnapshot, DraftStore};
use crate::error::{ConsoleError, Result};
use crate::publish::{PublishCoordinator, PublishOutcome};
use crate::session::{TestSession, UnauthorizedHandler};
use crate::sse::StreamEvent;
use crate::transcript::Transcript;
use crate::transport::StreamTransport;
use crate::wizard::{DraftSummary, WizardData, WizardStep, WorkspaceTab};
use std::sync::Arc;

/// Transient, dismissable feedback for the embedding UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Info(String),
    Error(String),
}

/// Editor context for one agent (existing or not yet created)
pub struct Workspace {
    api: Arc<dyn AgentApi>,
    draft_store: Arc<dyn DraftStore>,
    session: TestSession,
    publish: PublishCoordinator,
    on_unauthorized: Option<UnauthorizedHandler>,

    data: WizardData,
    agent_id: Option<String>,
    step: WizardStep,
    tab: WorkspaceTab,
    prompt_versions: Option<PromptVersionList>,
    summary: Option<DraftSummary>,
    feedback: Option<Feedback>,
}

impl Workspace {
    /// Create-mode workspace with fresh defaults
    pub fn new(
        api: Arc<dyn AgentApi>,
        draft_store: Arc<dyn DraftStore>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            session: TestSession::new(transport),
            publish: PublishCoordinator::new(api.clone()),
            api,
            draft_store,
            on_unauthorized: None,
            data: WizardData::default(),
            agent_id: None,
            step: WizardStep::Identity,
            tab: WorkspaceTab::Configure,
            prompt_versions: None,
            summary: None,
            feedback: None,
        }
    }

    /// Create-mode workspace, hydrated from the saved draft snapshot when
    /// one exists
    pub async fn resume_draft(
        api: Arc<dyn AgentApi>,
        draft_store: Arc<dyn DraftStore>,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<Self> {
        let mut workspace = Self::new(api, draft_store, transport);
        if let Some(snapshot) = workspace.draft_store.load().await? {
            tracing::info!(saved_at = %snapshot.timestamp, "resuming wizard draft");
            workspace.data = snapshot.data;
        }
        Ok(workspace)
    }

    /// Edit-mode workspace, hydrated from an existing agent
    pub async fn edit(
        api: Arc<dyn AgentApi>,
        draft_store: Arc<dyn DraftStore>,
        transport: Arc<dyn StreamTransport>,
        agent_id: &str,
    ) -> Result<Self> {
        let mut workspace = Self::new(api, draft_store, transport);
        let record = workspace.api.get_agent(agent_id).await?;
        workspace.agent_id = Some(record.id.clone());
        workspace.data = record.into_draft();
        Ok(workspace)
    }

    /// Handler invoked when the platform rejects the bearer credential,
    /// whether during a test exchange or a CRUD call
    pub fn set_unauthorized_handler(&mut self, handler: UnauthorizedHandler) {
        self.session.set_unauthorized_handler(handler.clone());
        self.on_unauthorized = Some(handler);
    }

    // ========================================================================
    // Snapshot accessors
    // ========================================================================

    pub fn data(&self) -> &WizardData {
        &self.data
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn tab(&self) -> WorkspaceTab {
        self.tab
    }

    /// Review summary; populated while the behavior step is active
    pub fn summary(&self) -> Option<&DraftSummary> {
        self.summary.as_ref()
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// Take the pending feedback, dismissing it
    pub fn take_feedback(&mut self) -> Option<Feedback> {
        self.feedback.take()
    }

    /// Prompt metadata, once the test tab has fetched it
    pub fn prompt_versions(&self) -> Option<&PromptVersionList> {
        self.prompt_versions.as_ref()
    }

    pub async fn transcript(&self) -> Transcript {
        self.session.transcript().await
    }

    pub async fn is_streaming(&self) -> bool {
        self.session.is_active().await
    }

    /// Next applied stream event, if one is queued
    pub fn poll_session_event(&mut self) -> Option<StreamEvent> {
        self.session.poll_event()
    }

    pub fn can_mark_ready(&self) -> bool {
        self.publish.can_mark_ready(&self.data)
    }

    pub fn can_make_default(&self) -> bool {
        self.publish.can_make_default(&self.data)
    }

    // ========================================================================
    // Wizard navigation and edits
    // ========================================================================

    pub fn next_step(&mut self) -> WizardStep {
        if let Some(next) = self.step.next() {
            self.goto_step(next);
        }
        self.step
    }

    pub fn prev_step(&mut self) -> WizardStep {
        if let Some(prev) = self.step.prev() {
            self.goto_step(prev);
        }
        self.step
    }

    pub fn goto_step(&mut self, step: WizardStep) {
        self.step = step;
        if step.is_last() {
            self.summary = Some(self.data.summarize());
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.data.name = name.into();
        self.after_edit();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.data.description = description.into();
        self.after_edit();
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.data.model = model.into();
        self.after_edit();
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.data.temperature = temperature;
        self.after_edit();
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.data.max_tokens = max_tokens;
        self.after_edit();
    }

    pub fn set_vector_store_ids(&mut self, ids: Vec<String>) {
        self.data.vector_store_ids = ids;
        self.after_edit();
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.data.system_prompt = prompt.into();
        self.after_edit();
    }

    pub fn set_welcome_message(&mut self, message: impl Into<String>) {
        self.data.welcome_message = message.into();
        self.after_edit();
    }

    /// Final-step edits refresh the summary synchronously. The recomputation
    /// reads the draft only; transcript and session are never touched.
    fn after_edit(&mut self) {
        if self.step.is_last() {
            self.summary = Some(self.data.summarize());
        }
    }

    // ========================================================================
    // Tabs
    // ========================================================================

    /// Switch tabs. The test tab requires a persisted agent; its prompt
    /// metadata is fetched on first activation and cached for the lifetime
    /// of this workspace.
    pub async fn select_tab(&mut self, tab: WorkspaceTab) -> Result<()> {
        if tab == self.tab {
            return Ok(());
        }
        if tab == WorkspaceTab::Test {
            let agent_id = self.agent_id.clone().ok_or_else(|| ConsoleError::Validation {
                step: WizardStep::Identity,
                reason: "create the agent before opening the test tab".to_string(),
            })?;
            if self.prompt_versions.is_none() {
                match self.api.list_prompt_versions(&agent_id).await {
                    Ok(versions) => self.prompt_versions = Some(versions),
                    Err(err) => {
                        // metadata is advisory; the tab still opens and the
                        // next activation retries
                        tracing::warn!(error = %err, "prompt metadata fetch failed");
                        self.feedback = Some(Feedback::Error(err.to_string()));
                    }
                }
            }
        }
        self.tab = tab;
        Ok(())
    }

    // ========================================================================
    // Test session
    // ========================================================================

    /// Send a message to the agent under test.
    ///
    /// Returns `Ok(false)` without side effects when the message is blank or
    /// an exchange is already in flight. Stream failures are rendered into
    /// the transcript, never returned here.
    pub async fn send_test_message(&mut self, message: &str) -> Result<bool> {
        let agent_id = self.agent_id.clone().ok_or_else(|| ConsoleError::Validation {
            step: WizardStep::Identity,
            reason: "create the agent before testing it".to_string(),
        })?;
        let message = message.trim();
        if message.is_empty() {
            self.feedback = Some(Feedback::Error("Enter a message to test the agent".to_string()));
            return Ok(false);
        }

        let display_name = if self.data.name.trim().is_empty() {
            agent_id.clone()
        } else {
            self.data.name.clone()
        };
        Ok(self.session.start(&agent_id, &display_name, message).await)
    }

    /// Cancel the exchange in flight, if any. Idempotent.
    pub async fn cancel_test(&mut self) {
        self.session.cancel().await;
    }

    /// Tear down the live exchange and clear the transcript
    pub async fn reset_conversation(&mut self) {
        self.session.reset().await;
    }

    /// Wait until the live exchange has fully settled
    pub async fn settle(&mut self) {
        self.session.join().await;
    }

    /// Close the workspace: no stream survives this call
    pub async fn close(&mut self) {
        self.session.reset().await;
        self.session.join().await;
        self.prompt_versions = None;
        tracing::debug!("workspace closed");
    }

    /// Swap this workspace to a different agent. The current session is torn
    /// down only after the new record has been fetched; on failure the
    /// workspace is left exactly as it was.
    pub async fn open_agent(&mut self, agent_id: &str) -> Result<()> {
        let record = match self.api.get_agent(agent_id).await {
            Ok(record) => record,
            Err(err) => {
                self.note_unauthorized(&err);
                return Err(err);
            }
        };

        self.session.reset().await;
        self.session.join().await;
        self.agent_id = Some(record.id.clone());
        self.data = record.into_draft();
        self.step = WizardStep::Identity;
        self.tab = WorkspaceTab::Configure;
        self.prompt_versions = None;
        self.summary = None;
        self.feedback = None;
        tracing::debug!(agent_id, "workspace switched to agent");
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Snapshot the draft so an abandoned create flow can be resumed later
    pub async fn save_draft(&self) -> Result<()> {
        self.draft_store
            .save(&DraftSnapshot::now(self.data.clone()))
            .await
    }

    /// Create the agent from the draft. On success the workspace switches to
    /// edit mode and the draft snapshot is cleared; on failure both the form
    /// state and the snapshot survive.
    pub async fn create_agent(&mut self) -> Result<String> {
        self.data.validate()?;
        let record = match self.api.create_agent(&self.data).await {
            Ok(record) => record,
            Err(err) => {
                self.note_unauthorized(&err);
                return Err(err);
            }
        };

        let id = record.id.clone();
        self.agent_id = Some(id.clone());
        self.data = record.into_draft();
        if let Err(err) = self.draft_store.clear().await {
            tracing::warn!(error = %err, "failed to clear draft snapshot after create");
        }
        tracing::info!(agent_id = %id, "agent created");
        Ok(id)
    }

    /// Push the draft's editable fields to the platform
    pub async fn update_agent(&mut self) -> Result<()> {
        let agent_id = self.agent_id.clone().ok_or_else(|| ConsoleError::Validation {
            step: WizardStep::Identity,
            reason: "create the agent before saving changes".to_string(),
        })?;
        self.data.validate()?;

        let patch = AgentPatch::from_draft(&self.data);
        match self.api.update_agent(&agent_id, &patch).await {
            Ok(Some(record)) => {
                self.data = record.into_draft();
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                self.note_unauthorized(&err);
                Err(err)
            }
        }
    }

    // ========================================================================
    // Publish
    // ========================================================================

    /// Mark the agent ready. Failures become feedback; a validation failure
    /// additionally returns the user to the offending wizard step.
    pub async fn mark_ready(&mut self) -> PublishOutcome {
        let Some(agent_id) = self.agent_id.clone() else {
            self.feedback = Some(Feedback::Error(
                "Create the agent before publishing".to_string(),
            ));
            return PublishOutcome::Skipped;
        };
        let result = self.publish.mark_ready(&agent_id, &mut self.data).await;
        self.absorb_publish_result(result, "Agent marked ready")
    }

    /// Promote the agent to tenant default
    pub async fn make_default(&mut self) -> PublishOutcome {
        let Some(agent_id) = self.agent_id.clone() else {
            self.feedback = Some(Feedback::Error(
                "Create the agent before publishing".to_string(),
            ));
            return PublishOutcome::Skipped;
        };
        let result = self.publish.make_default(&agent_id, &mut self.data).await;
        self.absorb_publish_result(result, "Agent is now the tenant default")
    }

    fn absorb_publish_result(
        &mut self,
        result: Result<PublishOutcome>,
        applied_message: &str,
    ) -> PublishOutcome {
        match result {
            Ok(PublishOutcome::Applied) => {
                self.feedback = Some(Feedback::Info(applied_message.to_string()));
                PublishOutcome::Applied
            }
            Ok(PublishOutcome::Skipped) => PublishOutcome::Skipped,
            Err(ConsoleError::Validation { step, reason }) => {
                self.tab = WorkspaceTab::Configure;
                self.goto_step(step);
                self.feedback = Some(Feedback::Error(reason));
                PublishOutcome::Skipped
            }
            Err(err) => {
                self.note_unauthorized(&err);
                self.feedback = Some(Feedback::Error(err.to_string()));
                PublishOutcome::Skipped
            }
        }
    }

    fn note_unauthorized(&self, err: &ConsoleError) {
        if matches!(err, ConsoleError::Unauthorized) {
            if let Some(handler) = &self.on_unauthorized {
                handler();
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
