//! Publish coordinator
//!
//! Status transitions of the agent under edit: mark-ready and make-default.
//! Each action is gated (no-op when already in the target state) and
//! single-outstanding (an in-flight flag is set before the call and cleared
//! on every exit). On failure the draft is left untouched; on success the
//! derived fields come from the server record when present, else from the
//! optimistic target state.

use crate::api::{AgentApi, AgentPatch};
use crate::error::{ConsoleError, Result};
use crate::wizard::{AgentStatus, WizardData, WizardStep};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of a gated publish action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Transition applied; derived fields updated
    Applied,
    /// Gate closed: already in the target state or a submission outstanding
    Skipped,
}

/// Coordinates status transitions against the platform
pub struct PublishCoordinator {
    api: Arc<dyn AgentApi>,
    mark_ready_in_flight: AtomicBool,
    make_default_in_flight: AtomicBool,
}

impl PublishCoordinator {
    pub fn new(api: Arc<dyn AgentApi>) -> Self {
        Self {
            api,
            mark_ready_in_flight: AtomicBool::new(false),
            make_default_in_flight: AtomicBool::new(false),
        }
    }

    /// True when the mark-ready control should be enabled
    pub fn can_mark_ready(&self, draft: &WizardData) -> bool {
        draft.status != AgentStatus::Ready && !self.mark_ready_in_flight.load(Ordering::SeqCst)
    }

    /// True when the make-default control should be enabled
    pub fn can_make_default(&self, draft: &WizardData) -> bool {
        !draft.is_default && !self.make_default_in_flight.load(Ordering::SeqCst)
    }

    /// Transition the agent to `ready`.
    ///
    /// Skips when the gate is closed. An empty name fails validation before
    /// any network call, naming the identity step.
    pub async fn mark_ready(
        &self,
        agent_id: &str,
        draft: &mut WizardData,
    ) -> Result<PublishOutcome> {
        if draft.status == AgentStatus::Ready {
            tracing::debug!(agent_id, "mark-ready skipped: already ready");
            return Ok(PublishOutcome::Skipped);
        }
        if draft.name.trim().is_empty() {
            return Err(ConsoleError::Validation {
                step: WizardStep::Identity,
                reason: "agent name is required before marking ready".to_string(),
            });
        }
        if self.mark_ready_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(agent_id, "mark-ready skipped: submission outstanding");
            return Ok(PublishOutcome::Skipped);
        }

        let result = self
            .api
            .update_agent(agent_id, &AgentPatch::status(AgentStatus::Ready))
            .await;
        self.mark_ready_in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(Some(record)) => {
                draft.status = record.status;
                draft.is_default = record.is_default;
            }
            Ok(None) => {
                draft.status = AgentStatus::Ready;
            }
            Err(err) => return Err(err),
        }
        tracing::info!(agent_id, "agent marked ready");
        Ok(PublishOutcome::Applied)
    }

    /// Promote the agent to tenant default.
    pub async fn make_default(
        &self,
        agent_id: &str,
        draft: &mut WizardData,
    ) -> Result<PublishOutcome> {
        if draft.is_default {
            tracing::debug!(agent_id, "make-default skipped: already default");
            return Ok(PublishOutcome::Skipped);
        }
        if self.make_default_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!(agent_id, "make-default skipped: submission outstanding");
            return Ok(PublishOutcome::Skipped);
        }

        let result = self.api.make_default_agent(agent_id).await;
        self.make_default_in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(Some(record)) => {
                draft.status = record.status;
                draft.is_default = record.is_default;
            }
            Ok(None) => {
                draft.is_default = true;
            }
            Err(err) => return Err(err),
        }
        tracing::info!(agent_id, "agent promoted to default");
        Ok(PublishOutcome::Applied)
    }
}

// ============================================================================
// Tests
// ============================================================================
