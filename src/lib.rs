//! # agentdesk-core
//!
//! Embeddable core of the AgentDesk admin console for a managed-chatbot
//! platform: the interactive agent test/streaming session manager, the
//! configuration-wizard state machine around it, and the publish flow.
//!
//! ## Overview
//!
//! A [`Workspace`] is one open agent editor. It owns the wizard draft, the
//! step and tab state, and the streaming [`TestSession`] for the test tab.
//! The embedding UI dispatches user intent into the workspace and renders
//! snapshots; all rendering concerns stay outside this crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentdesk_core::{
//!     ConsoleConfig, HttpAgentApi, HttpStreamTransport, MemoryDraftStore, Workspace,
//!     WorkspaceTab,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> agentdesk_core::Result<()> {
//! let config = ConsoleConfig::new("https://api.agentdesk.example", "token");
//! let mut workspace = Workspace::new(
//!     Arc::new(HttpAgentApi::new(config.clone())?),
//!     Arc::new(MemoryDraftStore::new()),
//!     Arc::new(HttpStreamTransport::new(config)),
//! );
//!
//! workspace.set_name("Support Bot");
//! workspace.create_agent().await?;
//! workspace.select_tab(WorkspaceTab::Test).await?;
//! workspace.send_test_message("What are your opening hours?").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **FrameDecoder** — incremental decoder for the SSE-style test stream
//! - **Transcript** — pure reducer from decoded events to the conversation view
//! - **TestSession** — single-flight owner of one live streaming exchange
//! - **Workspace** — the explicit context object tying wizard, tabs, session,
//!   drafts, and publishing together
//! - **PublishCoordinator** — gated status transitions (mark-ready, make-default)
//! - **AgentApi** / **DraftStore** / **StreamTransport** — swappable I/O seams

pub mod api;
pub mod config;
pub mod draft;
pub mod error;
pub mod publish;
pub mod session;
pub mod sse;
pub mod transcript;
pub mod transport;
pub mod wizard;
pub mod workspace;

// Re-export core types
pub use api::{
    AgentApi, AgentPatch, AgentRecord, HttpAgentApi, MemoryAgentApi, PromptVersion,
    PromptVersionList,
};
pub use config::{ConsoleConfig, SecretString};
pub use draft::{DraftSnapshot, DraftStore, FileDraftStore, MemoryDraftStore, DRAFT_STORAGE_KEY};
pub use error::{ConsoleError, Result};
pub use publish::{PublishCoordinator, PublishOutcome};
pub use session::{TestSession, UnauthorizedHandler};
pub use sse::{FrameDecoder, StreamEvent};
pub use transcript::{ChatMessage, Role, StreamPhase, Transcript};
pub use transport::{ByteStream, HttpStreamTransport, StreamTransport, TestRequest};
pub use wizard::{AgentStatus, DraftSummary, WizardData, WizardStep, WorkspaceTab};
pub use workspace::{Feedback, Workspace};
