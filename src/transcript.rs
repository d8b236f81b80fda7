//! Transcript state for one test conversation
//!
//! The transcript is the reduced view the embedding UI renders. Reduction is
//! a pure state transition per decoded event; the session feeds it under its
//! own guard. Invariants:
//! - entries are append-only and never reordered
//! - at most one entry has `streaming == true`, and it is always the last
//! - once a terminal phase is reached, further events are ignored

use crate::sse::StreamEvent;
use serde::{Deserialize, Serialize};

/// Default history cap, matching the platform's embedded chat widget
pub const DEFAULT_MAX_MESSAGES: usize = 100;

// ============================================================================
// Messages
// ============================================================================

/// Author of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// True only while this entry is the open end of a live stream
    #[serde(default)]
    pub streaming: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            streaming: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            streaming: false,
        }
    }

    fn placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
        }
    }
}

// ============================================================================
// Stream Phase
// ============================================================================

/// Lifecycle of the current stream within the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamPhase {
    /// No exchange in progress
    #[default]
    Idle,
    /// Placeholder appended; events are being applied
    Streaming,
    /// Terminal: the stream ended with `done`
    Completed,
    /// Terminal: the stream ended with `error`
    Failed,
    /// Terminal: torn down without a terminal frame (user cancel or
    /// credential escalation). No wire event maps to this phase.
    Cancelled,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::Failed | StreamPhase::Cancelled
        )
    }
}

// ============================================================================
// Transcript
// ============================================================================

/// Reduced view of one test conversation
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    phase: StreamPhase,
    /// Transient status line (e.g. while streaming), not a transcript entry
    status: Option<String>,
    /// Name shown in status lines when the wire omits it
    agent_name: String,
    /// History cap; oldest entries are dropped first, never the open stream
    max_messages: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            phase: StreamPhase::Idle,
            status: None,
            agent_name: String::new(),
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    /// Override the history cap (0 means unlimited)
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// True while an assistant placeholder is open at the end of the log
    pub fn has_open_stream(&self) -> bool {
        self.messages.last().map(|m| m.streaming).unwrap_or(false)
    }

    /// Optimistic two-phase append: the user's message and an empty assistant
    /// placeholder land before any network activity. Later chunks mutate the
    /// placeholder in place.
    pub fn begin_exchange(&mut self, agent_name: &str, user_text: &str) {
        self.close_stream();
        self.agent_name = agent_name.to_string();
        self.status = None;
        self.append(ChatMessage::user(user_text));
        self.append(ChatMessage::placeholder());
        self.phase = StreamPhase::Streaming;
    }

    /// Apply one decoded event. Pure transition: no I/O, no session state.
    /// Events arriving outside an open exchange are ignored.
    pub fn apply(&mut self, event: &StreamEvent) {
        if self.phase != StreamPhase::Streaming {
            return;
        }
        match event {
            StreamEvent::Start { agent } => {
                let name = if agent.is_empty() {
                    self.agent_name.as_str()
                } else {
                    agent.as_str()
                };
                self.status = Some(format!("Streaming response from {name}"));
            }
            StreamEvent::Chunk { content } => {
                if let Some(open) = self.open_stream_mut() {
                    open.content.push_str(content);
                }
            }
            StreamEvent::Notice { content } => {
                self.append(ChatMessage::system(content.clone()));
            }
            StreamEvent::ToolCall { name, args } => {
                self.append(ChatMessage::system(format!("Tool call: {name} {args}")));
            }
            StreamEvent::Raw { event, content } => {
                self.append(ChatMessage::system(format!("[{event}] {content}")));
            }
            StreamEvent::Error { message } => {
                self.close_stream();
                self.status = Some(format!("Stream failed: {message}"));
                self.phase = StreamPhase::Failed;
            }
            StreamEvent::Done => {
                self.close_stream();
                self.status = None;
                self.phase = StreamPhase::Completed;
            }
        }
    }

    /// Teardown without a terminal frame: the placeholder keeps whatever
    /// content it has and no error entry is added.
    pub fn finalize_cancelled(&mut self) {
        if self.phase != StreamPhase::Streaming {
            return;
        }
        self.close_stream();
        self.status = None;
        self.phase = StreamPhase::Cancelled;
    }

    /// Discard the whole conversation
    pub fn clear(&mut self) {
        self.messages.clear();
        self.phase = StreamPhase::Idle;
        self.status = None;
    }

    fn open_stream_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.last_mut().filter(|m| m.streaming)
    }

    fn close_stream(&mut self) {
        if let Some(open) = self.open_stream_mut() {
            open.streaming = false;
        }
    }

    /// Append keeping the open placeholder as the last element: system
    /// entries that arrive mid-stream land just above it.
    fn append(&mut self, message: ChatMessage) {
        if self.has_open_stream() && !message.streaming {
            let idx = self.messages.len() - 1;
            self.messages.insert(idx, message);
        } else {
            self.messages.push(message);
        }
        self.enforce_cap();
    }

    fn enforce_cap(&mut self) {
        if self.max_messages == 0 || self.messages.len() <= self.max_messages {
            return;
        }
        let excess = self.messages.len() - self.max_messages;
        // the open placeholder is always last, so trimming from the front is
        // safe as long as at least the tail survives
        let excess = excess.min(self.messages.len().saturating_sub(1));
        self.messages.drain(..excess);
    }
}

// ============================================================================
// Tests
// ============================================================================
