//! Streaming test session
//!
//! Owns at most one live exchange with an agent's test endpoint. The reader
//! task decodes fragments and applies events to the shared transcript under
//! an identity guard: every mutation first checks that its handle is still
//! the active one, so a cancelled stream can never touch the transcript
//! again, even with fragments still in flight.

use crate::error::ConsoleError;
use crate::sse::{FrameDecoder, StreamEvent};
use crate::transcript::{Transcript, DEFAULT_MAX_MESSAGES};
use crate::transport::StreamTransport;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

/// Callback invoked when the platform rejects the bearer credential
/// mid-session. The transcript is finalized silently before the call; the
/// handler owns all further consequences (re-login, workspace shutdown).
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Identity of one live exchange
struct SessionHandle {
    id: Uuid,
    agent_id: String,
    abort: Option<AbortHandle>,
}

/// Transcript and active handle live under one lock so the identity check
/// and the mutation are atomic.
struct SessionShared {
    transcript: Transcript,
    active: Option<SessionHandle>,
}

impl SessionShared {
    fn is_current(&self, id: Uuid) -> bool {
        self.active.as_ref().map(|h| h.id) == Some(id)
    }
}

/// Interactive test session against one agent
pub struct TestSession {
    transport: Arc<dyn StreamTransport>,
    shared: Arc<RwLock<SessionShared>>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events_rx: mpsc::UnboundedReceiver<StreamEvent>,
    on_unauthorized: Option<UnauthorizedHandler>,
    reader: Option<JoinHandle<()>>,
}

impl TestSession {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self::with_history_cap(transport, DEFAULT_MAX_MESSAGES)
    }

    /// Session with a custom transcript history cap (0 means unlimited)
    pub fn with_history_cap(transport: Arc<dyn StreamTransport>, cap: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            shared: Arc::new(RwLock::new(SessionShared {
                transcript: Transcript::new().with_max_messages(cap),
                active: None,
            })),
            events_tx,
            events_rx,
            on_unauthorized: None,
            reader: None,
        }
    }

    pub fn set_unauthorized_handler(&mut self, handler: UnauthorizedHandler) {
        self.on_unauthorized = Some(handler);
    }

    /// Begin a streaming exchange.
    ///
    /// Returns `false` without side effects when a stream is already in
    /// flight. Otherwise the user message and an empty assistant placeholder
    /// are appended before any network activity, and a reader task is
    /// spawned to decode the response. Stream failures are rendered into the
    /// transcript, never returned.
    pub async fn start(&mut self, agent_id: &str, agent_name: &str, message: &str) -> bool {
        let handle_id = Uuid::new_v4();
        {
            let mut shared = self.shared.write().await;
            if shared.active.is_some() {
                tracing::debug!(agent_id, "start ignored: a stream is already in flight");
                return false;
            }
            shared.transcript.begin_exchange(agent_name, message);
            shared.active = Some(SessionHandle {
                id: handle_id,
                agent_id: agent_id.to_string(),
                abort: None,
            });
        }

        let task = tokio::spawn(run_stream(
            self.transport.clone(),
            self.shared.clone(),
            self.events_tx.clone(),
            self.on_unauthorized.clone(),
            handle_id,
            agent_id.to_string(),
            message.to_string(),
        ));

        {
            let mut shared = self.shared.write().await;
            if let Some(active) = shared.active.as_mut() {
                if active.id == handle_id {
                    active.abort = Some(task.abort_handle());
                }
            }
        }
        self.reader = Some(task);
        tracing::debug!(agent_id, stream_id = %handle_id, "test stream started");
        true
    }

    /// Cancel the live exchange, if any. Idempotent.
    ///
    /// The placeholder keeps its partial content and is closed silently; no
    /// event from the old stream can reach the transcript afterwards.
    pub async fn cancel(&mut self) {
        let handle = {
            let mut shared = self.shared.write().await;
            let handle = shared.active.take();
            if handle.is_some() {
                shared.transcript.finalize_cancelled();
            }
            handle
        };
        if let Some(handle) = handle {
            if let Some(abort) = handle.abort {
                abort.abort();
            }
            tracing::debug!(agent_id = %handle.agent_id, stream_id = %handle.id, "test stream cancelled");
        }
    }

    /// Cancel any live exchange and discard the transcript
    pub async fn reset(&mut self) {
        self.cancel().await;
        self.shared.write().await.transcript.clear();
        tracing::debug!("test conversation reset");
    }

    /// Wait for the reader task to settle. Aborted readers settle with a
    /// join error, which is expected after [`cancel`](Self::cancel).
    pub async fn join(&mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
    }

    /// Snapshot of the current transcript
    pub async fn transcript(&self) -> Transcript {
        self.shared.read().await.transcript.clone()
    }

    /// True while an exchange is in flight
    pub async fn is_active(&self) -> bool {
        self.shared.read().await.active.is_some()
    }

    /// Agent of the exchange in flight, if any
    pub async fn active_agent(&self) -> Option<String> {
        self.shared
            .read()
            .await
            .active
            .as_ref()
            .map(|h| h.agent_id.clone())
    }

    /// Next applied event, if one is queued. Events are mirrored here in
    /// application order so the embedder can re-render incrementally.
    pub fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events_rx.try_recv().ok()
    }
}

// ============================================================================
// Reader Task
// ============================================================================

/// Apply one event under the identity guard. Returns `false` when the handle
/// is no longer active: the event is dropped and the reader should stop.
async fn deliver(
    shared: &Arc<RwLock<SessionShared>>,
    events: &mpsc::UnboundedSender<StreamEvent>,
    handle_id: Uuid,
    event: StreamEvent,
) -> bool {
    let mut guard = shared.write().await;
    if !guard.is_current(handle_id) {
        tracing::debug!(stream_id = %handle_id, "dropping event for stale stream");
        return false;
    }
    let terminal = event.is_terminal();
    guard.transcript.apply(&event);
    if terminal {
        guard.active = None;
    }
    let _ = events.send(event);
    true
}

/// Finalize silently and hand control to the unauthorized handler
async fn escalate_unauthorized(
    shared: &Arc<RwLock<SessionShared>>,
    on_unauthorized: &Option<UnauthorizedHandler>,
    handle_id: Uuid,
) {
    {
        let mut guard = shared.write().await;
        if !guard.is_current(handle_id) {
            return;
        }
        guard.active = None;
        guard.transcript.finalize_cancelled();
    }
    tracing::warn!("test stream rejected: bearer credential invalid or expired");
    if let Some(handler) = on_unauthorized {
        handler();
    }
}

async fn run_stream(
    transport: Arc<dyn StreamTransport>,
    shared: Arc<RwLock<SessionShared>>,
    events: mpsc::UnboundedSender<StreamEvent>,
    on_unauthorized: Option<UnauthorizedHandler>,
    handle_id: Uuid,
    agent_id: String,
    message: String,
) {
    let mut source = match transport.open(&agent_id, &message).await {
        Ok(source) => source,
        Err(ConsoleError::Unauthorized) => {
            escalate_unauthorized(&shared, &on_unauthorized, handle_id).await;
            return;
        }
        Err(err) => {
            let synthesized = StreamEvent::Error {
                message: err.to_string(),
            };
            deliver(&shared, &events, handle_id, synthesized).await;
            return;
        }
    };

    let mut decoder = FrameDecoder::new();
    let mut terminated = false;

    'read: while let Some(fragment) = source.next().await {
        match fragment {
            Ok(bytes) => {
                for event in decoder.push(&bytes) {
                    let terminal = event.is_terminal();
                    if !deliver(&shared, &events, handle_id, event).await {
                        return;
                    }
                    if terminal {
                        terminated = true;
                        break 'read;
                    }
                }
            }
            Err(ConsoleError::Unauthorized) => {
                escalate_unauthorized(&shared, &on_unauthorized, handle_id).await;
                return;
            }
            Err(err) => {
                let synthesized = StreamEvent::Error {
                    message: err.to_string(),
                };
                deliver(&shared, &events, handle_id, synthesized).await;
                return;
            }
        }
    }

    if !terminated {
        // end of transport: flush any buffered tail, then close the exchange
        for event in decoder.finish() {
            let terminal = event.is_terminal();
            if !deliver(&shared, &events, handle_id, event).await {
                return;
            }
            if terminal {
                terminated = true;
            }
        }
    }
    if !terminated {
        deliver(&shared, &events, handle_id, StreamEvent::Done).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
