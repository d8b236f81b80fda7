//! Console flow integration tests
//!
//! End-to-end tests driving a Workspace the way the admin console does:
//! create an agent through the wizard, open the test tab, stream a reply,
//! cancel mid-stream, resume an abandoned draft, and publish. I/O is backed
//! by the in-memory API double, a file-based draft store, and scripted
//! transports.

use agentdesk_core::{
    AgentApi, AgentStatus, ByteStream, ConsoleError, DraftStore, FileDraftStore, MemoryAgentApi,
    MemoryDraftStore, PublishOutcome, Result, StreamPhase, StreamTransport, WizardStep, Workspace,
    WorkspaceTab,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Transport that replays the same short exchange on every open
struct EchoTransport;

#[async_trait]
impl StreamTransport for EchoTransport {
    async fn open(&self, _agent_id: &str, _message: &str) -> Result<ByteStream> {
        let frames: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"type\":\"start\",\"agent\":\"Support Bot\"}\n\n",
            )),
            Ok(Bytes::from_static(
                b"data: {\"type\":\"chunk\",\"content\":\"We are open\"}\n\n",
            )),
            Ok(Bytes::from_static(
                b"data: {\"type\":\"chunk\",\"content\":\" 9am to 5pm.\"}\n\n",
            )),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        Ok(futures::stream::iter(frames).boxed())
    }
}

/// Transport that yields one chunk, then holds the stream open on a gate
struct GatedTransport {
    gate: Arc<Notify>,
}

#[async_trait]
impl StreamTransport for GatedTransport {
    async fn open(&self, _agent_id: &str, _message: &str) -> Result<ByteStream> {
        let gate = self.gate.clone();
        let stream: ByteStream = Box::pin(async_stream::stream! {
            yield Ok(Bytes::from_static(
                b"data: {\"type\":\"chunk\",\"content\":\"thinking\"}\n\n",
            ));
            gate.notified().await;
            yield Ok(Bytes::from_static(b"data: [DONE]\n\n"));
        });
        Ok(stream)
    }
}

/// Transport that always rejects the credential
struct UnauthorizedTransport;

#[async_trait]
impl StreamTransport for UnauthorizedTransport {
    async fn open(&self, _agent_id: &str, _message: &str) -> Result<ByteStream> {
        Err(ConsoleError::Unauthorized)
    }
}

fn workspace_with(transport: Arc<dyn StreamTransport>) -> (Arc<MemoryAgentApi>, Workspace) {
    let api = Arc::new(MemoryAgentApi::new());
    let workspace = Workspace::new(api.clone(), Arc::new(MemoryDraftStore::new()), transport);
    (api, workspace)
}

async fn wait_for_content(workspace: &Workspace, expected: &str) {
    for _ in 0..1000 {
        let transcript = workspace.transcript().await;
        if transcript
            .last()
            .map(|m| m.content == expected)
            .unwrap_or(false)
        {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("transcript never reached {expected:?}");
}

// ─── Create → Test → Publish ─────────────────────────────────────

#[tokio::test]
async fn test_full_wizard_to_publish_flow() {
    init_tracing();
    let (api, mut workspace) = workspace_with(Arc::new(EchoTransport));

    // walk the wizard
    assert_eq!(workspace.step(), WizardStep::Identity);
    workspace.set_name("Support Bot");
    workspace.set_description("Answers support questions");
    workspace.next_step();
    workspace.set_model("gpt-4");
    workspace.set_temperature(0.2);
    workspace.next_step();
    workspace.set_vector_store_ids(vec!["vs-docs".to_string()]);
    workspace.next_step();
    workspace.set_system_prompt("Answer briefly.");
    assert_eq!(workspace.step(), WizardStep::Behavior);

    let summary = workspace.summary().expect("summary on the final step");
    assert_eq!(summary.name, "Support Bot");
    assert_eq!(summary.model, "gpt-4");
    assert_eq!(summary.knowledge_sources, 1);

    // persist, then test
    let id = workspace.create_agent().await.unwrap();
    workspace.select_tab(WorkspaceTab::Test).await.unwrap();
    assert!(workspace
        .send_test_message("What are your opening hours?")
        .await
        .unwrap());
    workspace.settle().await;

    let transcript = workspace.transcript().await;
    assert_eq!(transcript.phase(), StreamPhase::Completed);
    assert_eq!(transcript.last().unwrap().content, "We are open 9am to 5pm.");
    assert!(!transcript.last().unwrap().streaming);

    // publish
    assert_eq!(workspace.mark_ready().await, PublishOutcome::Applied);
    assert_eq!(workspace.make_default().await, PublishOutcome::Applied);

    let record = api.get_agent(&id).await.unwrap();
    assert_eq!(record.status, AgentStatus::Ready);
    assert!(record.is_default);
    assert_eq!(workspace.data().status, AgentStatus::Ready);
    assert!(workspace.data().is_default);
}

#[tokio::test]
async fn test_transcript_survives_navigation_but_not_agent_switch() {
    init_tracing();
    let (api, mut workspace) = workspace_with(Arc::new(EchoTransport));
    workspace.set_name("Support Bot");
    workspace.create_agent().await.unwrap();

    workspace.select_tab(WorkspaceTab::Test).await.unwrap();
    workspace.send_test_message("hello").await.unwrap();
    workspace.settle().await;
    let before = workspace.transcript().await;

    // tab and step navigation keep the conversation
    workspace.select_tab(WorkspaceTab::Configure).await.unwrap();
    workspace.next_step();
    workspace.prev_step();
    workspace.select_tab(WorkspaceTab::Test).await.unwrap();
    assert_eq!(workspace.transcript().await.messages(), before.messages());

    // opening another agent discards it
    let other = api
        .create_agent(&agentdesk_core::WizardData {
            name: "Billing Bot".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    workspace.open_agent(&other.id).await.unwrap();
    assert!(workspace.transcript().await.messages().is_empty());
    assert_eq!(workspace.data().name, "Billing Bot");
}

// ─── Cancellation ────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_mid_stream_keeps_partial_reply() {
    init_tracing();
    let gate = Arc::new(Notify::new());
    let (_, mut workspace) = workspace_with(Arc::new(GatedTransport { gate: gate.clone() }));
    workspace.set_name("Support Bot");
    workspace.create_agent().await.unwrap();
    workspace.select_tab(WorkspaceTab::Test).await.unwrap();

    workspace.send_test_message("hello").await.unwrap();
    wait_for_content(&workspace, "thinking").await;

    workspace.cancel_test().await;
    gate.notify_one();
    workspace.settle().await;

    let transcript = workspace.transcript().await;
    assert_eq!(transcript.phase(), StreamPhase::Cancelled);
    assert_eq!(transcript.messages().len(), 2, "no error entry added");
    assert_eq!(transcript.last().unwrap().content, "thinking");
    assert!(!transcript.last().unwrap().streaming);
    assert!(!workspace.is_streaming().await);

    // the next exchange starts cleanly
    assert!(workspace.send_test_message("again").await.unwrap());
}

// ─── Draft resume across restarts ────────────────────────────────

#[tokio::test]
async fn test_abandoned_draft_resumes_after_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MemoryAgentApi::new());

    // first visit: fill in half the wizard, save, walk away
    {
        let store = Arc::new(FileDraftStore::new(dir.path()).await.unwrap());
        let mut workspace = Workspace::new(api.clone(), store, Arc::new(EchoTransport));
        workspace.set_name("Half-finished Bot");
        workspace.set_model("gpt-4");
        workspace.set_vector_store_ids(vec!["vs-1".to_string(), "vs-2".to_string()]);
        workspace.save_draft().await.unwrap();
        workspace.close().await;
    }

    // second visit: the draft hydrates a fresh create-mode workspace
    let store = Arc::new(FileDraftStore::new(dir.path()).await.unwrap());
    let mut workspace = Workspace::resume_draft(api, store.clone(), Arc::new(EchoTransport))
        .await
        .unwrap();
    assert!(workspace.agent_id().is_none());
    assert_eq!(workspace.data().name, "Half-finished Bot");
    assert_eq!(workspace.data().model, "gpt-4");
    assert_eq!(workspace.data().vector_store_ids.len(), 2);

    // a successful create clears the slot
    workspace.create_agent().await.unwrap();
    assert!(store.load().await.unwrap().is_none());
}

// ─── Error paths ─────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_stream_escalates_without_transcript_noise() {
    init_tracing();
    let (_, mut workspace) = workspace_with(Arc::new(UnauthorizedTransport));
    workspace.set_name("Support Bot");
    workspace.create_agent().await.unwrap();

    let flagged = Arc::new(AtomicBool::new(false));
    let flag = flagged.clone();
    workspace.set_unauthorized_handler(Arc::new(move || {
        flag.store(true, Ordering::SeqCst);
    }));

    workspace.send_test_message("hello").await.unwrap();
    workspace.settle().await;

    assert!(flagged.load(Ordering::SeqCst), "handler not invoked");
    let transcript = workspace.transcript().await;
    assert_eq!(transcript.messages().len(), 2, "no error entry");
    assert_eq!(transcript.status(), None);
    assert!(!workspace.is_streaming().await);
}

#[tokio::test]
async fn test_publish_failure_leaves_everything_as_before() {
    init_tracing();
    let (api, mut workspace) = workspace_with(Arc::new(EchoTransport));
    workspace.set_name("Support Bot");
    let id = workspace.create_agent().await.unwrap();

    api.fail_next_mutation();
    assert_eq!(workspace.mark_ready().await, PublishOutcome::Skipped);
    assert_eq!(workspace.data().status, AgentStatus::Draft);
    assert_eq!(api.get_agent(&id).await.unwrap().status, AgentStatus::Draft);
    assert!(workspace.take_feedback().is_some());

    // the gate reopens after the failure
    assert!(workspace.can_mark_ready());
    assert_eq!(workspace.mark_ready().await, PublishOutcome::Applied);
    assert_eq!(workspace.data().status, AgentStatus::Ready);
}
