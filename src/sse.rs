//! Streaming wire format for the agent test endpoint
//!
//! The test endpoint replies with a chunked body using SSE-style framing:
//! - frames are separated by a blank line (`\n\n` or `\r\n\r\n`)
//! - `event:` lines set the frame tag (default `message`)
//! - `data:` lines carry the payload; repeated lines are joined with `\n`
//! - lines starting with `:` are comments and are skipped
//! - a payload of exactly `[DONE]` ends the stream regardless of tag
//!
//! The decoder is incremental: transport fragments may split a frame at any
//! byte boundary, so an incomplete tail is buffered until the next fragment
//! and flushed as an implicit final frame at end of stream. Payloads that do
//! not parse as structured events degrade to [`StreamEvent::Raw`] instead of
//! failing the stream.

use serde::{Deserialize, Serialize};

/// End-of-stream sentinel payload
pub const DONE_SENTINEL: &str = "[DONE]";

/// Frame tag used when no `event:` line is present
const DEFAULT_TAG: &str = "message";

// ============================================================================
// Protocol Events
// ============================================================================

/// One decoded protocol event from the test endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Stream opened; `agent` names the agent under test (may be empty)
    Start {
        #[serde(default)]
        agent: String,
    },
    /// Incremental assistant text
    Chunk { content: String },
    /// Out-of-band server notice
    Notice { content: String },
    /// Tool invocation reported by the runtime, args passed through verbatim
    ToolCall {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Server-reported failure; terminal
    Error { message: String },
    /// Normal end of stream; terminal
    Done,
    /// Frame whose payload was not a structured event; `event` is the frame
    /// tag and `content` the raw payload
    Raw { event: String, content: String },
}

impl StreamEvent {
    /// Terminal events end the stream; nothing is delivered after them
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

// ============================================================================
// Frame Decoder
// ============================================================================

/// Incremental decoder for the framed test-endpoint stream
///
/// Feed raw fragments with [`push`](Self::push) as they arrive and call
/// [`finish`](Self::finish) at end of stream. Once a terminal event has been
/// emitted the decoder is closed and ignores further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    closed: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment; returns every event completed by it, in order.
    ///
    /// Fragments need not align with frame boundaries. An incomplete frame
    /// stays buffered until a later fragment (or [`finish`](Self::finish))
    /// completes it.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        if self.closed {
            return Vec::new();
        }
        self.buf.extend_from_slice(fragment);

        let mut events = Vec::new();
        while let Some((end, delim_len)) = find_frame_boundary(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            if let Some(event) = decode_frame(&frame) {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.closed = true;
                    self.buf.clear();
                    break;
                }
            }
        }
        events
    }

    /// Flush a buffered tail as an implicit final frame.
    ///
    /// Streams that end without a trailing blank line still carry one last
    /// frame; after a terminal event this is a no-op.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let tail = std::mem::take(&mut self.buf);
        if tail.iter().all(|b| b.is_ascii_whitespace()) {
            return Vec::new();
        }
        decode_frame(&tail).into_iter().collect()
    }

    /// True once a terminal event has been emitted or the tail was flushed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Find the first frame boundary: `\n\n` or `\r\n\r\n`, whichever comes first.
/// Returns (frame end, delimiter length).
fn find_frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i] == b'\r' && i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

/// Decode one complete frame into an event.
///
/// Frames without any `data:` line (comments, keep-alives) yield nothing.
/// A `[DONE]` payload short-circuits to [`StreamEvent::Done`]; anything else
/// is parsed as a structured event and degrades to [`StreamEvent::Raw`] on
/// parse failure.
fn decode_frame(frame: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(frame);
    let mut tag: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            tag = Some(rest.trim_start());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let tag = tag.unwrap_or(DEFAULT_TAG);
    let payload = data_lines.join("\n");

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<StreamEvent>(&payload) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::debug!(tag, error = %err, "unstructured frame payload, degrading to raw");
            Some(StreamEvent::Raw {
                event: tag.to_string(),
                content: payload,
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
