//! Streaming Chat Bridge
//!
//! Adapts the event-based streaming transport into a call that delivers
//! incremental visible content to a callback and resolves with the final
//! content. Reasoning found in `<think>` spans is routed to the extension's
//! [`ThinkingChannel`] and never reaches the content callback.
//!
//! Each call moves through [`StreamPhase`]s:
//!
//! - `Requested`: a fresh request id is allocated, thinking is cleared and the
//!   chunk subscription is opened before the transport is contacted.
//! - `Streaming`: chunks tagged with the request id are appended and the
//!   whole buffer is re-parsed; the new content suffix is delivered.
//! - `Completed`, `Cancelled`, `Failed`: terminal. The subscription and the
//!   cancellation registration are released on every exit path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use docplus_core::think::pending_marker_len;
use docplus_core::{AiTransport, ChatRequest, ChunkHub, Error, Result, parse_think_tags};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_BUFFER_BYTES;

// ─────────────────────────────────────────────────────────────────────────────
// Thinking channel
// ─────────────────────────────────────────────────────────────────────────────

/// Latest reasoning text of one extension.
///
/// Subscribers see an empty string when a new request clears the reasoning and
/// the new text whenever it changes.
#[derive(Debug, Clone)]
pub struct ThinkingChannel {
    tx: Arc<watch::Sender<String>>,
}

impl Default for ThinkingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkingChannel {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(String::new());
        Self { tx: Arc::new(tx) }
    }

    /// Reset to empty; subscribers are notified even if it already was
    pub fn clear(&self) {
        self.tx.send_replace(String::new());
    }

    pub fn update(&self, thinking: &str) {
        self.tx.send_if_modified(|text| {
            if text == thinking {
                return false;
            }
            thinking.clone_into(text);
            true
        });
    }

    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming request state
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of one streaming call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    Idle,
    Requested,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

/// State owned by a single streaming call
#[derive(Debug)]
struct StreamingRequest {
    request_id: String,
    raw: String,
    delivered_len: usize,
    last_thinking: String,
    phase: StreamPhase,
}

impl StreamingRequest {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            raw: String::new(),
            delivered_len: 0,
            last_thinking: String::new(),
            phase: StreamPhase::Idle,
        }
    }

    fn transition(&mut self, phase: StreamPhase) {
        debug!(request_id = %self.request_id, from = ?self.phase, to = ?phase, "Stream phase");
        self.phase = phase;
    }

    fn append(&mut self, content: &str, max_bytes: usize) -> Result<()> {
        if self.raw.len() + content.len() > max_bytes {
            return Err(Error::transport(format!(
                "stream buffer exceeded {} bytes",
                max_bytes
            )));
        }
        self.raw.push_str(content);
        Ok(())
    }

    /// Re-parse the buffer and return the undelivered content suffix.
    ///
    /// Mid-stream, a trailing partial marker and trailing whitespace are held
    /// back: the marker so it never leaks into content, the whitespace because
    /// a later span may cause it to be trimmed.
    fn advance(&mut self, finished: bool, thinking: &ThinkingChannel) -> Option<String> {
        let visible = if finished {
            self.raw.as_str()
        } else {
            let held = pending_marker_len(&self.raw);
            &self.raw[..self.raw.len() - held]
        };
        let parsed = parse_think_tags(visible);

        if parsed.thinking != self.last_thinking {
            thinking.update(&parsed.thinking);
            self.last_thinking = parsed.thinking;
        }

        let ready = if finished {
            parsed.content.as_str()
        } else {
            parsed.content.trim_end()
        };
        let delta = ready
            .get(self.delivered_len..)
            .filter(|suffix| !suffix.is_empty())?
            .to_string();
        self.delivered_len = ready.len();
        Some(delta)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────────────────────────────────────

type ActiveRequests = HashMap<String, CancellationToken>;

/// Bridge between extensions and the AI transport
pub struct ChatBridge {
    transport: Arc<dyn AiTransport>,
    chunks: Arc<ChunkHub>,
    active: Mutex<ActiveRequests>,
    counter: AtomicU64,
    max_buffer_bytes: usize,
}

impl ChatBridge {
    pub fn new(transport: Arc<dyn AiTransport>, chunks: Arc<ChunkHub>) -> Self {
        Self {
            transport,
            chunks,
            active: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }

    pub fn with_max_buffer_bytes(mut self, max_buffer_bytes: usize) -> Self {
        self.max_buffer_bytes = max_buffer_bytes;
        self
    }

    pub fn chunks(&self) -> &Arc<ChunkHub> {
        &self.chunks
    }

    fn next_request_id(&self, extension_id: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", extension_id, Utc::now().timestamp_millis(), n)
    }

    fn lock_active(&self) -> MutexGuard<'_, ActiveRequests> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One-shot generation. Reasoning goes to `thinking`; content is returned.
    pub async fn complete(&self, request: ChatRequest, thinking: &ThinkingChannel) -> Result<String> {
        thinking.clear();
        let raw = self.transport.chat(request).await?;
        let parsed = parse_think_tags(&raw);
        thinking.update(&parsed.thinking);
        Ok(parsed.content)
    }

    /// Streaming generation.
    ///
    /// `on_chunk` receives each new piece of visible content in order. The
    /// call fails with [`Error::Cancelled`] if `cancel` (or
    /// [`ChatBridge::stop`]) fires before completion; content already
    /// delivered stays delivered.
    pub async fn stream<F>(
        &self,
        extension_id: &str,
        mut request: ChatRequest,
        thinking: &ThinkingChannel,
        cancel: Option<&CancellationToken>,
        mut on_chunk: F,
    ) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let request_id = self.next_request_id(extension_id);
        let token = cancel.map(CancellationToken::child_token).unwrap_or_default();
        let _registration = Registration::new(&self.active, &request_id, token.clone());

        let mut state = StreamingRequest::new(request_id.clone());
        state.transition(StreamPhase::Requested);
        thinking.clear();
        let mut subscription = self.chunks.subscribe();

        if token.is_cancelled() {
            state.transition(StreamPhase::Cancelled);
            return Err(Error::Cancelled);
        }

        request.stream = true;
        debug!(extension_id, request_id = %request_id, "Dispatching streaming request");
        let dispatch = self.transport.chat_stream(request, &request_id);
        tokio::pin!(dispatch);
        state.transition(StreamPhase::Streaming);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    state.transition(StreamPhase::Cancelled);
                    return Err(Error::Cancelled);
                }
                Some(chunk) = subscription.recv() => {
                    if chunk.request_id != request_id {
                        continue;
                    }
                    self.apply_chunk(&mut state, &chunk.content, &token, thinking, &mut on_chunk)?;
                }
                outcome = &mut dispatch => break outcome,
            }
        };

        let final_raw = match outcome {
            Ok(text) => text,
            Err(err) => {
                state.transition(StreamPhase::Failed);
                warn!(request_id = %request_id, "Streaming request failed: {}", err);
                return Err(err);
            }
        };

        while let Some(chunk) = subscription.try_recv() {
            if chunk.request_id == request_id {
                self.apply_chunk(&mut state, &chunk.content, &token, thinking, &mut on_chunk)?;
            }
        }

        // Transports that never published chunks still resolve with the text.
        if state.raw.is_empty() && !final_raw.is_empty() {
            if let Err(err) = state.append(&final_raw, self.max_buffer_bytes) {
                state.transition(StreamPhase::Failed);
                return Err(err);
            }
        }

        if let Some(delta) = state.advance(true, thinking) {
            on_chunk(&delta);
        }
        state.transition(StreamPhase::Completed);

        Ok(parse_think_tags(&state.raw).content)
    }

    fn apply_chunk<F>(
        &self,
        state: &mut StreamingRequest,
        content: &str,
        token: &CancellationToken,
        thinking: &ThinkingChannel,
        on_chunk: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&str),
    {
        if token.is_cancelled() {
            state.transition(StreamPhase::Cancelled);
            return Err(Error::Cancelled);
        }
        if let Err(err) = state.append(content, self.max_buffer_bytes) {
            state.transition(StreamPhase::Failed);
            return Err(err);
        }
        if let Some(delta) = state.advance(false, thinking) {
            on_chunk(&delta);
        }
        Ok(())
    }

    /// Cancel one live request, or all of them, returning how many were cancelled
    pub fn stop(&self, request_id: Option<&str>) -> usize {
        let active = self.lock_active();
        let cancelled = match request_id {
            Some(id) => active.get(id).map(CancellationToken::cancel).map_or(0, |_| 1),
            None => {
                active.values().for_each(CancellationToken::cancel);
                active.len()
            }
        };
        debug!(?request_id, cancelled, "Stopped streaming requests");
        cancelled
    }

    /// Ids of streaming requests currently in flight
    pub fn active_requests(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_active().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for ChatBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBridge")
            .field("active", &self.active_requests())
            .field("max_buffer_bytes", &self.max_buffer_bytes)
            .finish_non_exhaustive()
    }
}

/// Entry in the active-request table, removed on drop
struct Registration<'a> {
    active: &'a Mutex<ActiveRequests>,
    request_id: String,
}

impl<'a> Registration<'a> {
    fn new(active: &'a Mutex<ActiveRequests>, request_id: &str, token: CancellationToken) -> Self {
        active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(request_id.to_string(), token);
        Self {
            active,
            request_id: request_id.to_string(),
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedAiTransport, ScriptedReply};
    use docplus_core::ChatMessage;
    use std::sync::Mutex as StdMutex;

    fn bridge_with(reply: ScriptedReply) -> (ChatBridge, Arc<ScriptedAiTransport>) {
        let hub = ChunkHub::new();
        let transport = Arc::new(ScriptedAiTransport::new(hub.clone()).with_reply(reply));
        (ChatBridge::new(transport.clone(), hub), transport)
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("Summarize")])
    }

    fn collector() -> (Arc<StdMutex<Vec<String>>>, impl FnMut(&str) + Send) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |delta: &str| sink.lock().unwrap().push(delta.to_string()))
    }

    #[test]
    fn test_clear_always_notifies() {
        let thinking = ThinkingChannel::new();
        let mut rx = thinking.subscribe();

        thinking.clear();
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        thinking.update("plan");
        thinking.update("plan");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "plan");
        assert!(!rx.has_changed().unwrap());

        thinking.clear();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "");
    }

    #[tokio::test]
    async fn test_each_request_announces_cleared_thinking() {
        let (bridge, _) = bridge_with(ScriptedReply::chunks(["plain"]));
        let thinking = ThinkingChannel::new();
        let mut rx = thinking.subscribe();

        bridge
            .stream("summarizer", request(), &thinking, None, |_: &str| {})
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "");
    }

    #[test]
    fn test_advance_holds_back_partial_markers() {
        let thinking = ThinkingChannel::new();
        let mut state = StreamingRequest::new("r".into());

        state.append("Hello <th", usize::MAX).unwrap();
        assert_eq!(state.advance(false, &thinking).as_deref(), Some("Hello"));

        state.append("ink>plan", usize::MAX).unwrap();
        assert_eq!(state.advance(false, &thinking), None);
        assert_eq!(thinking.current(), "plan");

        state.append("</think>there", usize::MAX).unwrap();
        assert_eq!(state.advance(false, &thinking).as_deref(), Some(" there"));
    }

    #[tokio::test]
    async fn test_split_markers_end_to_end() {
        let (bridge, _) = bridge_with(ScriptedReply::chunks([
            "<thi",
            "nk>ignored</think>Hello",
            " world",
        ]));
        let thinking = ThinkingChannel::new();
        let (seen, on_chunk) = collector();

        let content = bridge
            .stream("summarizer", request(), &thinking, None, on_chunk)
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Hello", " world"]);
        assert_eq!(content, "Hello world");
        assert_eq!(thinking.current(), "ignored");
        assert!(bridge.active_requests().is_empty());
        assert_eq!(bridge.chunks().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_reasoning_never_reaches_content_callback() {
        let (bridge, _) = bridge_with(ScriptedReply::chunks([
            "<think>step one",
            " and step two",
            "</think>",
            "Answer",
        ]));
        let thinking = ThinkingChannel::new();
        let mut rx = thinking.subscribe();
        let (seen, on_chunk) = collector();

        bridge
            .stream("summarizer", request(), &thinking, None, on_chunk)
            .await
            .unwrap();

        let delivered = seen.lock().unwrap().concat();
        assert_eq!(delivered, "Answer");
        assert!(!delivered.contains("step"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), "step one and step two");
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let (bridge, transport) = bridge_with(ScriptedReply::chunks(["never"]));
        let thinking = ThinkingChannel::new();
        let (seen, on_chunk) = collector();
        let token = CancellationToken::new();
        token.cancel();

        let err = bridge
            .stream("summarizer", request(), &thinking, Some(&token), on_chunk)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(transport.stream_calls(), 0);
        assert!(bridge.active_requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_discards_later_chunks() {
        let (bridge, _) = bridge_with(ScriptedReply::chunks(["one ", "two ", "three"]));
        let thinking = ThinkingChannel::new();
        let token = CancellationToken::new();
        let trigger = token.clone();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();

        let err = bridge
            .stream("summarizer", request(), &thinking, Some(&token), move |delta: &str| {
                sink.lock().unwrap().push(delta.to_string());
                trigger.cancel();
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(*seen.lock().unwrap(), vec!["one"]);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_request() {
        let hub = ChunkHub::new();
        let transport =
            Arc::new(ScriptedAiTransport::new(hub.clone()).with_reply(ScriptedReply::Hang));
        let bridge = Arc::new(ChatBridge::new(transport, hub));

        let task = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let thinking = ThinkingChannel::new();
                bridge
                    .stream("summarizer", request(), &thinking, None, |_: &str| {})
                    .await
            })
        };

        while bridge.active_requests().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(bridge.stop(None), 1);

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(bridge.active_requests().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_partial_thinking() {
        let (bridge, _) = bridge_with(ScriptedReply::ChunksThenError(
            vec!["<think>half a thought".into()],
            "connection reset".into(),
        ));
        let thinking = ThinkingChannel::new();

        let err = bridge
            .stream("summarizer", request(), &thinking, None, |_: &str| {})
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(thinking.current(), "half a thought");
        assert_eq!(bridge.chunks().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_chunks_are_ignored() {
        let hub = ChunkHub::new();
        let transport = Arc::new(
            ScriptedAiTransport::new(hub.clone())
                .with_reply(ScriptedReply::chunks(["mine"]))
                .with_foreign_chunk("someone-else", "theirs"),
        );
        let bridge = ChatBridge::new(transport, hub);
        let thinking = ThinkingChannel::new();
        let (seen, on_chunk) = collector();

        let content = bridge
            .stream("summarizer", request(), &thinking, None, on_chunk)
            .await
            .unwrap();

        assert_eq!(content, "mine");
        assert_eq!(*seen.lock().unwrap(), vec!["mine"]);
    }

    #[tokio::test]
    async fn test_concurrent_streams_do_not_cross_talk() {
        let hub = ChunkHub::new();
        let transport = Arc::new(
            ScriptedAiTransport::new(hub.clone())
                .with_reply(ScriptedReply::EchoPrompt),
        );
        let bridge = Arc::new(ChatBridge::new(transport, hub));

        let run = |prompt: &'static str| {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let thinking = ThinkingChannel::new();
                let seen = Arc::new(StdMutex::new(String::new()));
                let sink = seen.clone();
                let content = bridge
                    .stream(
                        "summarizer",
                        ChatRequest::new(vec![ChatMessage::user(prompt)]),
                        &thinking,
                        None,
                        move |delta: &str| sink.lock().unwrap().push_str(delta),
                    )
                    .await
                    .unwrap();
                let delivered = seen.lock().unwrap().clone();
                (content, delivered)
            })
        };

        let a = run("alpha beta gamma");
        let b = run("one two three");
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a, ("alpha beta gamma".to_string(), "alpha beta gamma".to_string()));
        assert_eq!(b, ("one two three".to_string(), "one two three".to_string()));
    }

    #[tokio::test]
    async fn test_buffer_cap_fails_request() {
        let (bridge, _) = bridge_with(ScriptedReply::chunks(["0123456789", "abcdef"]));
        let bridge = bridge.with_max_buffer_bytes(12);
        let thinking = ThinkingChannel::new();

        let err = bridge
            .stream("summarizer", request(), &thinking, None, |_: &str| {})
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("12 bytes"));
    }

    #[tokio::test]
    async fn test_reply_without_chunks_is_delivered_once() {
        let (bridge, _) = bridge_with(ScriptedReply::Text(
            "<think>quiet</think>Done".into(),
        ));
        let thinking = ThinkingChannel::new();
        let (seen, on_chunk) = collector();

        let content = bridge
            .stream("summarizer", request(), &thinking, None, on_chunk)
            .await
            .unwrap();

        assert_eq!(content, "Done");
        assert_eq!(*seen.lock().unwrap(), vec!["Done"]);
        assert_eq!(thinking.current(), "quiet");
    }

    #[tokio::test]
    async fn test_complete_separates_reasoning() {
        let (bridge, _) = bridge_with(ScriptedReply::Text(
            "<think>why</think>\n\nBecause.".into(),
        ));
        let thinking = ThinkingChannel::new();

        let content = bridge.complete(request(), &thinking).await.unwrap();
        assert_eq!(content, "Because.");
        assert_eq!(thinking.current(), "why");
    }
}
