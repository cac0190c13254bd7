//! Client-side chat orchestration: the state store, expert selector,
//! request builder and reconciliation scheduler behind a single
//! [`ChatSession`] handle.
//!
//! A `ChatSession` is constructed once and cloned freely; clones share the
//! same state. All observable state lives in [`ChatState`] and is read via
//! [`ChatSession::state_snapshot`].

pub mod draft;
pub mod experts;
mod reconcile;
pub mod settings;
pub mod state;

pub use draft::{AttachedFile, AttachmentKind, MessageDraft};
pub use experts::{ExpertSelector, FALLBACK_SYSTEM_PROMPT};
pub use settings::SessionSettings;
pub use state::{ChatMessage, ChatState, StreamingMessage, SwapProgress};

use crate::cache::TranscriptCache;
use crate::error::{NavigatorClientError, Result};
use crate::types::chat::Message;
use crate::types::events::{StreamEvent, SwapStatus};
use crate::types::requests::ChatRequest;
use crate::NavigatorClient;
use draft::RequestContext;
use futures::StreamExt;
use reconcile::{reconcile_delay, Reconciler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long the 100% model-swap indicator stays visible after completion.
const SWAP_CLEAR_DELAY: Duration = Duration::from_millis(500);
/// Delay between the delegation notice and the actual expert switch, so the
/// notice is visible before the selection changes.
const DELEGATION_SWITCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct ChatSession {
    client: NavigatorClient,
    cache: Arc<TranscriptCache>,
    state: Arc<Mutex<ChatState>>,
    experts: Arc<Mutex<ExpertSelector>>,
    settings: Arc<Mutex<SessionSettings>>,
    reconciler: Arc<Reconciler>,
}

impl ChatSession {
    pub fn new(client: NavigatorClient, cache: TranscriptCache) -> Self {
        let experts = ExpertSelector::new(client.clone());
        Self {
            client,
            cache: Arc::new(cache),
            state: Arc::new(Mutex::new(ChatState::default())),
            experts: Arc::new(Mutex::new(experts)),
            settings: Arc::new(Mutex::new(SessionSettings::default())),
            reconciler: Arc::new(Reconciler::default()),
        }
    }

    /// Loads experts, registries, persisted settings and the chat list.
    /// Call once at startup.
    pub async fn initialize(&self) -> Result<()> {
        self.experts.lock().await.load().await?;

        {
            let mut settings = self.settings.lock().await;
            match self.client.sampling_parameters().await {
                Ok(params) => settings.sampling_override = Some(params),
                Err(e) => debug!(error = %e, "no persisted sampling parameters"),
            }
            match self.client.chaining_settings().await {
                Ok(chaining) => {
                    if let Some(model) = chaining.vision_model {
                        settings.preferred_vision_model = model;
                    }
                    settings.show_intermediate_output = chaining.show_intermediate_output;
                }
                Err(e) => debug!(error = %e, "no persisted chaining settings"),
            }
        }

        self.load_chats().await
    }

    pub async fn state_snapshot(&self) -> ChatState {
        self.state.lock().await.clone()
    }

    pub async fn settings(&self) -> SessionSettings {
        self.settings.lock().await.clone()
    }

    pub async fn update_settings(&self, f: impl FnOnce(&mut SessionSettings)) {
        f(&mut *self.settings.lock().await);
    }

    pub async fn active_model(&self) -> String {
        self.experts.lock().await.active_model().to_string()
    }

    pub async fn system_prompt(&self) -> String {
        self.experts.lock().await.system_prompt().to_string()
    }

    pub async fn switching_message(&self) -> Option<String> {
        self.experts.lock().await.switching_message().map(String::from)
    }

    pub async fn experts(&self) -> Vec<crate::types::responses::Expert> {
        self.experts.lock().await.experts().to_vec()
    }

    pub async fn select_expert(&self, expert_id: i64) -> Result<()> {
        let chat_id = self.state.lock().await.current_chat_id;
        self.experts.lock().await.select_expert(expert_id, chat_id).await
    }

    pub async fn set_selected_model(&self, model: &str) {
        let chat_id = self.state.lock().await.current_chat_id;
        self.experts.lock().await.set_selected_model(model, chat_id).await;
    }

    pub async fn clear_error(&self) {
        self.state.lock().await.clear_error();
    }

    // ------------------------------------------------------------------
    // Chat CRUD
    // ------------------------------------------------------------------

    pub async fn load_chats(&self) -> Result<()> {
        let chats = self.client.list_chats().await?;
        self.state.lock().await.chats = chats;
        Ok(())
    }

    pub async fn create_chat(&self, title: impl Into<String>) -> Result<i64> {
        let (model, expert_id) = {
            let experts = self.experts.lock().await;
            (
                Some(experts.active_model().to_string()).filter(|m| !m.is_empty()),
                experts.selected_expert_id(),
            )
        };
        let chat = self.client.create_chat(title, model, expert_id).await?;
        let mut state = self.state.lock().await;
        state.current_chat_id = Some(chat.id);
        state.messages.clear();
        state.context_usage = Default::default();
        state.chats.insert(0, chat.clone());
        Ok(chat.id)
    }

    /// Loads a chat's history and reapplies its stored expert. When the
    /// authoritative fetch fails, the cached transcript (possibly stale) is
    /// shown instead; only when both are unavailable does the error surface.
    pub async fn load_chat(&self, chat_id: i64) -> Result<()> {
        self.reconciler.cancel_for_other_chats(chat_id);

        match self.client.chat_history(chat_id).await {
            Ok(chat) => {
                {
                    let mut state = self.state.lock().await;
                    state.current_chat_id = Some(chat_id);
                    state.replace_messages(chat.messages.clone());
                    state.context_usage = Default::default();
                    state.clear_error();
                }
                self.cache.store(chat_id, &chat.messages);
                self.experts.lock().await.restore_from_chat(chat.expert_id).await;
                Ok(())
            }
            Err(e) => {
                warn!(chat_id, error = %e, "history fetch failed; trying cache");
                if let Some(cached) = self.cache.load(chat_id) {
                    let mut state = self.state.lock().await;
                    state.current_chat_id = Some(chat_id);
                    state.replace_messages(cached);
                    state.clear_error();
                    Ok(())
                } else {
                    self.state.lock().await.set_error(e.user_message());
                    Err(e)
                }
            }
        }
    }

    /// Leaves the current chat; the next sent message creates a new one.
    pub async fn start_new_chat(&self) {
        self.reconciler.cancel();
        let mut state = self.state.lock().await;
        state.current_chat_id = None;
        state.messages.clear();
        state.context_usage = Default::default();
        state.clear_error();
    }

    pub async fn rename_chat(&self, chat_id: i64, new_title: impl Into<String>) -> Result<()> {
        let new_title = new_title.into();
        self.client.rename_chat(chat_id, new_title.clone()).await?;
        let mut state = self.state.lock().await;
        if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.title = new_title;
        }
        Ok(())
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
        self.client.delete_chat(chat_id).await?;
        self.cache.evict(chat_id);
        let mut state = self.state.lock().await;
        state.chats.retain(|c| c.id != chat_id);
        if state.current_chat_id == Some(chat_id) {
            state.current_chat_id = None;
            state.messages.clear();
            state.context_usage = Default::default();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sending and streaming
    // ------------------------------------------------------------------

    /// Sends a message and processes the reply stream to completion.
    ///
    /// Returns `Ok(false)` without any request for a blank draft. Errors
    /// are surfaced on the state's `error` field and also returned; a
    /// cancellation is benign and keeps the partial transcript. The
    /// `is_loading`/`is_web_searching` flags are restored on every path.
    pub async fn send_message(&self, draft: MessageDraft) -> Result<bool> {
        if draft.is_blank() {
            return Ok(false);
        }

        let (request, model) = {
            let experts = self.experts.lock().await;
            let settings = self.settings.lock().await;
            let state = self.state.lock().await;
            let ctx = RequestContext {
                chat_id: state.current_chat_id,
                model: experts.active_model(),
                system_prompt: experts.system_prompt(),
                expert: experts.selected_expert(),
                is_custom_model: experts.is_custom_model(experts.active_model()),
            };
            let Some(request) = draft::build_chat_request(&draft, &ctx, &settings) else {
                return Ok(false);
            };
            (request, experts.active_model().to_string())
        };

        {
            let mut state = self.state.lock().await;
            state.clear_error();
            state.is_loading = true;
            state.is_web_searching = request.web_search_enabled == Some(true);
            state.push_final(Message::user(draft.text.clone()).with_attachments(draft.file_metadata()));
            state.begin_streaming(Some(model));
        }

        let result = self.run_stream(&request).await;

        let mut state = self.state.lock().await;
        state.is_loading = false;
        state.is_web_searching = false;
        state.active_request_id = None;
        match result {
            Ok(completed) => Ok(completed),
            Err(e) if e.is_cancellation() => {
                debug!("request cancelled by user");
                state.interrupt_streaming();
                Ok(false)
            }
            Err(e) => {
                state.interrupt_streaming();
                state.set_error(e.user_message());
                Err(e)
            }
        }
    }

    async fn run_stream(&self, request: &ChatRequest) -> Result<bool> {
        let mut stream = self.client.send_message_stream(request).await?;
        // Pinned to the originating chat by the start event; events arriving
        // after the user switched away are dropped.
        let mut stream_chat_id = request.chat_id;
        let mut completed = false;
        while let Some(event) = stream.next().await {
            if self.apply_event(event?, &mut stream_chat_id).await? {
                completed = true;
            }
        }
        Ok(completed)
    }

    /// Applies one stream event in arrival order. Returns `true` for the
    /// completion event.
    async fn apply_event(
        &self,
        event: StreamEvent,
        stream_chat_id: &mut Option<i64>,
    ) -> Result<bool> {
        if let Some(chat_id) = *stream_chat_id {
            let state = self.state.lock().await;
            if state.current_chat_id != Some(chat_id) {
                warn!(chat_id, "dropping stream event for inactive chat");
                return Ok(false);
            }
        }

        match event {
            StreamEvent::Started {
                chat_id,
                request_id,
                document_type,
            } => {
                *stream_chat_id = Some(chat_id);
                let is_new_chat = {
                    let mut state = self.state.lock().await;
                    let is_new = state.current_chat_id.is_none();
                    if is_new {
                        state.current_chat_id = Some(chat_id);
                    }
                    state.active_request_id = request_id;
                    if let Some(doc_type) = document_type {
                        if let Some(streaming) = state.streaming_mut() {
                            streaming.is_document_request = true;
                            streaming.document_type = Some(doc_type);
                        }
                    }
                    is_new
                };
                if is_new_chat {
                    // Bring the server-created chat into the listing.
                    if let Err(e) = self.load_chats().await {
                        warn!(error = %e, "failed to refresh chat list");
                    }
                }
                Ok(false)
            }

            StreamEvent::Content(chunk) => {
                self.state.lock().await.append_content(&chunk);
                Ok(false)
            }

            StreamEvent::Completed {
                tokens,
                download_url,
                total_chat_tokens,
                max_context_tokens,
            } => {
                let (chat_id, transcript) = {
                    let mut state = self.state.lock().await;
                    state.finalize_streaming(Some(tokens), download_url.clone());
                    if let Some(total) = total_chat_tokens {
                        state.context_usage.total_chat_tokens = total;
                    }
                    if let Some(max) = max_context_tokens {
                        state.context_usage.max_context_tokens = Some(max);
                    }
                    state.active_request_id = None;
                    (state.current_chat_id, state.final_messages())
                };
                if let Some(chat_id) = chat_id {
                    self.cache.store(chat_id, &transcript);
                    self.schedule_reconciliation(chat_id, download_url.as_deref());
                }
                Ok(true)
            }

            StreamEvent::ModeSwitch { message } => {
                let show = self.settings.lock().await.show_mode_switch_messages;
                if show && !message.is_empty() {
                    self.insert_notice(message).await;
                }
                Ok(false)
            }

            StreamEvent::ModelSwap {
                status,
                message,
                percent,
            } => {
                let mut state = self.state.lock().await;
                match status {
                    SwapStatus::Complete => {
                        state.swap_progress = Some(SwapProgress {
                            status,
                            message,
                            percent: Some(100),
                        });
                        drop(state);
                        // Keep the finished indicator visible briefly.
                        let session = self.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(SWAP_CLEAR_DELAY).await;
                            session.state.lock().await.swap_progress = None;
                        });
                    }
                    SwapStatus::Error => {
                        warn!(?message, "model swap failed");
                        state.swap_progress = None;
                    }
                    SwapStatus::Starting | SwapStatus::Progress => {
                        state.swap_progress = Some(SwapProgress {
                            status,
                            message,
                            percent,
                        });
                    }
                }
                Ok(false)
            }

            StreamEvent::Delegation {
                expert_id,
                expert_name,
                message,
            } => {
                let notice = message.unwrap_or_else(|| match &expert_name {
                    Some(name) => format!("Weitergabe an {name}..."),
                    None => "Weitergabe an einen anderen Experten...".to_string(),
                });
                self.insert_notice(notice).await;
                if let Some(expert_id) = expert_id {
                    // Switch after a short delay so the notice renders under
                    // the old expert first.
                    let session = self.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(DELEGATION_SWITCH_DELAY).await;
                        let chat_id = session.state.lock().await.current_chat_id;
                        if let Err(e) = session
                            .experts
                            .lock()
                            .await
                            .select_expert(expert_id, chat_id)
                            .await
                        {
                            warn!(expert_id, error = %e, "delegation expert switch failed");
                        }
                    });
                }
                Ok(false)
            }

            StreamEvent::Error { message } => Err(NavigatorClientError::Stream(message)),
        }
    }

    /// Appends a SYSTEM narration line, kept above the in-flight reply so
    /// the streaming message stays last in the transcript.
    async fn insert_notice(&self, content: String) {
        let mut state = self.state.lock().await;
        let notice = ChatMessage::Final(Message::system_notice(content));
        match state.streaming_index() {
            Some(index) => state.messages.insert(index, notice),
            None => state.messages.push(notice),
        }
    }

    fn schedule_reconciliation(&self, chat_id: i64, download_url: Option<&str>) {
        let delay = reconcile_delay(download_url);
        let session = self.clone();
        self.reconciler.schedule(chat_id, delay, async move {
            session.reconcile(chat_id).await;
        });
    }

    /// Overwrites the optimistic transcript with the backend's persisted
    /// record. Failures are logged; the optimistic state stays authoritative
    /// until the next successful sync.
    async fn reconcile(&self, chat_id: i64) {
        match self.client.chat_history(chat_id).await {
            Ok(chat) => {
                {
                    let mut state = self.state.lock().await;
                    if state.current_chat_id != Some(chat_id) {
                        debug!(chat_id, "skipping reconciliation for inactive chat");
                        return;
                    }
                    state.replace_messages(chat.messages.clone());
                }
                self.cache.store(chat_id, &chat.messages);
                debug!(chat_id, "reconciled with server history");
            }
            Err(e) => warn!(chat_id, error = %e, "reconciliation fetch failed"),
        }
    }

    /// Asks the backend to stop the in-flight request. With no active
    /// request id this is a warned no-op returning `false` and making no
    /// network call; the stream itself always ends through its normal
    /// end-of-stream path. Returns `false` when the abort call itself
    /// fails.
    pub async fn abort(&self) -> Result<bool> {
        let request_id = self.state.lock().await.active_request_id.clone();
        let Some(request_id) = request_id else {
            warn!("abort requested with no active request id");
            return Ok(false);
        };
        match self.client.abort_request(&request_id).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, "abort request failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavigatorClientConfig;

    fn session() -> ChatSession {
        let client =
            NavigatorClient::new(NavigatorClientConfig::new("http://localhost:0")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        ChatSession::new(client, TranscriptCache::new(dir.path()))
    }

    #[tokio::test]
    async fn test_blank_message_is_a_silent_noop() {
        let session = session();
        let sent = session.send_message(MessageDraft::new("   ")).await.unwrap();
        assert!(!sent);
        let state = session.state_snapshot().await;
        assert!(state.messages.is_empty());
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_abort_without_request_id_is_a_noop() {
        let session = session();
        // No network call happens: the client points at a closed port and
        // would error if one were attempted.
        assert!(!session.abort().await.unwrap());
    }

    #[tokio::test]
    async fn test_abort_reports_failed_abort_call() {
        let session = session();
        session.state.lock().await.active_request_id = Some("r9".to_string());
        // The client points at a closed port, so the abort POST fails.
        assert!(!session.abort().await.unwrap());
    }

    #[tokio::test]
    async fn test_content_events_accumulate_in_order() {
        let session = session();
        session.state.lock().await.begin_streaming(None);
        let mut chat = None;
        for chunk in ["Hi", " there", "!"] {
            session
                .apply_event(StreamEvent::Content(chunk.to_string()), &mut chat)
                .await
                .unwrap();
        }
        let state = session.state_snapshot().await;
        assert_eq!(state.messages[0].content(), "Hi there!");
        assert!(state.messages[0].is_streaming());
    }

    #[tokio::test]
    async fn test_started_event_pins_chat_and_request_id() {
        let session = session();
        session.state.lock().await.begin_streaming(None);
        let mut chat = None;
        session
            .apply_event(
                StreamEvent::Started {
                    chat_id: 42,
                    request_id: Some("r1".to_string()),
                    document_type: None,
                },
                &mut chat,
            )
            .await
            .unwrap();
        assert_eq!(chat, Some(42));
        let state = session.state_snapshot().await;
        assert_eq!(state.current_chat_id, Some(42));
        assert_eq!(state.active_request_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_events_for_inactive_chat_are_dropped() {
        let session = session();
        {
            let mut state = session.state.lock().await;
            state.current_chat_id = Some(7);
            state.begin_streaming(None);
        }
        // The stream belongs to chat 42, but chat 7 is active.
        let mut chat = Some(42);
        session
            .apply_event(StreamEvent::Content("spät".to_string()), &mut chat)
            .await
            .unwrap();
        let state = session.state_snapshot().await;
        assert_eq!(state.messages[0].content(), "");
    }

    #[tokio::test]
    async fn test_mode_switch_notice_respects_setting() {
        let session = session();
        session.state.lock().await.begin_streaming(None);
        let mut chat = None;

        session
            .apply_event(
                StreamEvent::ModeSwitch {
                    message: "Wechsel zu Verkehrsrecht".to_string(),
                },
                &mut chat,
            )
            .await
            .unwrap();
        assert_eq!(session.state_snapshot().await.messages.len(), 2);

        session.update_settings(|s| s.show_mode_switch_messages = false).await;
        session
            .apply_event(
                StreamEvent::ModeSwitch {
                    message: "Wechsel zu Strafrecht".to_string(),
                },
                &mut chat,
            )
            .await
            .unwrap();
        // Suppressed: no further notice.
        assert_eq!(session.state_snapshot().await.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_notice_stays_above_streaming_reply() {
        let session = session();
        {
            let mut state = session.state.lock().await;
            state.begin_streaming(None);
            state.append_content("antwort");
        }
        session.insert_notice("Weitergabe an Roland...".to_string()).await;
        let state = session.state_snapshot().await;
        assert!(!state.messages[0].is_streaming());
        assert!(state.messages[1].is_streaming());
    }

    #[tokio::test]
    async fn test_completion_finalizes_and_mirrors_to_cache() {
        let session = session();
        {
            let mut state = session.state.lock().await;
            state.current_chat_id = Some(5);
            state.begin_streaming(None);
            state.append_content("fertig");
        }
        let mut chat = Some(5);
        let completed = session
            .apply_event(
                StreamEvent::Completed {
                    tokens: 2,
                    download_url: None,
                    total_chat_tokens: Some(10),
                    max_context_tokens: Some(8192),
                },
                &mut chat,
            )
            .await
            .unwrap();
        assert!(completed);

        let state = session.state_snapshot().await;
        assert!(!state.messages[0].is_streaming());
        assert_eq!(state.context_usage.total_chat_tokens, 10);
        assert_eq!(state.context_usage.max_context_tokens, Some(8192));

        let cached = session.cache.load(5).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content, "fertig");
        assert_eq!(cached[0].tokens, Some(2));
    }

    #[tokio::test]
    async fn test_in_band_error_event_rejects_stream() {
        let session = session();
        let mut chat = None;
        let err = session
            .apply_event(
                StreamEvent::Error {
                    message: "model crashed".to_string(),
                },
                &mut chat,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NavigatorClientError::Stream(_)));
    }

    #[tokio::test]
    async fn test_model_swap_progress_is_side_channel() {
        let session = session();
        session.state.lock().await.begin_streaming(None);
        let mut chat = None;
        session
            .apply_event(
                StreamEvent::ModelSwap {
                    status: SwapStatus::Progress,
                    message: Some("Lade Modell".to_string()),
                    percent: Some(40),
                },
                &mut chat,
            )
            .await
            .unwrap();
        let state = session.state_snapshot().await;
        let progress = state.swap_progress.unwrap();
        assert_eq!(progress.percent, Some(40));
        // Message content untouched.
        assert_eq!(state.messages[0].content(), "");
    }
}
