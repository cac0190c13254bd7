use crate::types::chat::{Chat, ContextUsage, Message};
use crate::types::events::SwapStatus;
use chrono::{DateTime, Utc};
use tracing::warn;

/// The reply currently being assembled from stream chunks. Replaced
/// wholesale by an immutable [`Message`] when the completion event arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingMessage {
    pub content: String,
    pub started_at: DateTime<Utc>,
    pub model_name: Option<String>,
    pub is_document_request: bool,
    pub document_type: Option<String>,
}

/// A chat transcript entry: either finalized history or the single
/// in-flight reply. The two cases are distinct types rather than a boolean
/// flag, so finalized messages cannot be mutated by later stream events.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    Streaming(StreamingMessage),
    Final(Message),
}

impl ChatMessage {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ChatMessage::Streaming(_))
    }

    pub fn content(&self) -> &str {
        match self {
            ChatMessage::Streaming(m) => &m.content,
            ChatMessage::Final(m) => &m.content,
        }
    }
}

/// Side-channel progress for a backend model swap; display state only,
/// unrelated to message content.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapProgress {
    pub status: SwapStatus,
    pub message: Option<String>,
    pub percent: Option<u8>,
}

/// Observable chat state: the chat list, the active transcript, and the
/// loading/error flags a front-end renders from. Mutated only by the
/// session's event handling; consumers read snapshots.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub chats: Vec<Chat>,
    pub current_chat_id: Option<i64>,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub is_web_searching: bool,
    /// Single funnel for every surfaced error; cleared explicitly.
    pub error: Option<String>,
    pub active_request_id: Option<String>,
    pub context_usage: ContextUsage,
    pub swap_progress: Option<SwapProgress>,
}

impl ChatState {
    pub fn push_final(&mut self, message: Message) {
        self.messages.push(ChatMessage::Final(message));
    }

    /// Opens the in-flight reply. At most one Streaming entry may exist per
    /// chat; an existing one is closed out first so the invariant holds even
    /// if a previous stream never completed.
    pub fn begin_streaming(&mut self, model_name: Option<String>) {
        if self.streaming_index().is_some() {
            warn!("starting a new stream while one is in flight; closing the old one");
            self.interrupt_streaming();
        }
        self.messages.push(ChatMessage::Streaming(StreamingMessage {
            content: String::new(),
            started_at: Utc::now(),
            model_name,
            is_document_request: false,
            document_type: None,
        }));
    }

    pub fn streaming_index(&self) -> Option<usize> {
        self.messages.iter().position(ChatMessage::is_streaming)
    }

    pub fn streaming_mut(&mut self) -> Option<&mut StreamingMessage> {
        self.messages.iter_mut().find_map(|m| match m {
            ChatMessage::Streaming(s) => Some(s),
            ChatMessage::Final(_) => None,
        })
    }

    pub fn append_content(&mut self, chunk: &str) {
        match self.streaming_mut() {
            Some(streaming) => streaming.content.push_str(chunk),
            None => {
                // Content before the start event; open the reply implicitly.
                self.begin_streaming(None);
                if let Some(streaming) = self.streaming_mut() {
                    streaming.content.push_str(chunk);
                }
            }
        }
    }

    /// Replaces the Streaming entry with its immutable final form. Returns
    /// the finalized message, or `None` when no stream was open.
    pub fn finalize_streaming(
        &mut self,
        tokens: Option<u64>,
        download_url: Option<String>,
    ) -> Option<Message> {
        let index = self.streaming_index()?;
        let ChatMessage::Streaming(streaming) = self.messages[index].clone() else {
            return None;
        };
        let mut message = Message::assistant(streaming.content);
        message.created_at = streaming.started_at;
        message.tokens = tokens;
        message.model_name = streaming.model_name;
        message.is_document_request = streaming.is_document_request;
        message.document_type = streaming.document_type;
        message.download_url = download_url;
        self.messages[index] = ChatMessage::Final(message.clone());
        Some(message)
    }

    /// Closes an interrupted stream (transport failure, cancellation).
    /// Partial content is kept as a finalized message; a placeholder that
    /// never received any content is removed so the transcript ends with
    /// the user's message, not an empty reply.
    pub fn interrupt_streaming(&mut self) {
        let Some(index) = self.streaming_index() else {
            return;
        };
        if self.messages[index].content().is_empty() {
            self.messages.remove(index);
        } else {
            self.finalize_streaming(None, None);
        }
    }

    /// The finalized transcript, as mirrored to the cache. An in-flight
    /// reply is excluded; it is not history yet.
    pub fn final_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Final(msg) => Some(msg.clone()),
                ChatMessage::Streaming(_) => None,
            })
            .collect()
    }

    /// Overwrites the transcript with authoritative history.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages.into_iter().map(ChatMessage::Final).collect();
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::chat::Role;

    fn streaming_count(state: &ChatState) -> usize {
        state.messages.iter().filter(|m| m.is_streaming()).count()
    }

    #[test]
    fn test_at_most_one_streaming_message() {
        let mut state = ChatState::default();
        state.begin_streaming(None);
        state.append_content("erste");
        state.begin_streaming(None);
        assert_eq!(streaming_count(&state), 1);
        // The orphaned stream was finalized, not dropped.
        assert_eq!(state.messages[0].content(), "erste");
        assert!(!state.messages[0].is_streaming());
    }

    #[test]
    fn test_finalize_replaces_streaming_wholesale() {
        let mut state = ChatState::default();
        state.push_final(Message::user("Hello"));
        state.begin_streaming(Some("llama3.1:8b".to_string()));
        state.append_content("Hi");
        state.append_content(" there");
        state.append_content("!");

        let message = state.finalize_streaming(Some(3), None).unwrap();
        assert_eq!(message.content, "Hi there!");
        assert_eq!(message.tokens, Some(3));
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(streaming_count(&state), 0);
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn test_content_after_completion_opens_a_new_stream() {
        let mut state = ChatState::default();
        state.begin_streaming(None);
        state.append_content("done");
        state.finalize_streaming(Some(1), None);

        // A late chunk must not touch the finalized message.
        state.append_content("stray");
        assert_eq!(state.messages[0].content(), "done");
        assert_eq!(state.messages[1].content(), "stray");
    }

    #[test]
    fn test_final_messages_exclude_in_flight(){
        let mut state = ChatState::default();
        state.push_final(Message::user("a"));
        state.begin_streaming(None);
        state.append_content("partial");
        assert_eq!(state.final_messages().len(), 1);
    }

    #[test]
    fn test_interrupt_keeps_partial_content() {
        let mut state = ChatState::default();
        state.begin_streaming(None);
        state.append_content("teilweise");
        state.interrupt_streaming();
        assert_eq!(state.messages.len(), 1);
        assert!(!state.messages[0].is_streaming());
        assert_eq!(state.messages[0].content(), "teilweise");
    }

    #[test]
    fn test_interrupt_removes_empty_placeholder() {
        let mut state = ChatState::default();
        state.push_final(Message::user("Hallo"));
        state.begin_streaming(None);
        state.interrupt_streaming();
        // The failed request leaves only the user's message behind.
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content(), "Hallo");
    }

    #[test]
    fn test_finalize_without_stream_is_none() {
        let mut state = ChatState::default();
        assert!(state.finalize_streaming(Some(1), None).is_none());
    }
}
