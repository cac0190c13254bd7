use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message roles as the backend stores them (`USER`, `ASSISTANT`, `SYSTEM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Metadata for a file attached to a message. The bytes themselves never
/// travel with the chat request; images go as base64 strings and document
/// text is folded into the request's `documentContext`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub size: u64,
}

/// A finalized chat message, as persisted by the backend and mirrored in the
/// local cache. An in-flight assistant reply is *not* a `Message`; it lives
/// as [`StreamingMessage`](crate::session::StreamingMessage) until the
/// completion event replaces it with one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<FileMetadata>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_document_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Narration inserted by the client for mode switches and delegations.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_system_notice: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A SYSTEM narration line (mode switch, delegation hand-off).
    pub fn system_notice(content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::System, content);
        msg.is_system_notice = true;
        msg
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tokens: None,
            created_at: Utc::now(),
            model_name: None,
            attachments: None,
            is_document_request: false,
            document_type: None,
            download_url: None,
            is_system_notice: false,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<FileMetadata>) -> Self {
        if !attachments.is_empty() {
            self.attachments = Some(attachments);
        }
        self
    }
}

/// A chat as returned by the history and listing endpoints. The listing
/// omits `messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

/// Running token totals for the active chat, updated only from completion
/// events. `max_context_tokens` is known once an expert's model has been
/// resolved against the context registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextUsage {
    pub total_chat_tokens: u64,
    pub max_context_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"USER\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"ASSISTANT\"").unwrap(),
            Role::Assistant
        );
    }

    #[test]
    fn test_message_omits_unset_fields() {
        let msg = Message::user("hallo");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("tokens").is_none());
        assert!(json.get("downloadUrl").is_none());
        assert!(json.get("isDocumentRequest").is_none());
        assert_eq!(json["role"], "USER");
    }

    #[test]
    fn test_chat_listing_without_messages() {
        let chat: Chat =
            serde_json::from_str(r#"{"id": 7, "title": "Neuer Chat", "model": "llama3.1:8b"}"#)
                .unwrap();
        assert_eq!(chat.id, 7);
        assert!(chat.messages.is_empty());
        assert_eq!(chat.expert_id, None);
    }
}
