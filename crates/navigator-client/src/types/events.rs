use serde_json::Value;

/// Events carried in-band on the chat stream.
///
/// The wire format is untagged: the backend distinguishes event shapes by
/// which fields are present, and the precedence below is part of the
/// contract. A payload carrying both `chatId` and `tokens` is a start
/// event; `tokens` wins over `type`; and so on down to the raw-content
/// fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// First event of a stream: pins the chat identity (the server assigns
    /// an id to a brand-new chat) and the request id used for cancellation.
    Started {
        chat_id: i64,
        request_id: Option<String>,
        document_type: Option<String>,
    },
    /// Terminal content event: the reply is complete.
    Completed {
        tokens: u64,
        download_url: Option<String>,
        total_chat_tokens: Option<u64>,
        max_context_tokens: Option<u64>,
    },
    /// The backend switched an expert's internal mode; narrated to the user
    /// when enabled in settings.
    ModeSwitch { message: String },
    /// Side-channel progress while the backend swaps the loaded model.
    ModelSwap {
        status: SwapStatus,
        message: Option<String>,
        percent: Option<u8>,
    },
    /// The conversation was handed off to a different expert mid-stream.
    Delegation {
        expert_id: Option<i64>,
        expert_name: Option<String>,
        message: Option<String>,
    },
    /// In-band failure; terminates the stream.
    Error { message: String },
    /// A token chunk, either `{"content": ...}` or a raw non-JSON payload.
    Content(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStatus {
    Starting,
    Progress,
    Complete,
    Error,
}

impl StreamEvent {
    /// Classifies one decoded SSE payload. Never fails: a payload that is
    /// not valid JSON is a plain token chunk, which is the normal path when
    /// the backend streams bare text.
    pub fn classify(payload: &str) -> StreamEvent {
        let Ok(value) = serde_json::from_str::<Value>(payload) else {
            return StreamEvent::Content(payload.to_string());
        };
        if !value.is_object() {
            return StreamEvent::Content(payload.to_string());
        }

        if let Some(chat_id) = value.get("chatId").and_then(Value::as_i64) {
            return StreamEvent::Started {
                chat_id,
                request_id: str_field(&value, "requestId"),
                document_type: if value
                    .get("isDocumentRequest")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    str_field(&value, "documentType")
                } else {
                    None
                },
            };
        }

        if let Some(tokens) = value.get("tokens") {
            return StreamEvent::Completed {
                tokens: tokens.as_u64().unwrap_or(0),
                download_url: str_field(&value, "downloadUrl"),
                total_chat_tokens: value.get("totalChatTokens").and_then(Value::as_u64),
                max_context_tokens: value.get("maxContextTokens").and_then(Value::as_u64),
            };
        }

        match value.get("type").and_then(Value::as_str) {
            Some("mode_switch") => {
                return StreamEvent::ModeSwitch {
                    message: str_field(&value, "message").unwrap_or_default(),
                };
            }
            Some("model_swap") => {
                let status = match value.get("status").and_then(Value::as_str) {
                    Some("starting") => SwapStatus::Starting,
                    Some("complete") => SwapStatus::Complete,
                    Some("error") => SwapStatus::Error,
                    _ => SwapStatus::Progress,
                };
                return StreamEvent::ModelSwap {
                    status,
                    message: str_field(&value, "message"),
                    percent: value
                        .get("percent")
                        .and_then(Value::as_u64)
                        .map(|p| p.min(100) as u8),
                };
            }
            Some("delegation") => {
                return StreamEvent::Delegation {
                    expert_id: value.get("expertId").and_then(Value::as_i64),
                    expert_name: str_field(&value, "expertName"),
                    message: str_field(&value, "message"),
                };
            }
            _ => {}
        }

        if let Some(error) = value.get("error") {
            let message = error
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| error.to_string());
            return StreamEvent::Error { message };
        }

        if let Some(content) = value.get("content").and_then(Value::as_str) {
            return StreamEvent::Content(content.to_string());
        }

        // Unknown JSON shapes are appended verbatim, matching the original
        // client's treatment of anything it cannot classify.
        StreamEvent::Content(payload.to_string())
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}
