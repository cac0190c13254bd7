use crate::types::chat::FileMetadata;
use serde::{Deserialize, Serialize};

/// Generation parameters persisted as a single object under
/// `/api/settings/sampling`. When present they travel as the
/// `samplingParameters` field of a chat request; otherwise the legacy flat
/// fields are sent. Never both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingParameters {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_tokens: u32,
    pub repeat_penalty: f64,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_tokens: 32_768,
            repeat_penalty: 1.18,
        }
    }
}

/// The outbound chat payload for `/api/chat/send` and
/// `/api/chat/send-stream`. Constructed fresh per send by the request
/// builder; never persisted.
///
/// `systemPrompt` is serialized even when null: a custom model must see an
/// explicit null so the backend does not fall back to its own default
/// template on top of the model's embedded prompt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    pub message: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub stream: bool,
    pub expert_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_parameters: Option<SamplingParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_metadata: Option<Vec<FileMetadata>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_source_urls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_search_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_hide_links: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_chain_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_intermediate_output: Option<bool>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            chat_id: None,
            message: message.into(),
            model: model.into(),
            system_prompt: None,
            stream: true,
            expert_id: None,
            sampling_parameters: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            cpu_only: None,
            images: None,
            document_context: None,
            file_metadata: None,
            web_search_enabled: None,
            include_source_urls: None,
            max_search_results: None,
            search_domains: None,
            web_search_hide_links: None,
            vision_chain_enabled: None,
            vision_model: None,
            show_intermediate_output: None,
        }
    }

    /// True when the request carries the legacy flat sampling fields.
    pub fn has_flat_sampling(&self) -> bool {
        self.max_tokens.is_some()
            || self.temperature.is_some()
            || self.top_p.is_some()
            || self.top_k.is_some()
            || self.repeat_penalty.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct NewChatRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "expertId", skip_serializing_if = "Option::is_none")]
    pub expert_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameChatRequest {
    pub new_title: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateChatModelRequest {
    pub model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChatExpertRequest {
    pub expert_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextChangeRequest {
    pub context_size: u64,
}
