use serde::Deserialize;

/// Synchronous reply from the non-streaming `/api/chat/send` fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub tokens: u64,
    pub chat_id: i64,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// An expert preset: a named model + system-prompt bundle with optional
/// web-search behavior. `model` is the backend's wire name for the expert's
/// base model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expert {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    pub model: String,
    #[serde(default)]
    pub base_prompt: String,
    #[serde(default)]
    pub personality_prompt: Option<String>,
    #[serde(default)]
    pub auto_web_search: bool,
    #[serde(default = "default_true")]
    pub web_search_show_links: bool,
    #[serde(default)]
    pub max_search_results: Option<u32>,
    /// Comma-separated domain allow-list as stored by the backend.
    #[serde(default)]
    pub search_domains: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Expert {
    /// The prompt actually sent for this expert: the base prompt, with the
    /// personality prompt appended under a fixed heading when present.
    pub fn combined_prompt(&self) -> String {
        match self.personality_prompt.as_deref() {
            Some(style) if !style.trim().is_empty() => {
                format!("{}\n\n## Kommunikationsstil:\n{}", self.base_prompt, style)
            }
            _ => self.base_prompt.clone(),
        }
    }

    /// Parses the comma-separated allow-list into the request's
    /// `searchDomains` array. Empty entries are dropped.
    pub fn search_domain_list(&self) -> Option<Vec<String>> {
        let domains: Vec<String> = self
            .search_domains
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from)
            .collect();
        if domains.is_empty() {
            None
        } else {
            Some(domains)
        }
    }
}

/// A user-built model registered on the backend. Custom models embed their
/// own system prompt, so chat requests targeting them carry an explicit
/// null `systemPrompt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A named system-prompt template; `/api/system-prompts/default` returns the
/// backend's registered default.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemPromptTemplate {
    #[serde(default)]
    pub name: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultModelResponse {
    pub model: String,
}

/// One installed model as `/api/models` lists it. This endpoint uses
/// snake_case field names, unlike the chat wire types.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub installed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub installed: Vec<ModelInfo>,
    #[serde(default)]
    pub selected_model: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}

/// Context-window facts for one model, from `/api/llm/models/context`.
/// `restart_needed` means the serving backend must be relaunched with a
/// larger window before this model is usable at full size.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelContextInfo {
    pub model: String,
    #[serde(default)]
    pub model_max_context: Option<u64>,
    pub effective_context: u64,
    #[serde(default)]
    pub current_context: Option<u64>,
    #[serde(default)]
    pub default_context: Option<u64>,
    #[serde(default)]
    pub restart_needed: bool,
}

/// Outcome of a `/api/llamaserver/context` resize request. When
/// `estimated_seconds` is positive the backend is restarting and callers
/// should wait that long before sending traffic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextChangeResult {
    pub success: bool,
    #[serde(default)]
    pub context_size: Option<u64>,
    #[serde(default)]
    pub restart_needed: bool,
    #[serde(default)]
    pub estimated_seconds: u64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Chaining (vision pipeline) settings from `/api/settings/chaining`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainingSettings {
    #[serde(default)]
    pub vision_model: Option<String>,
    #[serde(default)]
    pub show_intermediate_output: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok") || self.status.eq_ignore_ascii_case("healthy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_prompt_appends_style_section() {
        let expert = Expert {
            id: 1,
            name: "Roland".to_string(),
            role: Some("Rechtsanwalt".to_string()),
            model: "qwen2.5:7b".to_string(),
            base_prompt: "Du bist Anwalt.".to_string(),
            personality_prompt: Some("Duze den Benutzer".to_string()),
            auto_web_search: false,
            web_search_show_links: true,
            max_search_results: None,
            search_domains: None,
        };
        assert_eq!(
            expert.combined_prompt(),
            "Du bist Anwalt.\n\n## Kommunikationsstil:\nDuze den Benutzer"
        );
    }

    #[test]
    fn test_combined_prompt_ignores_blank_style() {
        let expert = Expert {
            id: 1,
            name: "Roland".to_string(),
            role: None,
            model: "qwen2.5:7b".to_string(),
            base_prompt: "Du bist Anwalt.".to_string(),
            personality_prompt: Some("   ".to_string()),
            auto_web_search: false,
            web_search_show_links: true,
            max_search_results: None,
            search_domains: None,
        };
        assert_eq!(expert.combined_prompt(), "Du bist Anwalt.");
    }

    #[test]
    fn test_search_domain_list_splits_and_trims() {
        let expert = Expert {
            id: 1,
            name: "Steuer".to_string(),
            role: None,
            model: "llama3.1:8b".to_string(),
            base_prompt: String::new(),
            personality_prompt: None,
            auto_web_search: true,
            web_search_show_links: false,
            max_search_results: Some(3),
            search_domains: Some("gesetze-im-internet.de, bundesfinanzministerium.de,,".to_string()),
        };
        assert_eq!(
            expert.search_domain_list(),
            Some(vec![
                "gesetze-im-internet.de".to_string(),
                "bundesfinanzministerium.de".to_string(),
            ])
        );
    }

    #[test]
    fn test_context_change_result_defaults() {
        let result: ContextChangeResult = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(result.success);
        assert_eq!(result.estimated_seconds, 0);
        assert!(!result.restart_needed);
    }
}
