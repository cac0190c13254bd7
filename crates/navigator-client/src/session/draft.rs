use crate::session::settings::SessionSettings;
use crate::types::chat::FileMetadata;
use crate::types::requests::ChatRequest;
use crate::types::responses::Expert;

const GERMAN_REPLY_PREFIX: &str = "Du antwortest IMMER auf Deutsch.";
const DEFAULT_MAX_SEARCH_RESULTS: u32 = 5;

/// One uploaded file, already read by the caller: images arrive as base64,
/// documents as extracted text. The raw bytes never enter a chat request.
#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub name: String,
    pub file_type: String,
    pub size: u64,
    pub kind: AttachmentKind,
}

#[derive(Debug, Clone)]
pub enum AttachmentKind {
    Image { base64: String },
    Document { text_content: String },
}

impl AttachedFile {
    pub fn image(name: impl Into<String>, size: u64, base64: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: "image".to_string(),
            size,
            kind: AttachmentKind::Image {
                base64: base64.into(),
            },
        }
    }

    pub fn document(
        name: impl Into<String>,
        file_type: impl Into<String>,
        size: u64,
        text_content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_type: file_type.into(),
            size,
            kind: AttachmentKind::Document {
                text_content: text_content.into(),
            },
        }
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.name.clone(),
            file_type: self.file_type.clone(),
            size: self.size,
        }
    }
}

/// What the user typed and attached. `web_search` is the explicit
/// per-message toggle: `None` means the user did not touch it, and only
/// then is the expert's auto-web-search configuration consulted.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub text: String,
    pub files: Vec<AttachedFile>,
    pub web_search: Option<bool>,
}

impl MessageDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
            web_search: None,
        }
    }

    pub fn with_file(mut self, file: AttachedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = Some(enabled);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn file_metadata(&self) -> Vec<FileMetadata> {
        self.files.iter().map(AttachedFile::metadata).collect()
    }
}

/// The resolved session context a request is built against.
pub(crate) struct RequestContext<'a> {
    pub chat_id: Option<i64>,
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub expert: Option<&'a Expert>,
    pub is_custom_model: bool,
}

/// Builds the exact outbound payload. Never fails; a blank draft yields
/// `None` and the caller treats it as a silent no-op.
pub(crate) fn build_chat_request(
    draft: &MessageDraft,
    ctx: &RequestContext<'_>,
    settings: &SessionSettings,
) -> Option<ChatRequest> {
    if draft.is_blank() {
        return None;
    }

    let mut request = ChatRequest::new(draft.text.clone(), ctx.model);
    request.chat_id = ctx.chat_id;
    request.expert_id = ctx.expert.map(|e| e.id);
    request.system_prompt = if ctx.is_custom_model {
        None
    } else {
        Some(ctx.system_prompt.to_string())
    };

    match settings.sampling_override {
        Some(params) => request.sampling_parameters = Some(params),
        None => {
            request.max_tokens = Some(settings.max_tokens);
            request.temperature = Some(settings.temperature);
            request.top_p = Some(settings.top_p);
            request.top_k = Some(settings.top_k);
            request.repeat_penalty = Some(settings.repeat_penalty);
        }
    }

    if settings.cpu_only {
        request.cpu_only = Some(true);
    }

    let mut images = Vec::new();
    let mut document_context = String::new();
    for file in &draft.files {
        match &file.kind {
            AttachmentKind::Image { base64 } => images.push(base64.clone()),
            AttachmentKind::Document { text_content } => {
                document_context.push_str(&format!("\n\n=== {} ===\n{}", file.name, text_content));
            }
        }
    }
    if !draft.files.is_empty() {
        request.file_metadata = Some(draft.file_metadata());
    }
    if !document_context.trim().is_empty() {
        request.document_context = Some(document_context.trim().to_string());
    }

    // Vision chaining: an image attached while a text-only model is active
    // enables the two-stage pipeline, with the reply-language prefix forced
    // onto the prompt unless the model is custom.
    if !images.is_empty() && !SessionSettings::is_vision_model(ctx.model) {
        request.vision_chain_enabled = Some(true);
        request.vision_model = Some(settings.preferred_vision_model.clone());
        request.show_intermediate_output = Some(settings.show_intermediate_output);
        if !ctx.is_custom_model {
            request.system_prompt = Some(match request.system_prompt.take() {
                Some(prompt) if !prompt.is_empty() => {
                    format!("{GERMAN_REPLY_PREFIX}\n\n{prompt}")
                }
                _ => GERMAN_REPLY_PREFIX.to_string(),
            });
        }
    }
    if !images.is_empty() {
        request.images = Some(images);
    }

    apply_web_search(&mut request, draft.web_search, ctx.expert);

    Some(request)
}

/// The explicit per-message toggle wins; the expert's auto-web-search
/// configuration applies only when the user left the toggle untouched.
fn apply_web_search(request: &mut ChatRequest, explicit: Option<bool>, expert: Option<&Expert>) {
    match explicit {
        Some(true) => {
            request.web_search_enabled = Some(true);
            request.include_source_urls = Some(true);
            request.max_search_results = Some(DEFAULT_MAX_SEARCH_RESULTS);
        }
        Some(false) => {}
        None => {
            let Some(expert) = expert.filter(|e| e.auto_web_search) else {
                return;
            };
            request.web_search_enabled = Some(true);
            request.include_source_urls = Some(true);
            request.max_search_results =
                Some(expert.max_search_results.unwrap_or(DEFAULT_MAX_SEARCH_RESULTS));
            if !expert.web_search_show_links {
                request.web_search_hide_links = Some(true);
            }
            request.search_domains = expert.search_domain_list();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(model: &'a str, prompt: &'a str) -> RequestContext<'a> {
        RequestContext {
            chat_id: Some(1),
            model,
            system_prompt: prompt,
            expert: None,
            is_custom_model: false,
        }
    }

    fn expert(auto_web_search: bool) -> Expert {
        Expert {
            id: 9,
            name: "Roland".to_string(),
            role: None,
            model: "qwen2.5:7b".to_string(),
            base_prompt: "Du bist Anwalt.".to_string(),
            personality_prompt: None,
            auto_web_search,
            web_search_show_links: false,
            max_search_results: Some(3),
            search_domains: Some("gesetze-im-internet.de".to_string()),
        }
    }

    #[test]
    fn test_blank_draft_builds_nothing() {
        let draft = MessageDraft::new("   \n\t ");
        let settings = SessionSettings::default();
        assert!(build_chat_request(&draft, &ctx("llama3.1:8b", "p"), &settings).is_none());
    }

    #[test]
    fn test_flat_sampling_fields_by_default() {
        let draft = MessageDraft::new("hallo");
        let settings = SessionSettings::default();
        let request = build_chat_request(&draft, &ctx("llama3.1:8b", "p"), &settings).unwrap();
        assert!(request.sampling_parameters.is_none());
        assert_eq!(request.max_tokens, Some(32_768));
        assert_eq!(request.repeat_penalty, Some(1.18));
    }

    #[test]
    fn test_persisted_sampling_excludes_flat_fields() {
        let draft = MessageDraft::new("hallo");
        let mut settings = SessionSettings::default();
        settings.sampling_override = Some(Default::default());
        let request = build_chat_request(&draft, &ctx("llama3.1:8b", "p"), &settings).unwrap();
        assert!(request.sampling_parameters.is_some());
        assert!(!request.has_flat_sampling());
    }

    #[test]
    fn test_custom_model_suppresses_system_prompt() {
        let draft = MessageDraft::new("hallo");
        let settings = SessionSettings::default();
        let mut context = ctx("nova:latest", "ein Prompt");
        context.is_custom_model = true;
        let request = build_chat_request(&draft, &context, &settings).unwrap();
        assert_eq!(request.system_prompt, None);
    }

    #[test]
    fn test_custom_model_suppresses_prompt_even_with_vision_chain() {
        let draft = MessageDraft::new("beschreibe das Bild")
            .with_file(AttachedFile::image("foto.png", 100, "aGFsbG8="));
        let settings = SessionSettings::default();
        let mut context = ctx("nova:latest", "ein Prompt");
        context.is_custom_model = true;
        let request = build_chat_request(&draft, &context, &settings).unwrap();
        assert_eq!(request.vision_chain_enabled, Some(true));
        assert_eq!(request.system_prompt, None);
    }

    #[test]
    fn test_vision_chain_for_text_model_with_image() {
        let draft = MessageDraft::new("beschreibe das Bild")
            .with_file(AttachedFile::image("foto.png", 100, "aGFsbG8="));
        let settings = SessionSettings::default();
        let request = build_chat_request(&draft, &ctx("llama3.1:8b", "Sei knapp."), &settings).unwrap();
        assert_eq!(request.vision_chain_enabled, Some(true));
        assert_eq!(request.vision_model.as_deref(), Some("llava:7b"));
        assert_eq!(
            request.system_prompt.as_deref(),
            Some("Du antwortest IMMER auf Deutsch.\n\nSei knapp.")
        );
        assert_eq!(request.images.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_no_vision_chain_for_vision_model() {
        let draft = MessageDraft::new("beschreibe das Bild")
            .with_file(AttachedFile::image("foto.png", 100, "aGFsbG8="));
        let settings = SessionSettings::default();
        let request = build_chat_request(&draft, &ctx("llava:7b", "p"), &settings).unwrap();
        assert!(request.vision_chain_enabled.is_none());
        assert!(request.vision_model.is_none());
        assert_eq!(request.system_prompt.as_deref(), Some("p"));
    }

    #[test]
    fn test_document_context_headers() {
        let draft = MessageDraft::new("fasse zusammen")
            .with_file(AttachedFile::document("a.txt", "text/plain", 10, "Inhalt A"))
            .with_file(AttachedFile::document("b.txt", "text/plain", 10, "Inhalt B"));
        let settings = SessionSettings::default();
        let request = build_chat_request(&draft, &ctx("llama3.1:8b", "p"), &settings).unwrap();
        assert_eq!(
            request.document_context.as_deref(),
            Some("=== a.txt ===\nInhalt A\n\n=== b.txt ===\nInhalt B")
        );
        assert_eq!(request.file_metadata.as_ref().unwrap().len(), 2);
        assert!(request.images.is_none());
    }

    #[test]
    fn test_explicit_web_search_toggle_wins_over_expert() {
        let e = expert(true);
        let settings = SessionSettings::default();
        let mut context = ctx("qwen2.5:7b", "p");
        context.expert = Some(&e);

        // Explicitly off: the expert's auto search must not re-enable it.
        let draft = MessageDraft::new("suche das").with_web_search(false);
        let request = build_chat_request(&draft, &context, &settings).unwrap();
        assert!(request.web_search_enabled.is_none());

        // Explicitly on: generic defaults, not the expert's config.
        let draft = MessageDraft::new("suche das").with_web_search(true);
        let request = build_chat_request(&draft, &context, &settings).unwrap();
        assert_eq!(request.web_search_enabled, Some(true));
        assert_eq!(request.max_search_results, Some(5));
        assert!(request.search_domains.is_none());
    }

    #[test]
    fn test_expert_auto_web_search_applies_without_toggle() {
        let e = expert(true);
        let settings = SessionSettings::default();
        let mut context = ctx("qwen2.5:7b", "p");
        context.expert = Some(&e);
        let request = build_chat_request(&MessageDraft::new("suche das"), &context, &settings).unwrap();
        assert_eq!(request.web_search_enabled, Some(true));
        assert_eq!(request.include_source_urls, Some(true));
        assert_eq!(request.max_search_results, Some(3));
        assert_eq!(request.web_search_hide_links, Some(true));
        assert_eq!(
            request.search_domains,
            Some(vec!["gesetze-im-internet.de".to_string()])
        );
    }

    #[test]
    fn test_chat_and_expert_ids_carried() {
        let e = expert(false);
        let settings = SessionSettings::default();
        let mut context = ctx("qwen2.5:7b", "p");
        context.chat_id = Some(42);
        context.expert = Some(&e);
        let request = build_chat_request(&MessageDraft::new("hallo"), &context, &settings).unwrap();
        assert_eq!(request.chat_id, Some(42));
        assert_eq!(request.expert_id, Some(9));
        assert!(request.stream);
    }
}
