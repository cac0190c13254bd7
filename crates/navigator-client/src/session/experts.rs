use crate::error::Result;
use crate::types::responses::{CustomModel, Expert};
use crate::NavigatorClient;
use tracing::{debug, warn};

pub const FALLBACK_SYSTEM_PROMPT: &str = "Du bist ein hilfreicher Assistent.";

/// Resolves "what model and system prompt is currently active" and handles
/// expert switching, including the backend context-window resize an expert's
/// model may require.
pub struct ExpertSelector {
    client: NavigatorClient,
    experts: Vec<Expert>,
    custom_models: Vec<CustomModel>,
    default_prompt: String,
    selected_expert_id: Option<i64>,
    active_model: String,
    system_prompt: String,
    /// Human-readable status while a context resize is in progress; `None`
    /// when idle. Always returns to `None`, even when the resize fails.
    switching_message: Option<String>,
}

impl ExpertSelector {
    pub fn new(client: NavigatorClient) -> Self {
        Self {
            client,
            experts: Vec::new(),
            custom_models: Vec::new(),
            default_prompt: FALLBACK_SYSTEM_PROMPT.to_string(),
            selected_expert_id: None,
            active_model: String::new(),
            system_prompt: FALLBACK_SYSTEM_PROMPT.to_string(),
            switching_message: None,
        }
    }

    /// Loads experts, the custom-model registry, and the default prompt,
    /// then reapplies any persisted model/expert selection. Registry
    /// failures are non-fatal; the session still works without them.
    pub async fn load(&mut self) -> Result<()> {
        self.experts = self.client.list_experts().await?;

        match self.client.list_custom_models().await {
            Ok(models) => self.custom_models = models,
            Err(e) => warn!(error = %e, "failed to load custom-model registry"),
        }
        match self.client.default_system_prompt().await {
            Ok(template) => self.default_prompt = template.content,
            Err(e) => warn!(error = %e, "failed to load default system prompt"),
        }
        self.system_prompt = self.default_prompt.clone();

        if let Ok(Some(model)) = self.client.selected_model().await {
            self.active_model = model;
        } else if let Ok(model) = self.client.default_model().await {
            self.active_model = model;
        }
        if let Ok(Some(expert_id)) = self.client.selected_expert().await {
            if let Some(expert) = self.find_expert(expert_id) {
                self.apply_expert_locally(&expert);
            }
        }
        Ok(())
    }

    pub fn experts(&self) -> &[Expert] {
        &self.experts
    }

    pub fn active_model(&self) -> &str {
        &self.active_model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn selected_expert_id(&self) -> Option<i64> {
        self.selected_expert_id
    }

    pub fn selected_expert(&self) -> Option<&Expert> {
        let id = self.selected_expert_id?;
        self.experts.iter().find(|e| e.id == id)
    }

    pub fn switching_message(&self) -> Option<&str> {
        self.switching_message.as_deref()
    }

    /// Case-insensitive lookup against the custom-model registry. Custom
    /// models embed their own prompt, so requests for them suppress
    /// `systemPrompt`.
    pub fn is_custom_model(&self, model: &str) -> bool {
        self.custom_models
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case(model))
    }

    fn find_expert(&self, expert_id: i64) -> Option<Expert> {
        self.experts.iter().find(|e| e.id == expert_id).cloned()
    }

    fn apply_expert_locally(&mut self, expert: &Expert) {
        self.selected_expert_id = Some(expert.id);
        self.active_model = expert.model.clone();
        self.system_prompt = expert.combined_prompt();
    }

    fn apply_default_prompt(&mut self) {
        self.selected_expert_id = None;
        self.system_prompt = if self.default_prompt.is_empty() {
            FALLBACK_SYSTEM_PROMPT.to_string()
        } else {
            self.default_prompt.clone()
        };
    }

    /// Picks a plain model: clears the expert, resets the prompt to the
    /// default template, persists both, and updates the active chat's
    /// stored model/expert. Persistence failures are logged; the local
    /// selection stands regardless.
    pub async fn set_selected_model(&mut self, model: &str, current_chat_id: Option<i64>) {
        self.active_model = model.to_string();
        self.apply_default_prompt();

        if let Err(e) = self.client.set_selected_model(model).await {
            warn!(error = %e, "failed to persist selected model");
        }
        if let Err(e) = self.client.set_selected_expert(None).await {
            warn!(error = %e, "failed to persist cleared expert");
        }
        if let Some(chat_id) = current_chat_id {
            if let Err(e) = self.client.update_chat_model(chat_id, model).await {
                warn!(chat_id, error = %e, "failed to update chat model");
            }
            if let Err(e) = self.client.update_chat_expert(chat_id, None).await {
                warn!(chat_id, error = %e, "failed to clear chat expert");
            }
        }
    }

    /// Selects an expert. When the expert's model needs a larger context
    /// window the backend restarts; during that window `switching_message`
    /// carries a status line, and it is cleared again on every exit path.
    pub async fn select_expert(&mut self, expert_id: i64, current_chat_id: Option<i64>) -> Result<()> {
        let Some(expert) = self.find_expert(expert_id) else {
            warn!(expert_id, "expert not found; keeping current selection");
            return Ok(());
        };

        self.await_context_ready(&expert).await;
        self.switching_message = None;

        self.apply_expert_locally(&expert);

        if let Err(e) = self.client.set_selected_expert(Some(expert.id)).await {
            warn!(error = %e, "failed to persist selected expert");
        }
        if let Err(e) = self.client.set_selected_model(&expert.model).await {
            warn!(error = %e, "failed to persist selected model");
        }
        if let Some(chat_id) = current_chat_id {
            if let Err(e) = self.client.update_chat_model(chat_id, expert.model.as_str()).await {
                warn!(chat_id, error = %e, "failed to update chat model");
            }
            if let Err(e) = self.client.update_chat_expert(chat_id, Some(expert.id)).await {
                warn!(chat_id, error = %e, "failed to update chat expert");
            }
        }
        Ok(())
    }

    /// Observes (never performs) the backend-side context resize: when a
    /// restart is needed, requests the new size and waits out the backend's
    /// own settle-time estimate. Failures are logged and the switch
    /// proceeds with whatever context is loaded.
    async fn await_context_ready(&mut self, expert: &Expert) {
        let info = match self.client.model_context_info(&expert.model).await {
            Ok(info) => info,
            Err(e) => {
                warn!(model = %expert.model, error = %e, "failed to query model context info");
                return;
            }
        };
        if !info.restart_needed {
            return;
        }

        self.switching_message = Some(format!("Wechsle zu {}...", expert.name));
        debug!(
            model = %expert.model,
            effective_context = info.effective_context,
            "context change needed"
        );
        match self.client.change_context_size(info.effective_context).await {
            Ok(result) if result.success => {
                if result.estimated_seconds > 0 {
                    self.switching_message = Some(format!("{} wird geladen...", expert.name));
                    tokio::time::sleep(std::time::Duration::from_secs(result.estimated_seconds))
                        .await;
                }
            }
            Ok(result) => {
                warn!(message = ?result.message, "context change rejected by backend");
            }
            Err(e) => {
                warn!(error = %e, "context change request failed");
            }
        }
    }

    /// Reapplies the expert stored on a loaded chat, or falls back to the
    /// default prompt so a previously selected expert never leaks into an
    /// unrelated chat.
    pub async fn restore_from_chat(&mut self, chat_expert_id: Option<i64>) {
        let Some(expert_id) = chat_expert_id else {
            if self.selected_expert_id.is_some() {
                debug!("clearing expert selection for non-expert chat");
                self.refresh_default_prompt().await;
                self.apply_default_prompt();
            }
            return;
        };

        match self.find_expert(expert_id) {
            Some(expert) => self.apply_expert_locally(&expert),
            None => {
                warn!(expert_id, "chat references an unknown expert; falling back to default");
                self.refresh_default_prompt().await;
                self.apply_default_prompt();
            }
        }
    }

    async fn refresh_default_prompt(&mut self) {
        match self.client.default_system_prompt().await {
            Ok(template) => self.default_prompt = template.content,
            Err(e) => {
                warn!(error = %e, "failed to refresh default system prompt");
                self.default_prompt = FALLBACK_SYSTEM_PROMPT.to_string();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        client: NavigatorClient,
        experts: Vec<Expert>,
        custom_models: Vec<CustomModel>,
    ) -> Self {
        let mut selector = Self::new(client);
        selector.experts = experts;
        selector.custom_models = custom_models;
        selector
    }
}
