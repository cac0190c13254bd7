use crate::error::Result;
use crate::types::requests::SamplingParameters;
use crate::types::responses::ChainingSettings;
use crate::NavigatorClient;

/// The scalar selection settings travel as `text/plain` bodies; a GET
/// answers 204 when nothing has been persisted yet.
impl NavigatorClient {
    pub async fn selected_model(&self) -> Result<Option<String>> {
        let value = self
            .http
            .get_text_optional("/api/settings/selected-model")
            .await?;
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    pub async fn set_selected_model(&self, model: &str) -> Result<()> {
        self.http
            .post_text("/api/settings/selected-model", model)
            .await
    }

    pub async fn selected_expert(&self) -> Result<Option<i64>> {
        let value = self
            .http
            .get_text_optional("/api/settings/selected-expert")
            .await?;
        Ok(value.and_then(|v| v.trim().parse().ok()))
    }

    /// `None` persists a cleared selection (empty body).
    pub async fn set_selected_expert(&self, expert_id: Option<i64>) -> Result<()> {
        let body = expert_id.map(|id| id.to_string()).unwrap_or_default();
        self.http
            .post_text("/api/settings/selected-expert", body)
            .await
    }

    pub async fn sampling_parameters(&self) -> Result<SamplingParameters> {
        self.http.get("/api/settings/sampling").await
    }

    pub async fn chaining_settings(&self) -> Result<ChainingSettings> {
        self.http.get("/api/settings/chaining").await
    }
}
