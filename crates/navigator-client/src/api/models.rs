use crate::error::Result;
use crate::types::requests::ContextChangeRequest;
use crate::types::responses::{
    ContextChangeResult, CustomModel, DefaultModelResponse, ModelContextInfo, ModelsResponse,
};
use crate::NavigatorClient;

impl NavigatorClient {
    /// The installed models the backend can serve, plus its current and
    /// default selection.
    pub async fn list_models(&self) -> Result<ModelsResponse> {
        self.http.get("/api/models").await
    }

    pub async fn default_model(&self) -> Result<String> {
        let resp: DefaultModelResponse = self.http.get("/api/models/default").await?;
        Ok(resp.model)
    }

    /// User-built models. Fetched once per session by the expert selector to
    /// drive custom-model detection.
    pub async fn list_custom_models(&self) -> Result<Vec<CustomModel>> {
        self.http.get("/api/custom-models").await
    }

    /// Context-window facts for a model, including whether the serving
    /// backend must restart to honor it.
    pub async fn model_context_info(&self, model: &str) -> Result<ModelContextInfo> {
        self.http
            .get_with_query("/api/llm/models/context", &[("model", model)])
            .await
    }

    /// Request a context-window resize. The backend decides whether that
    /// means a restart; callers wait out `estimated_seconds` before sending
    /// traffic.
    pub async fn change_context_size(&self, context_size: u64) -> Result<ContextChangeResult> {
        self.http
            .post("/api/llamaserver/context", &ContextChangeRequest { context_size })
            .await
    }
}
