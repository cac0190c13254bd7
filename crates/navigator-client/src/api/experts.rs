use crate::error::Result;
use crate::types::responses::{Expert, SystemPromptTemplate};
use crate::NavigatorClient;

impl NavigatorClient {
    pub async fn list_experts(&self) -> Result<Vec<Expert>> {
        self.http.get("/api/experts").await
    }

    /// The backend-registered default system prompt, used whenever no expert
    /// is selected.
    pub async fn default_system_prompt(&self) -> Result<SystemPromptTemplate> {
        self.http.get("/api/system-prompts/default").await
    }
}
