use crate::error::Result;
use crate::types::responses::HealthStatus;
use crate::NavigatorClient;

impl NavigatorClient {
    /// Backend liveness probe. Uses the short health timeout so a dead
    /// backend is reported quickly.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.http.health_check("/api/system/health").await
    }
}
