mod api;
pub mod cache;
pub mod config;
pub mod error;
pub(crate) mod http;
pub mod session;
pub(crate) mod streaming;
pub mod types;

pub use cache::TranscriptCache;
pub use config::NavigatorClientConfig;
pub use error::{NavigatorClientError, Result};
pub use session::{
    AttachedFile, AttachmentKind, ChatMessage, ChatSession, ChatState, MessageDraft,
    SessionSettings, StreamingMessage, SwapProgress,
};
pub use types::chat::{Chat, ContextUsage, FileMetadata, Message, Role};
pub use types::events::{StreamEvent, SwapStatus};
pub use types::requests::{ChatRequest, SamplingParameters};
pub use types::responses::{
    ChatResponse, ContextChangeResult, CustomModel, Expert, HealthStatus, ModelContextInfo,
    ModelInfo, ModelsResponse, SystemPromptTemplate,
};

use http::HttpClient;

/// Async HTTP client for the Fleet Navigator backend.
///
/// All methods require a reachable backend instance. State-changing calls
/// carry the CSRF token configured through [`NavigatorClientConfig`].
///
/// `NavigatorClient` is `Clone` — the underlying `reqwest::Client` uses an
/// `Arc` internally, so clones share the same connection pool. For the
/// stateful orchestration layer (chat state, experts, reconciliation) wrap
/// one in a [`ChatSession`].
#[derive(Clone)]
pub struct NavigatorClient {
    pub(crate) http: HttpClient,
}

impl NavigatorClient {
    pub fn new(config: NavigatorClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config)?,
        })
    }
}
