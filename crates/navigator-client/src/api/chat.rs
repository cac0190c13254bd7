use crate::error::Result;
use crate::streaming::SseLineStream;
use crate::types::chat::Chat;
use crate::types::events::StreamEvent;
use crate::types::requests::{
    ChatRequest, NewChatRequest, RenameChatRequest, UpdateChatExpertRequest,
    UpdateChatModelRequest,
};
use crate::types::responses::ChatResponse;
use crate::NavigatorClient;
use futures::{Stream, StreamExt};

impl NavigatorClient {
    /// Send a message and receive the reply as a stream of classified events.
    ///
    /// The first item is normally [`StreamEvent::Started`] carrying the
    /// server-assigned chat id and the request id used for [`abort_request`].
    /// The stream ends after [`StreamEvent::Completed`] or
    /// [`StreamEvent::Error`], or earlier on transport failure.
    ///
    /// [`abort_request`]: NavigatorClient::abort_request
    pub async fn send_message_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent>>> {
        let resp = self.http.post_streaming("/api/chat/send-stream", request).await?;
        let lines = SseLineStream::new(resp.bytes_stream());
        Ok(lines.map(|line| line.map(|payload| StreamEvent::classify(&payload))))
    }

    /// Non-streaming fallback: the same payload with `stream: false`, one
    /// synchronous JSON reply.
    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.http.post("/api/chat/send", request).await
    }

    /// Ask the backend to stop generating. Fire-and-forget: the stream still
    /// ends through its normal end-of-stream path.
    pub async fn abort_request(&self, request_id: &str) -> Result<()> {
        self.http
            .post_no_body(&format!("/api/chat/abort/{request_id}"))
            .await
    }

    pub async fn create_chat(
        &self,
        title: impl Into<String>,
        model: Option<String>,
        expert_id: Option<i64>,
    ) -> Result<Chat> {
        self.http
            .post(
                "/api/chat/new",
                &NewChatRequest {
                    title: title.into(),
                    model,
                    expert_id,
                },
            )
            .await
    }

    /// All chats, newest first, without message bodies.
    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        self.http.get("/api/chat/all").await
    }

    /// One chat with its full message history.
    pub async fn chat_history(&self, chat_id: i64) -> Result<Chat> {
        self.http.get(&format!("/api/chat/history/{chat_id}")).await
    }

    pub async fn rename_chat(&self, chat_id: i64, new_title: impl Into<String>) -> Result<()> {
        self.http
            .patch_empty(
                &format!("/api/chat/{chat_id}/rename"),
                &RenameChatRequest {
                    new_title: new_title.into(),
                },
            )
            .await
    }

    pub async fn update_chat_model(&self, chat_id: i64, model: impl Into<String>) -> Result<()> {
        self.http
            .patch_empty(
                &format!("/api/chat/{chat_id}/model"),
                &UpdateChatModelRequest {
                    model: model.into(),
                },
            )
            .await
    }

    /// `None` clears the chat's stored expert.
    pub async fn update_chat_expert(&self, chat_id: i64, expert_id: Option<i64>) -> Result<()> {
        self.http
            .patch_empty(
                &format!("/api/chat/{chat_id}/expert"),
                &UpdateChatExpertRequest { expert_id },
            )
            .await
    }

    pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
        self.http.delete(&format!("/api/chat/{chat_id}")).await
    }
}
