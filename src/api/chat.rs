use super::{body_or_default, ApiError, AppState};
use crate::llm::assistant::AssistantReply;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Text sent when a completed run left no assistant reply.
pub const NO_CONTENT_MESSAGE: &str = "No response from assistant.";

#[derive(Debug, Default, Deserialize)]
pub struct InitChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct InitChatResponse {
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_content: bool,
}

impl From<AssistantReply> for InitChatResponse {
    fn from(reply: AssistantReply) -> Self {
        match reply {
            AssistantReply::Text(message) => InitChatResponse {
                message,
                no_content: false,
            },
            AssistantReply::NoContent => InitChatResponse {
                message: NO_CONTENT_MESSAGE.to_string(),
                no_content: true,
            },
        }
    }
}

pub async fn init_chat(
    State(state): State<AppState>,
    payload: Result<Json<InitChatRequest>, JsonRejection>,
) -> Result<Json<InitChatResponse>, ApiError> {
    let req: InitChatRequest = body_or_default(payload)?;
    let reply = state.chat.send(&req.message).await?;
    Ok(Json(reply.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_is_flagged_and_real_replies_are_not() {
        let text = serde_json::to_value(InitChatResponse::from(AssistantReply::Text("pong".into())))
            .unwrap();
        assert_eq!(text, json!({ "message": "pong" }));

        let empty = serde_json::to_value(InitChatResponse::from(AssistantReply::NoContent)).unwrap();
        assert_eq!(
            empty,
            json!({ "message": NO_CONTENT_MESSAGE, "no_content": true })
        );
    }
}
