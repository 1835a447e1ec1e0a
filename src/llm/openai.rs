use super::{Assistant, AssistantApi, LlmError, RemoteThread, Run, ThreadMessage};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Client for the OpenAI Assistants (v2) endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    config: OpenAiConfig,
    client: Client,
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

impl OpenAiAssistants {
    pub fn new(config: OpenAiConfig) -> Self {
        OpenAiAssistants {
            config,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("OpenAI-Beta", "assistants=v2");
        if self.config.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.config.api_key))
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, LlmError> {
        let resp = self.authorize(req).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: text,
            });
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| LlmError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistants {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, LlmError> {
        let req = self.client.get(self.url(&format!("/assistants/{assistant_id}")));
        self.send(req).await
    }

    async fn create_thread(&self) -> Result<RemoteThread, LlmError> {
        let req = self
            .client
            .post(self.url("/threads"))
            .json(&serde_json::json!({}));
        self.send(req).await
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<(), LlmError> {
        let req = self
            .client
            .post(self.url(&format!("/threads/{thread_id}/messages")))
            .json(&CreateMessageRequest {
                role: "user",
                content,
            });
        self.send::<IgnoredAny>(req).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, LlmError> {
        let req = self
            .client
            .post(self.url(&format!("/threads/{thread_id}/runs")))
            .json(&CreateRunRequest { assistant_id });
        self.send(req).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, LlmError> {
        let req = self
            .client
            .get(self.url(&format!("/threads/{thread_id}/runs/{run_id}")));
        self.send(req).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, LlmError> {
        let req = self
            .client
            .get(self.url(&format!("/threads/{thread_id}/messages?order=desc")));
        let list: MessageList = self.send(req).await?;
        Ok(list.data)
    }
}
