use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::Result;
use async_trait::async_trait;

use super::{ChatReply, ChatService};

pub const NO_RESPONSE: &str = "No response";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    #[allow(dead_code)]
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible chat completion client (one message per request, no history)
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: text.to_string(),
            }],
        }
    }

    /// Sends one turn. Every outcome, including transport failure, becomes a reply.
    pub async fn query(&self, text: &str) -> ChatReply {
        match self.try_query(text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("chat request failed: {:#}", e);
                ChatReply::Error(format!("API call failed: {}", e))
            }
        }
    }

    async fn try_query(&self, text: &str) -> Result<ChatReply> {
        let url = self.endpoint();
        tracing::info!(url = %url, model = %self.model, prompt_len = text.len(), "sending chat turn");

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(text))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "chat response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat endpoint rejected request: {}", body);
            return Ok(ChatReply::Error(format!("Error: {} - {}", status.as_u16(), body)));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_else(|| NO_RESPONSE.to_string());
        Ok(ChatReply::Content(content))
    }
}

#[async_trait]
impl ChatService for ChatClient {
    async fn send_chat_turn(&self, text: &str) -> ChatReply {
        self.query(text).await
    }
}
