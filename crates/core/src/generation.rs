use crate::error::ChatError;
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_GENERATION_MODEL: &str = "llama3-70b-8192";

/// Capability boundary for the language-generation service: a message list
/// in, the reply text out. Used for both query condensation and answer
/// synthesis. Failures surface as [`ChatError::Generation`].
#[async_trait]
pub trait Generator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq-hosted
/// models by default).
pub struct ChatCompletionsClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<CompletionsChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    message: CompletionsMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionsMessage {
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for ChatCompletionsClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&json!({
                "model": self.model,
                "messages": messages,
            }));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ChatError::Generation(error.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Generation(format!(
                "chat completions endpoint {} returned {}",
                self.endpoint,
                response.status()
            )));
        }

        let payload: CompletionsResponse = response
            .json()
            .await
            .map_err(|error| ChatError::Generation(error.to_string()))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ChatError::Generation("chat completions response has no message content".to_string())
            })
    }
}
