use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::chat::models::{ChatRequest, ChatResponse};
use crate::config::Config;
use crate::error::CompletionError;

/// One request/response cycle against a chat-completion endpoint.
///
/// The chat loop only talks to this trait so it can be driven by a fake in
/// tests.
#[async_trait]
pub trait ChatCompletion {
    async fn complete(&self, user_text: &str) -> Result<String, CompletionError>;
}

// A client for an OpenAI-compatible chat completions API
pub struct CompletionClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Result<Self, CompletionError> {
        info!("Using completion endpoint: {}", config.endpoint);

        // No idle connections are kept, so every call releases its socket
        let client = Client::builder().pool_max_idle_per_host(0).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        })
    }
}

#[async_trait]
impl ChatCompletion for CompletionClient {
    async fn complete(&self, user_text: &str) -> Result<String, CompletionError> {
        let request = ChatRequest::new(&self.model, &self.system_prompt, user_text, self.temperature);
        let payload = serde_json::to_vec(&request).map_err(CompletionError::Encoding)?;

        info!("Sending request to {} with model {}", self.endpoint, self.model);
        debug!("Payload: {}", String::from_utf8_lossy(&payload));

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!("Failed to read error body for status {}: {}", status, e);
                String::new()
            });
            return Err(CompletionError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        debug!("Response body: {}", body);

        let envelope: ChatResponse =
            serde_json::from_str(&body).map_err(CompletionError::Decoding)?;

        let choice = envelope
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::NoChoices)?;

        debug!(
            "{} {} ({}, created {}, fingerprint {}): choice {} finish_reason={:?} logprobs={}, tokens={}/{}/{}",
            envelope.object,
            envelope.id,
            envelope.model,
            envelope.created,
            envelope.system_fingerprint,
            choice.index,
            choice.finish_reason,
            choice.logprobs,
            envelope.usage.prompt_tokens,
            envelope.usage.completion_tokens,
            envelope.usage.total_tokens
        );
        info!("Response length: {} characters", choice.message.content.len());

        Ok(choice.message.content)
    }
}
