use crate::conversation::{ChatRole, Prompt};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::time::Duration;

/// A client that turns a prompt into a single, non-streaming completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the text of the first completion choice, verbatim.
    async fn complete(&self, prompt: Prompt) -> Result<String>;
}

/// An implementation of `ChatClient` for any OpenAI-compatible API (Groq, OpenAI, ...).
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `client` - A configured `async-openai` client (API key, base URL, HTTP client).
    /// * `model` - The model identifier to use for chat completions (e.g., "llama3-8b-8192").
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Builds an `async-openai` client that makes exactly one attempt per call.
///
/// The library's default backoff retries 429 and 5xx responses for minutes; a zero
/// elapsed-time budget makes the first failure final.
pub fn single_attempt_client(config: OpenAIConfig, http: reqwest::Client) -> Client<OpenAIConfig> {
    Client::with_config(config)
        .with_http_client(http)
        .with_backoff(
            ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(Duration::ZERO))
                .build(),
        )
}

/// Converts a prompt into the wire message list: system first, then turns in order.
pub(crate) fn to_request_messages(prompt: Prompt) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt.system)
            .build()?
            .into(),
    ];
    for turn in prompt.turns {
        match turn.role {
            ChatRole::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content)
                    .build()?
                    .into(),
            ),
            ChatRole::Assistant => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content)
                    .build()?
                    .into(),
            ),
        };
    }
    Ok(messages)
}

#[async_trait]
impl ChatClient for OpenAICompatibleClient {
    async fn complete(&self, prompt: Prompt) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(prompt)?)
            .build()?;

        let response: CreateChatCompletionResponse = self
            .client
            .chat()
            .create(request)
            .await
            .context("Chat completion request failed")?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .context("No response choice from LLM")?
            .message
            .content
            .context("No content in LLM response")?;

        Ok(answer)
    }
}
