use crate::api::{ChatBackend, ChatRequest, GenerationError};
use crate::config::Settings;
use crate::logw;
use crate::session::Credential;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const ERROR_SNIPPET_CHARS: usize = 800;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

fn snippet(raw: &str) -> String {
    raw.chars().take(ERROR_SNIPPET_CHARS).collect()
}

/// Pulls `choices[0].message.content` out of a completion response body.
fn extract_message_content(resp_json: &str) -> Option<String> {
    let root: CompletionResponse = serde_json::from_str(resp_json).ok()?;
    root.choices.into_iter().next()?.message.content
}

pub struct GroqClient {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl GroqClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            api_url: settings.api_url.clone(),
            timeout: settings.request_timeout(),
        }
    }

    pub fn build_request(
        &self,
        credential: &Credential,
        body: &ChatRequest,
    ) -> reqwest::Result<reqwest::Request> {
        self.client
            .post(&self.api_url)
            .bearer_auth(credential.expose())
            .json(body)
            .timeout(self.timeout)
            .build()
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    async fn complete(
        &self,
        credential: &Credential,
        request: &ChatRequest,
    ) -> Result<String, GenerationError> {
        let http_request = self.build_request(credential, request).map_err(|err| {
            logw(format!("Groq request could not be built: {}", err));
            GenerationError::Request
        })?;

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let resp = self.client.execute(http_request).await.map_err(|err| {
            logw(format!("Groq request failed: {}", err));
            GenerationError::Request
        })?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("Groq HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                logw(format!("Groq raw body: {}", snippet(&raw)));
            }
            return Err(GenerationError::Request);
        }

        match extract_message_content(&raw) {
            Some(content) => Ok(content),
            None => {
                logw("Groq response parse failed.");
                if !raw.is_empty() {
                    logw(format!("Groq raw body: {}", snippet(&raw)));
                }
                Err(GenerationError::Request)
            }
        }
    }
}
