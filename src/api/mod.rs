use crate::session::{Credential, SessionError};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub mod groq;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to read system prompt file {}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Transport, HTTP status and response-shape failures. Details are logged
    /// where they happen.
    #[error("Failed to generate Manim code")]
    Request,
    #[error("Generated code is missing required imports or class definition")]
    MissingMarkers { preview: String },
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-style chat completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Anything that can turn a chat request into the assistant's reply text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        credential: &Credential,
        request: &ChatRequest,
    ) -> Result<String, GenerationError>;
}
