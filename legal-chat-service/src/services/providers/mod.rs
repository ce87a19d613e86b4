//! Model provider abstraction.
//!
//! The orchestrator talks to a [`ChatProvider`]; the Gemini REST client is the
//! production implementation and a scripted mock backs tests.

pub mod gemini;
pub mod mock;

use crate::models::GenerationDefaults;
use crate::sources::GroundingMetadata;
use async_trait::async_trait;
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Label used for the provider error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Unauthorized(_) => "unauthorized",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other,
}

impl FinishReason {
    /// Wire name in the data stream protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content-filter",
            FinishReason::ToolCalls => "tool-calls",
            FinishReason::Other => "other",
        }
    }
}

/// Stream chunk for streaming responses.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),

    /// Thought summary from a reasoning model.
    Reasoning(String),

    ToolCall {
        id: String,
        name: String,
        args: Value,
    },

    /// Final chunk with usage stats.
    Complete {
        input_tokens: u32,
        output_tokens: u32,
        finish_reason: FinishReason,
    },
}

/// Type alias for provider streams.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnPart {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        args: Value,
    },
    ToolResult {
        id: String,
        name: String,
        result: Value,
    },
}

/// One conversation entry in provider terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<TurnPart>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![TurnPart::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![TurnPart::Text(text.into())],
        }
    }
}

/// Function the model may call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Provider-side model identifier.
    pub model: String,
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDeclaration>,
    pub generation: GenerationDefaults,
}

/// Answer of a search-grounded, non-streaming call.
#[derive(Debug, Clone, Default)]
pub struct GroundedAnswer {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Stream one model step. The stream ends with a `Complete` chunk.
    async fn stream_chat(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ProviderStream, ProviderError>;

    /// Answer `prompt` with web search grounding enabled.
    async fn grounded_search(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<GroundedAnswer, ProviderError>;
}
