//! Gemini provider implementation.
//!
//! Chat turns use `streamGenerateContent` over SSE; web search uses a single
//! `generateContent` call with the `googleSearch` tool.

use super::{
    ChatProvider, ChatRequest, FinishReason, GroundedAnswer, ProviderError, ProviderStream,
    StreamChunk, ToolDeclaration, Turn, TurnPart, TurnRole,
};
use crate::models::GenerationDefaults;
use crate::sources::GroundingMetadata;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub request_timeout: Duration,
}

pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post<T: Serialize>(
        &self,
        url: &str,
        api_key: &str,
        body: &T,
    ) -> Result<reqwest::Response, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(status_error(status, error_text))
    }
}

fn status_error(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(body),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        StatusCode::BAD_REQUEST if body.contains("API key not valid") => {
            ProviderError::Unauthorized(body)
        }
        _ => ProviderError::ApiError(format!("Gemini API error {}: {}", status, body)),
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Other,
    }
}

fn build_generation_config(defaults: &GenerationDefaults) -> GenerationConfig {
    GenerationConfig {
        temperature: defaults.temperature,
        top_p: defaults.top_p,
        top_k: defaults.top_k,
        max_output_tokens: defaults.max_output_tokens,
        stop_sequences: if defaults.stop_sequences.is_empty() {
            None
        } else {
            Some(defaults.stop_sequences.clone())
        },
        thinking_config: defaults.thinking_budget.map(|budget| ThinkingConfig {
            thinking_budget: budget,
            include_thoughts: defaults.include_thoughts,
        }),
    }
}

fn to_content(turn: &Turn) -> Content {
    let role = match turn.role {
        TurnRole::User => "user",
        TurnRole::Model => "model",
    };
    let parts = turn
        .parts
        .iter()
        .map(|part| match part {
            TurnPart::Text(text) => Part {
                text: Some(text.clone()),
                ..Part::default()
            },
            TurnPart::ToolCall { id, name, args } => Part {
                function_call: Some(FunctionCall {
                    id: Some(id.clone()),
                    name: name.clone(),
                    args: args.clone(),
                }),
                ..Part::default()
            },
            TurnPart::ToolResult { id, name, result } => Part {
                function_response: Some(FunctionResponse {
                    id: Some(id.clone()),
                    name: name.clone(),
                    response: result.clone(),
                }),
                ..Part::default()
            },
        })
        .collect();

    Content {
        role: Some(role.to_string()),
        parts,
    }
}

fn to_tools(tools: &[ToolDeclaration]) -> Option<Vec<Tool>> {
    if tools.is_empty() {
        return None;
    }
    Some(vec![Tool {
        function_declarations: Some(
            tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        ),
        google_search: None,
    }])
}

/// Append raw body bytes with carriage returns removed, so `\r\n\r\n`
/// delimits events the same as `\n\n`.
fn push_chunk(buffer: &mut BytesMut, chunk: &[u8]) {
    buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));
}

/// Split off complete SSE events, leaving any partial event in `buffer`.
/// Decoding waits for the delimiter, so a character split across network
/// chunks is never decoded in halves.
fn drain_events(buffer: &mut BytesMut) -> Vec<String> {
    let mut events = Vec::new();
    while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
        let event = buffer.split_to(end + 2);
        events.push(String::from_utf8_lossy(&event).into_owned());
    }
    events
}

fn event_data(event: &str) -> Option<String> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    (!data.is_empty()).then(|| data.join("\n"))
}

/// Chunks carried by one streamed response object.
fn chunks_from_response(response: &GenerateContentResponse) -> Vec<StreamChunk> {
    let Some(candidate) = response.candidates.first() else {
        return Vec::new();
    };
    let Some(content) = candidate.content.as_ref() else {
        return Vec::new();
    };

    content
        .parts
        .iter()
        .filter_map(|part| {
            if let Some(call) = &part.function_call {
                let id = call
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                return Some(StreamChunk::ToolCall {
                    id,
                    name: call.name.clone(),
                    args: call.args.clone(),
                });
            }
            let text = part.text.as_ref().filter(|t| !t.is_empty())?;
            if part.thought.unwrap_or(false) {
                Some(StreamChunk::Reasoning(text.clone()))
            } else {
                Some(StreamChunk::Text(text.clone()))
            }
        })
        .collect()
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn stream_chat(
        &self,
        api_key: &str,
        request: ChatRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let body = GenerateContentRequest {
            contents: request.turns.iter().map(to_content).collect(),
            system_instruction: (!request.system_prompt.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: Some(request.system_prompt.clone()),
                    ..Part::default()
                }],
            }),
            tools: to_tools(&request.tools),
            generation_config: Some(build_generation_config(&request.generation)),
        };

        let url = format!(
            "{}?alt=sse",
            self.api_url(&request.model, "streamGenerateContent")
        );

        tracing::debug!(
            model = %request.model,
            turns = request.turns.len(),
            tools = request.tools.len(),
            "Starting streaming request to Gemini API"
        );

        let response = self.post(&url, api_key, &body).await?;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = BytesMut::new();
            let mut input_tokens = 0u32;
            let mut output_tokens = 0u32;
            let mut finish_reason = FinishReason::Stop;
            let mut saw_tool_call = false;

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::NetworkError(e.to_string())))
                            .await;
                        return;
                    }
                };
                push_chunk(&mut buffer, &chunk);

                for event in drain_events(&mut buffer) {
                    let Some(data) = event_data(&event) else {
                        continue;
                    };
                    let response = match serde_json::from_str::<GenerateContentResponse>(&data) {
                        Ok(response) => response,
                        Err(e) => {
                            let _ = tx
                                .send(Err(ProviderError::InvalidResponse(e.to_string())))
                                .await;
                            return;
                        }
                    };

                    if let Some(usage) = &response.usage_metadata {
                        input_tokens = usage.prompt_token_count.unwrap_or(input_tokens);
                        output_tokens = usage.candidates_token_count.unwrap_or(output_tokens);
                    }
                    if let Some(reason) = response
                        .candidates
                        .first()
                        .and_then(|c| c.finish_reason.as_deref())
                    {
                        finish_reason = map_finish_reason(reason);
                    }

                    for chunk in chunks_from_response(&response) {
                        if matches!(chunk, StreamChunk::ToolCall { .. }) {
                            saw_tool_call = true;
                        }
                        // Receiver gone: the client disconnected.
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            if saw_tool_call && finish_reason == FinishReason::Stop {
                finish_reason = FinishReason::ToolCalls;
            }
            let _ = tx
                .send(Ok(StreamChunk::Complete {
                    input_tokens,
                    output_tokens,
                    finish_reason,
                }))
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as ProviderStream)
    }

    async fn grounded_search(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<GroundedAnswer, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![to_content(&Turn::user_text(prompt))],
            system_instruction: None,
            tools: Some(vec![Tool {
                function_declarations: None,
                google_search: Some(GoogleSearch {}),
            }]),
            generation_config: None,
        };

        let url = self.api_url(model, "generateContent");
        tracing::debug!(model = %model, "Sending grounded search request to Gemini API");

        let response: GenerateContentResponse = self
            .post(&url, api_key, &body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            return Err(ProviderError::InvalidResponse(
                "response has no candidates".to_string(),
            ));
        };

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|p| !p.thought.unwrap_or(false))
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(GroundedAnswer {
            text,
            grounding: candidate.grounding_metadata,
        })
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    function_declarations: Option<Vec<FunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<GoogleSearch>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
    include_thoughts: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}
