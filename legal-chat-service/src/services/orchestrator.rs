//! One chat turn, end to end.
//!
//! `prepare` runs everything that can reject the request with a plain HTTP
//! error (validation, model lookup, quota, logging the user message).
//! `start` then streams the model output as data stream lines from a
//! spawned task. Usage is committed only after the whole turn succeeded.

use crate::models::{
    ChatMessage, MessagePart, ModelConfig, Role, ToolInvocation, ToolInvocationState, UiMessage,
    UrlSource,
};
use crate::services::catalog::ModelCatalog;
use crate::services::credentials::CredentialResolver;
use crate::services::data_stream::{StreamPart, TokenUsage};
use crate::services::error::ChatError;
use crate::services::metrics;
use crate::services::providers::{
    ChatProvider, ChatRequest, FinishReason, ProviderError, StreamChunk, ToolDeclaration, Turn,
    TurnPart, TurnRole,
};
use crate::services::store::ChatStore;
use crate::services::usage::{UsageAdmission, UsageGate};
use crate::services::web_search::{WebSearch, WEB_SEARCH_TOOL};
use chrono::Utc;
use futures::StreamExt;
use serde_json::{json, Value};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a legal assistant specialised in the law of Ukraine.

Answer in Ukrainian only, whatever language the question is asked in.
Be precise and structured. Cite the specific article, part and paragraph of the
code or law you rely on, with its full official name. When you use a legal term
that a layperson may not know, explain it briefly in parentheses.

When the webSearch tool is available, use it to confirm the current wording of
a law, recent amendments and the positions of the Supreme Court or the
Constitutional Court before you answer. Prefer official sources such as
zakon.rada.gov.ua and reyestr.court.gov.ua. If the sources disagree or you
cannot confirm the current state of the law, say so plainly.

You provide legal information, not representation. For disputes with real
stakes, recommend consulting a practising lawyer (адвокат)."#;

/// The built-in system prompt, dated so the model can judge recency.
pub fn default_system_prompt() -> String {
    format!(
        "Today is {}.\n\n{}",
        Utc::now().format("%d.%m.%Y"),
        DEFAULT_SYSTEM_PROMPT
    )
}

/// A validated chat request.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub messages: Vec<UiMessage>,
    pub chat_id: String,
    pub user_id: String,
    pub model: String,
    pub is_authenticated: bool,
    pub system_prompt: Option<String>,
    pub enable_search: bool,
    pub message_group_id: Option<String>,
    /// `x-request-id` as sent by the client. Generated ids are not carried.
    pub request_id: Option<String>,
}

impl ChatTurn {
    /// Usage commit key: the client's request id, else the message group.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.request_id
            .as_deref()
            .or(self.message_group_id.as_deref())
    }
}

/// A turn that passed every pre-stream check.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub turn: ChatTurn,
    pub model: ModelConfig,
    pub admission: UsageAdmission,
    api_key: Option<String>,
}

/// Why a running turn stopped early.
#[derive(Debug)]
enum TurnFailure {
    Disconnected,
    Provider(ProviderError),
}

impl From<ProviderError> for TurnFailure {
    fn from(err: ProviderError) -> Self {
        TurnFailure::Provider(err)
    }
}

/// What a successful turn produced.
struct TurnOutput {
    text: String,
    parts: Vec<MessagePart>,
    finish_reason: FinishReason,
    usage: TokenUsage,
}

#[derive(Clone)]
pub struct ChatOrchestrator {
    store: Arc<dyn ChatStore>,
    catalog: Arc<ModelCatalog>,
    usage: UsageGate,
    provider: Arc<dyn ChatProvider>,
    credentials: CredentialResolver,
    web_search: WebSearch,
    default_model: String,
    max_steps: usize,
}

impl ChatOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ChatStore>,
        catalog: Arc<ModelCatalog>,
        usage: UsageGate,
        provider: Arc<dyn ChatProvider>,
        credentials: CredentialResolver,
        web_search: WebSearch,
        default_model: &str,
        max_steps: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            usage,
            provider,
            credentials,
            web_search,
            default_model: default_model.to_string(),
            max_steps: max_steps.max(1),
        }
    }

    pub async fn prepare(&self, mut turn: ChatTurn) -> Result<PreparedTurn, AppError> {
        if turn.messages.is_empty() || turn.chat_id.is_empty() || turn.user_id.is_empty() {
            return Err(ChatError::MissingInformation.into());
        }
        if turn.model.is_empty() {
            turn.model = self.default_model.clone();
        }

        let model = self
            .catalog
            .find(&turn.model)
            .ok_or_else(|| ChatError::ModelNotFound(turn.model.clone()))?;

        self.usage
            .ensure_model_allowed(&model, turn.is_authenticated)?;
        let admission = self
            .usage
            .check(&turn.user_id, turn.is_authenticated, model.tier)
            .await?;

        if let Some(last) = turn.messages.last().filter(|m| m.role == Role::User) {
            let message = ChatMessage::user(
                &turn.chat_id,
                &turn.user_id,
                last.text(),
                last.experimental_attachments.clone(),
                &model.id,
                turn.message_group_id.clone(),
            );
            self.store.append_message(&message).await?;
        }

        let api_key = self.credentials.resolve(&turn.user_id, &model.provider);
        if api_key.is_none() {
            tracing::warn!(provider = %model.provider, "No API key configured for provider");
        }

        tracing::info!(
            chat_id = %turn.chat_id,
            user_id = %turn.user_id,
            model = %model.id,
            search = turn.enable_search,
            remaining = admission.remaining,
            "Chat turn admitted"
        );

        Ok(PreparedTurn {
            turn,
            model,
            admission,
            api_key,
        })
    }

    /// Stream the turn. Dropping the returned stream cancels it.
    pub fn start(&self, prepared: PreparedTurn) -> ReceiverStream<String> {
        let (tx, rx) = mpsc::channel(64);
        let this = self.clone();

        tokio::spawn(async move {
            this.run(prepared, tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn run(&self, prepared: PreparedTurn, tx: mpsc::Sender<String>) {
        let model_id = prepared.model.id.clone();

        match self.generate(&prepared, &tx).await {
            Ok(output) => {
                self.finish(&prepared, output, &tx).await;
                metrics::record_chat_turn(&model_id, "completed");
            }
            Err(TurnFailure::Disconnected) => {
                tracing::info!(
                    chat_id = %prepared.turn.chat_id,
                    "Client disconnected; turn abandoned"
                );
                metrics::record_chat_turn(&model_id, "aborted");
            }
            Err(TurnFailure::Provider(err)) => {
                tracing::error!(
                    error = %err,
                    chat_id = %prepared.turn.chat_id,
                    model = %model_id,
                    "Chat turn failed"
                );
                metrics::record_provider_error(self.provider.name(), err.kind());
                metrics::record_chat_turn(&model_id, "failed");
                let _ = emit(&tx, StreamPart::Error(friendly_error_message(&err))).await;
            }
        }
    }

    /// Persist the reply, commit usage and close the message.
    async fn finish(&self, prepared: &PreparedTurn, output: TurnOutput, tx: &mpsc::Sender<String>) {
        let turn = &prepared.turn;
        let reply = ChatMessage::assistant(
            &turn.chat_id,
            output.text,
            output.parts,
            &prepared.model.id,
            turn.message_group_id.clone(),
        );
        if let Err(e) = self.store.append_message(&reply).await {
            tracing::error!(error = %e, chat_id = %turn.chat_id, "Failed to store assistant message");
        }

        if let Err(e) = self
            .usage
            .commit(&prepared.admission, turn.idempotency_key())
            .await
        {
            tracing::error!(error = %e, user_id = %turn.user_id, "Failed to commit usage");
        }

        metrics::record_tokens(
            &prepared.model.id,
            output.usage.prompt_tokens,
            output.usage.completion_tokens,
        );

        let _ = emit(
            tx,
            StreamPart::FinishMessage {
                finish_reason: output.finish_reason,
                usage: output.usage,
            },
        )
        .await;
    }

    async fn generate(
        &self,
        prepared: &PreparedTurn,
        tx: &mpsc::Sender<String>,
    ) -> Result<TurnOutput, TurnFailure> {
        let turn = &prepared.turn;
        let model = &prepared.model;
        let api_key = prepared.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("no API key for provider {}", model.provider))
        })?;

        let tools: Vec<ToolDeclaration> = if turn.enable_search && model.tools {
            vec![WebSearch::declaration()]
        } else {
            Vec::new()
        };
        let system_prompt = turn
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(default_system_prompt);

        let history = clean_messages_for_tools(&turn.messages, !tools.is_empty());
        let mut turns = to_provider_turns(&history);

        let message_id = format!("msg-{}", Uuid::new_v4().simple());
        let mut output = TurnOutput {
            text: String::new(),
            parts: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        };

        for step in 0..self.max_steps {
            emit(
                tx,
                StreamPart::StartStep {
                    message_id: message_id.clone(),
                },
            )
            .await?;
            output.parts.push(MessagePart::StepStart);

            let request = ChatRequest {
                model: model.provider_id.clone(),
                system_prompt: system_prompt.clone(),
                turns: turns.clone(),
                tools: tools.clone(),
                generation: model.defaults.clone(),
            };

            let started = Instant::now();
            let mut stream = self.provider.stream_chat(api_key, request).await?;

            let mut step_text = String::new();
            let mut step_reasoning = String::new();
            let mut calls: Vec<(String, String, Value)> = Vec::new();
            let mut step_usage = TokenUsage::default();
            let mut finish_reason = FinishReason::Stop;

            while let Some(chunk) = stream.next().await {
                match chunk? {
                    StreamChunk::Text(text) => {
                        emit(tx, StreamPart::Text(text.clone())).await?;
                        step_text.push_str(&text);
                    }
                    StreamChunk::Reasoning(text) => {
                        emit(tx, StreamPart::Reasoning(text.clone())).await?;
                        step_reasoning.push_str(&text);
                    }
                    StreamChunk::ToolCall { id, name, args } => {
                        emit(
                            tx,
                            StreamPart::ToolCall {
                                tool_call_id: id.clone(),
                                tool_name: name.clone(),
                                args: args.clone(),
                            },
                        )
                        .await?;
                        calls.push((id, name, args));
                    }
                    StreamChunk::Complete {
                        input_tokens,
                        output_tokens,
                        finish_reason: reason,
                    } => {
                        step_usage = TokenUsage {
                            prompt_tokens: input_tokens,
                            completion_tokens: output_tokens,
                        };
                        finish_reason = reason;
                    }
                }
            }
            metrics::record_provider_latency(
                self.provider.name(),
                &model.provider_id,
                started.elapsed().as_secs_f64(),
            );

            if !step_reasoning.is_empty() {
                output.parts.push(MessagePart::Reasoning {
                    reasoning: step_reasoning,
                });
            }
            if !step_text.is_empty() {
                output.parts.push(MessagePart::Text {
                    text: step_text.clone(),
                });
                output.text.push_str(&step_text);
            }

            let mut model_parts = Vec::new();
            if !step_text.is_empty() {
                model_parts.push(TurnPart::Text(step_text));
            }
            let mut results = Vec::new();

            for (id, name, args) in calls {
                let result = self.execute_tool(prepared, &name, &args).await;
                emit(
                    tx,
                    StreamPart::ToolResult {
                        tool_call_id: id.clone(),
                        result: result.clone(),
                    },
                )
                .await?;

                for source in url_sources(&result) {
                    emit(tx, StreamPart::Source(source.clone())).await?;
                    output.parts.push(MessagePart::Source { source });
                }

                output.parts.push(MessagePart::ToolInvocation {
                    tool_invocation: ToolInvocation {
                        state: ToolInvocationState::Result,
                        tool_call_id: id.clone(),
                        tool_name: name.clone(),
                        args: args.clone(),
                        result: Some(result.clone()),
                    },
                });
                model_parts.push(TurnPart::ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    args,
                });
                results.push(TurnPart::ToolResult { id, name, result });
            }

            output.usage.add(step_usage);
            output.finish_reason = finish_reason;
            emit(
                tx,
                StreamPart::FinishStep {
                    finish_reason,
                    usage: step_usage,
                    is_continued: false,
                },
            )
            .await?;

            if results.is_empty() {
                break;
            }
            if step + 1 == self.max_steps {
                tracing::warn!(
                    chat_id = %turn.chat_id,
                    max_steps = self.max_steps,
                    "Step limit reached with pending tool calls"
                );
                break;
            }

            turns.push(Turn {
                role: TurnRole::Model,
                parts: model_parts,
            });
            turns.push(Turn {
                role: TurnRole::User,
                parts: results,
            });
        }

        Ok(output)
    }

    async fn execute_tool(&self, prepared: &PreparedTurn, name: &str, args: &Value) -> Value {
        if name != WEB_SEARCH_TOOL {
            tracing::warn!(tool = %name, "Model called an unknown tool");
            return json!({ "error": format!("Unknown tool: {}", name) });
        }
        let output = self
            .web_search
            .execute(prepared.api_key.as_deref(), args)
            .await;
        serde_json::to_value(output).unwrap_or_else(|_| json!({ "sources": [] }))
    }
}

async fn emit(tx: &mpsc::Sender<String>, part: StreamPart) -> Result<(), TurnFailure> {
    tx.send(part.encode())
        .await
        .map_err(|_| TurnFailure::Disconnected)
}

/// Citations in a web search result, as UI source parts.
fn url_sources(result: &Value) -> Vec<UrlSource> {
    result
        .get("sources")
        .and_then(Value::as_array)
        .map(|sources| {
            sources
                .iter()
                .filter_map(|s| {
                    let url = s.get("url").and_then(Value::as_str)?;
                    Some(UrlSource {
                        source_type: "url".to_string(),
                        id: Uuid::new_v4().to_string(),
                        url: url.to_string(),
                        title: s.get("title").and_then(Value::as_str).map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Without tools the provider rejects tool history, so tool messages and
/// tool parts are stripped and messages left empty are dropped.
pub fn clean_messages_for_tools(messages: &[UiMessage], has_tools: bool) -> Vec<UiMessage> {
    if has_tools {
        return messages.to_vec();
    }

    messages
        .iter()
        .filter(|m| m.role != Role::Tool)
        .filter_map(|m| {
            if !m.has_tool_content() {
                return Some(m.clone());
            }
            let text = m.text();
            if text.trim().is_empty() && m.experimental_attachments.is_empty() {
                return None;
            }
            let mut cleaned = UiMessage::new(m.role, &text);
            cleaned.id = m.id.clone();
            cleaned.parts = m
                .parts
                .iter()
                .filter(|p| !p.is_tool_invocation())
                .cloned()
                .collect();
            cleaned.experimental_attachments = m.experimental_attachments.clone();
            Some(cleaned)
        })
        .collect()
}

fn attachment_note(message: &UiMessage) -> Option<String> {
    if message.experimental_attachments.is_empty() {
        return None;
    }
    let listed: Vec<String> = message
        .experimental_attachments
        .iter()
        .map(|a| match &a.name {
            Some(name) => format!("{} ({})", name, a.url),
            None => a.url.clone(),
        })
        .collect();
    Some(format!("Attached files: {}", listed.join(", ")))
}

/// Map UI history to provider turns. Completed tool invocations become a
/// call turn followed by a result turn; system and data messages are skipped.
pub fn to_provider_turns(messages: &[UiMessage]) -> Vec<Turn> {
    let mut turns = Vec::new();

    for message in messages {
        match message.role {
            Role::User => {
                let mut parts = Vec::new();
                let text = message.text();
                if !text.is_empty() {
                    parts.push(TurnPart::Text(text));
                }
                if let Some(note) = attachment_note(message) {
                    parts.push(TurnPart::Text(note));
                }
                if !parts.is_empty() {
                    turns.push(Turn {
                        role: TurnRole::User,
                        parts,
                    });
                }
            }
            Role::Assistant => {
                let completed: Vec<&ToolInvocation> = message
                    .invocations()
                    .into_iter()
                    .filter(|t| t.state == ToolInvocationState::Result)
                    .collect();
                if !completed.is_empty() {
                    turns.push(Turn {
                        role: TurnRole::Model,
                        parts: completed
                            .iter()
                            .map(|t| TurnPart::ToolCall {
                                id: t.tool_call_id.clone(),
                                name: t.tool_name.clone(),
                                args: t.args.clone(),
                            })
                            .collect(),
                    });
                    turns.push(Turn {
                        role: TurnRole::User,
                        parts: completed
                            .iter()
                            .map(|t| TurnPart::ToolResult {
                                id: t.tool_call_id.clone(),
                                name: t.tool_name.clone(),
                                result: t.result.clone().unwrap_or(Value::Null),
                            })
                            .collect(),
                    });
                }
                let text = message.text();
                if !text.is_empty() {
                    turns.push(Turn::model_text(text));
                }
            }
            Role::System | Role::Data | Role::Tool => {}
        }
    }

    turns
}

/// User-facing text for a provider failure. Details stay in the server log.
pub fn friendly_error_message(err: &ProviderError) -> String {
    if matches!(err, ProviderError::NotConfigured(_)) {
        return "The AI provider is not configured on this server.".to_string();
    }

    let text = err.to_string().to_lowercase();
    let auth = matches!(err, ProviderError::Unauthorized(_))
        || text.contains("api key")
        || text.contains("authentication");
    let rate_limited = matches!(err, ProviderError::RateLimited)
        || text.contains("rate limit")
        || text.contains("quota");

    if auth {
        "Invalid API key or authentication failed. Please contact support.".to_string()
    } else if rate_limited {
        "Rate limit exceeded. Please try again in a few minutes.".to_string()
    } else {
        "Something went wrong while generating the answer. Please try again.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_content_is_stripped_when_tools_disabled() {
        let mut assistant = UiMessage::new(Role::Assistant, "Ось що я знайшов");
        assistant.tool_invocations.push(ToolInvocation {
            state: ToolInvocationState::Result,
            tool_call_id: "c1".to_string(),
            tool_name: WEB_SEARCH_TOOL.to_string(),
            args: json!({"query": "оренда"}),
            result: Some(json!({"sources": []})),
        });
        let messages = vec![
            UiMessage::new(Role::User, "Питання"),
            assistant,
            UiMessage::new(Role::Tool, "..."),
        ];

        let cleaned = clean_messages_for_tools(&messages, false);

        assert_eq!(cleaned.len(), 2);
        assert!(!cleaned[1].has_tool_content());
        assert_eq!(cleaned[1].text(), "Ось що я знайшов");
        assert_eq!(clean_messages_for_tools(&messages, true).len(), 3);
    }

    #[test]
    fn completed_invocations_become_call_and_result_turns() {
        let mut assistant = UiMessage::new(Role::Assistant, "Відповідь");
        assistant.tool_invocations.push(ToolInvocation {
            state: ToolInvocationState::Result,
            tool_call_id: "c1".to_string(),
            tool_name: WEB_SEARCH_TOOL.to_string(),
            args: json!({"query": "оренда"}),
            result: Some(json!({"sources": []})),
        });
        let messages = vec![
            UiMessage::new(Role::System, "ignored"),
            UiMessage::new(Role::User, "Питання"),
            assistant,
        ];

        let turns = to_provider_turns(&messages);

        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0], Turn::user_text("Питання"));
        assert!(matches!(turns[1].parts[0], TurnPart::ToolCall { .. }));
        assert_eq!(turns[2].role, TurnRole::User);
        assert!(matches!(turns[2].parts[0], TurnPart::ToolResult { .. }));
        assert_eq!(turns[3], Turn::model_text("Відповідь"));
    }

    #[test]
    fn provider_errors_map_to_friendly_messages() {
        assert!(friendly_error_message(&ProviderError::Unauthorized("bad".into()))
            .starts_with("Invalid API key"));
        assert!(friendly_error_message(&ProviderError::ApiError(
            "authentication_error".into()
        ))
        .starts_with("Invalid API key"));
        assert!(friendly_error_message(&ProviderError::RateLimited).starts_with("Rate limit"));
        assert!(
            friendly_error_message(&ProviderError::ApiError("quota exhausted".into()))
                .starts_with("Rate limit")
        );
        assert!(friendly_error_message(&ProviderError::NetworkError("reset".into()))
            .starts_with("Something went wrong"));
    }

    #[test]
    fn sources_are_read_from_tool_results() {
        let result = json!({"sources": [
            {"title": "Zakon", "url": "https://zakon.rada.gov.ua", "snippet": ""},
            {"title": "Broken"}
        ]});

        let sources = url_sources(&result);

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://zakon.rada.gov.ua");
        assert_eq!(sources[0].source_type, "url");
    }

    #[test]
    fn default_prompt_is_dated() {
        assert!(default_system_prompt().starts_with("Today is "));
    }
}
