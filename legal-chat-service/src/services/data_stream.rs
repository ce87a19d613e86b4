//! Encoder for the AI SDK data stream protocol.
//!
//! Every part is one line: a type code, a colon, a JSON value and `\n`.

use crate::models::UrlSource;
use crate::services::providers::FinishReason;
use serde::Serialize;
use serde_json::{json, Value};

pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    StartStep {
        message_id: String,
    },
    Text(String),
    Reasoning(String),
    Source(UrlSource),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    FinishStep {
        finish_reason: FinishReason,
        usage: TokenUsage,
        is_continued: bool,
    },
    FinishMessage {
        finish_reason: FinishReason,
        usage: TokenUsage,
    },
    Error(String),
}

impl StreamPart {
    pub fn code(&self) -> char {
        match self {
            StreamPart::Text(_) => '0',
            StreamPart::Error(_) => '3',
            StreamPart::ToolCall { .. } => '9',
            StreamPart::ToolResult { .. } => 'a',
            StreamPart::FinishMessage { .. } => 'd',
            StreamPart::FinishStep { .. } => 'e',
            StreamPart::StartStep { .. } => 'f',
            StreamPart::Reasoning(_) => 'g',
            StreamPart::Source(_) => 'h',
        }
    }

    fn payload(&self) -> Value {
        match self {
            StreamPart::Text(text) | StreamPart::Reasoning(text) | StreamPart::Error(text) => {
                Value::String(text.clone())
            }
            StreamPart::StartStep { message_id } => json!({ "messageId": message_id }),
            StreamPart::Source(source) => json!(source),
            StreamPart::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => json!({
                "toolCallId": tool_call_id,
                "toolName": tool_name,
                "args": args,
            }),
            StreamPart::ToolResult {
                tool_call_id,
                result,
            } => json!({ "toolCallId": tool_call_id, "result": result }),
            StreamPart::FinishStep {
                finish_reason,
                usage,
                is_continued,
            } => json!({
                "finishReason": finish_reason.as_str(),
                "usage": usage,
                "isContinued": is_continued,
            }),
            StreamPart::FinishMessage {
                finish_reason,
                usage,
            } => json!({
                "finishReason": finish_reason.as_str(),
                "usage": usage,
            }),
        }
    }

    /// The complete protocol line, newline included.
    pub fn encode(&self) -> String {
        format!("{}:{}\n", self.code(), self.payload())
    }
}
