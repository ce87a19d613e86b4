//! Chats and their append-only message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Data,
}

/// File attached to a user message by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    PartialCall,
    Call,
    Result,
}

/// A tool call and, once executed, its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub state: ToolInvocationState,
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSource {
    pub source_type: String,
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Structured message content in the chat UI's part format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        reasoning: String,
    },
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        tool_invocation: ToolInvocation,
    },
    Source {
        source: UrlSource,
    },
    StepStart,
    /// Part types this service does not interpret.
    #[serde(other)]
    Unknown,
}

impl MessagePart {
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, MessagePart::ToolInvocation { .. })
    }
}

/// Message content as sent by the chat UI: plain text, or a list of typed
/// content parts for messages produced by tool-using steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Concatenated text, ignoring non-text parts.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| p.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect(),
        }
    }

    fn has_tool_parts(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts.iter().any(|p| {
                p.get("type")
                    .and_then(|t| t.as_str())
                    .is_some_and(|t| t.starts_with("tool-"))
            }),
        }
    }
}

/// A message of the conversation history posted with each chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experimental_attachments: Vec<Attachment>,
}

impl UiMessage {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            id: None,
            role,
            content: MessageContent::Text(text.to_string()),
            parts: Vec::new(),
            tool_invocations: Vec::new(),
            experimental_attachments: Vec::new(),
        }
    }

    /// Text content, falling back to the text parts.
    pub fn text(&self) -> String {
        let text = self.content.text();
        if !text.is_empty() {
            return text;
        }
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_content(&self) -> bool {
        self.role == Role::Tool
            || !self.tool_invocations.is_empty()
            || self.parts.iter().any(MessagePart::is_tool_invocation)
            || self.content.has_tool_parts()
    }

    /// Tool invocations from either the legacy field or the parts list.
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        let mut found: Vec<&ToolInvocation> = self.tool_invocations.iter().collect();
        for part in &self.parts {
            if let MessagePart::ToolInvocation { tool_invocation } = part {
                if !found
                    .iter()
                    .any(|t| t.tool_call_id == tool_invocation.tool_call_id)
                {
                    found.push(tool_invocation);
                }
            }
        }
        found
    }
}

/// One entry in a chat's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,

    pub chat_id: String,

    /// Author for user messages; assistant replies carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub role: Role,

    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,

    /// Model that produced (or was asked to answer) the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Groups a user message with the replies it produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_group_id: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(
        chat_id: &str,
        user_id: &str,
        content: String,
        attachments: Vec<Attachment>,
        model: &str,
        message_group_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            user_id: Some(user_id.to_string()),
            role: Role::User,
            content,
            attachments,
            parts: Vec::new(),
            model: Some(model.to_string()),
            message_group_id,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(
        chat_id: &str,
        content: String,
        parts: Vec<MessagePart>,
        model: &str,
        message_group_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            user_id: None,
            role: Role::Assistant,
            content,
            attachments: Vec::new(),
            parts,
            model: Some(model.to_string()),
            message_group_id,
            created_at: Utc::now(),
        }
    }
}

/// Conversation header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub model: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(user_id: &str, title: &str, model: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            model: model.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
