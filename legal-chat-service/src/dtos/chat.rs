use crate::models::{Chat, ChatMessage, UiMessage, UserProfile};
use crate::services::{ChatError, ChatTurn};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /api/chat`. Every field is optional at the serde level so
/// that missing required fields produce the service's own 400 message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    #[serde(default)]
    pub messages: Option<Vec<UiMessage>>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub enable_search: bool,
    #[serde(default, rename = "message_group_id")]
    pub message_group_id: Option<String>,
}

impl ChatRequestBody {
    pub fn into_turn(self, request_id: Option<String>) -> Result<ChatTurn, ChatError> {
        let (Some(messages), Some(chat_id), Some(user_id)) = (
            self.messages.filter(|m| !m.is_empty()),
            self.chat_id.filter(|c| !c.is_empty()),
            self.user_id.filter(|u| !u.is_empty()),
        ) else {
            return Err(ChatError::MissingInformation);
        };

        Ok(ChatTurn {
            messages,
            chat_id,
            user_id,
            model: self.model.unwrap_or_default(),
            is_authenticated: self.is_authenticated,
            system_prompt: self.system_prompt,
            enable_search: self.enable_search,
            message_group_id: self.message_group_id,
            request_id,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: Chat,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChatModelRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "chatId is required"))]
    pub chat_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "model is required"))]
    pub model: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct GuestResponse {
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> ChatRequestBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn complete_body_becomes_turn() {
        let turn = body(json!({
            "messages": [{"role": "user", "content": "Привіт"}],
            "chatId": "c1",
            "userId": "u1",
            "model": "gemini-2.5-flash",
            "isAuthenticated": true,
            "enableSearch": true,
            "message_group_id": "g1"
        }))
        .into_turn(Some("req-1".to_string()))
        .unwrap();

        assert_eq!(turn.chat_id, "c1");
        assert!(turn.is_authenticated);
        assert_eq!(turn.message_group_id.as_deref(), Some("g1"));
        assert_eq!(turn.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        for value in [
            json!({}),
            json!({"chatId": "c1", "userId": "u1"}),
            json!({"messages": [], "chatId": "c1", "userId": "u1"}),
            json!({"messages": [{"role": "user", "content": "x"}], "userId": "u1"}),
            json!({"messages": [{"role": "user", "content": "x"}], "chatId": "c1", "userId": ""}),
        ] {
            assert!(matches!(
                body(value).into_turn(None),
                Err(ChatError::MissingInformation)
            ));
        }
    }
}
