use crate::dtos::chat::{
    ChatResponse, CreateChatRequest, CreateGuestRequest, GuestResponse, MessagesResponse,
    UpdateChatModelRequest,
};
use crate::dtos::SuccessResponse;
use crate::middleware::UserId;
use crate::models::{Chat, UserProfile};
use crate::services::ChatError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// `POST /api/create-chat`
pub async fn create_chat(
    State(state): State<AppState>,
    Json(payload): Json<CreateChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    payload.validate()?;

    let model = payload
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.config.chat.default_model.clone());
    let title = payload
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string());

    let chat = Chat::new(&payload.user_id, &title, &model);
    state.store.insert_chat(&chat).await?;

    tracing::info!(
        chat_id = %chat.id,
        user_id = %chat.user_id,
        authenticated = payload.is_authenticated,
        "Chat created"
    );

    Ok(Json(ChatResponse { chat }))
}

/// `POST /api/update-chat-model`
pub async fn update_chat_model(
    State(state): State<AppState>,
    Json(payload): Json<UpdateChatModelRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    payload.validate()?;

    if !state
        .store
        .update_chat_model(&payload.chat_id, &payload.model)
        .await?
    {
        return Err(ChatError::ChatNotFound(payload.chat_id).into());
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// `POST /api/create-guest`: idempotent; an existing user is returned as is.
pub async fn create_guest(
    State(state): State<AppState>,
    Json(payload): Json<CreateGuestRequest>,
) -> Result<Json<GuestResponse>, AppError> {
    payload.validate()?;

    let guest = UserProfile::guest(&payload.user_id, &state.config.chat.default_model);
    let user = state.store.insert_user_if_absent(&guest).await?;

    Ok(Json(GuestResponse { user }))
}

/// `GET /api/chats/:chat_id/messages`: only the chat's owner sees it; any
/// other caller gets the same 404 as for a missing chat.
pub async fn list_messages(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(chat_id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let owned = state
        .store
        .get_chat(&chat_id)
        .await?
        .is_some_and(|chat| chat.user_id == user_id);
    if !owned {
        return Err(ChatError::ChatNotFound(chat_id).into());
    }

    let messages = state.store.list_messages(&chat_id).await?;
    Ok(Json(MessagesResponse { messages }))
}
