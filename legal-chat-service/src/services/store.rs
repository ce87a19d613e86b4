//! Persistence seam. `ChatDb` talks to MongoDB; `MemoryStore` keeps
//! everything in process for tests and database-less deployments.

use crate::models::{Chat, ChatMessage, UsageCounter, UserPreferences, UserProfile};
use async_trait::async_trait;
use service_core::error::AppError;

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // Usage counters
    async fn get_usage(&self, user_id: &str) -> Result<Option<UsageCounter>, AppError>;
    /// Last write wins.
    async fn save_usage(&self, counter: &UsageCounter) -> Result<(), AppError>;

    // Chats and messages
    async fn insert_chat(&self, chat: &Chat) -> Result<(), AppError>;
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError>;
    /// Returns false when the chat does not exist.
    async fn update_chat_model(&self, chat_id: &str, model: &str) -> Result<bool, AppError>;
    async fn append_message(&self, message: &ChatMessage) -> Result<(), AppError>;
    /// Messages in insertion order.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, AppError>;

    // Users
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;
    /// Inserts `user` unless a row with the same id exists; returns the stored row.
    async fn insert_user_if_absent(&self, user: &UserProfile) -> Result<UserProfile, AppError>;
    /// Returns false when the user does not exist.
    async fn set_favorite_models(&self, user_id: &str, models: &[String])
        -> Result<bool, AppError>;

    // Preferences
    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>, AppError>;
    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), AppError>;
}
