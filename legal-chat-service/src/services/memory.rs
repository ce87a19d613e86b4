use super::store::ChatStore;
use crate::models::{Chat, ChatMessage, UsageCounter, UserPreferences, UserProfile};
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    usage: HashMap<String, UsageCounter>,
    chats: HashMap<String, Chat>,
    messages: Vec<ChatMessage>,
    users: HashMap<String, UserProfile>,
    preferences: HashMap<String, UserPreferences>,
}

/// In-process store used when no MongoDB URI is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::DatabaseError(anyhow::anyhow!("memory store lock poisoned")))
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn get_usage(&self, user_id: &str) -> Result<Option<UsageCounter>, AppError> {
        Ok(self.lock()?.usage.get(user_id).cloned())
    }

    async fn save_usage(&self, counter: &UsageCounter) -> Result<(), AppError> {
        self.lock()?
            .usage
            .insert(counter.user_id.clone(), counter.clone());
        Ok(())
    }

    async fn insert_chat(&self, chat: &Chat) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if tables.chats.contains_key(&chat.id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Chat {} already exists",
                chat.id
            )));
        }
        tables.chats.insert(chat.id.clone(), chat.clone());
        Ok(())
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError> {
        Ok(self.lock()?.chats.get(chat_id).cloned())
    }

    async fn update_chat_model(&self, chat_id: &str, model: &str) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        match tables.chats.get_mut(chat_id) {
            Some(chat) => {
                chat.model = model.to_string();
                chat.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        self.lock()?.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    async fn insert_user_if_absent(&self, user: &UserProfile) -> Result<UserProfile, AppError> {
        Ok(self
            .lock()?
            .users
            .entry(user.id.clone())
            .or_insert_with(|| user.clone())
            .clone())
    }

    async fn set_favorite_models(
        &self,
        user_id: &str,
        models: &[String],
    ) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        match tables.users.get_mut(user_id) {
            Some(user) => {
                user.favorite_models = models.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>, AppError> {
        Ok(self.lock()?.preferences.get(user_id).cloned())
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), AppError> {
        self.lock()?
            .preferences
            .insert(prefs.user_id.clone(), prefs.clone());
        Ok(())
    }
}
