//! MongoDB persistence for chats, messages, usage counters and user settings.

use super::store::ChatStore;
use crate::models::{Chat, ChatMessage, UsageCounter, UserPreferences, UserProfile};
use crate::services::metrics;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions, ReplaceOptions, UpdateOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Instant;

#[derive(Clone)]
pub struct ChatDb {
    client: MongoClient,
    db: Database,
}

fn db_error(
    operation: &'static str,
    collection: &'static str,
) -> impl FnOnce(mongodb::error::Error) -> AppError {
    move |e| {
        tracing::error!(operation, collection, error = %e, "MongoDB operation failed");
        metrics::record_db_error(operation, collection);
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    }
}

impl ChatDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for legal-chat-service");

        self.create_unique_index(&self.chats(), "id", "chat_id_idx").await?;
        self.create_index(&self.chats(), doc! { "user_id": 1 }, "chat_user_idx")
            .await?;
        self.create_index(
            &self.messages(),
            doc! { "chat_id": 1, "created_at": 1 },
            "message_chat_created_idx",
        )
        .await?;
        self.create_unique_index(&self.usage_counters(), "user_id", "usage_user_idx")
            .await?;
        self.create_unique_index(&self.users(), "id", "user_id_idx").await?;
        self.create_unique_index(&self.preferences(), "user_id", "preferences_user_idx")
            .await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    async fn create_unique_index<T>(
        &self,
        collection: &Collection<T>,
        field: &str,
        name: &str,
    ) -> Result<(), AppError>
    where
        T: Send + Sync,
    {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(
                IndexOptions::builder()
                    .name(name.to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        collection.create_index(index, None).await.map_err(|e| {
            tracing::error!("Failed to create {} index: {}", name, e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        Ok(())
    }

    async fn create_index<T>(
        &self,
        collection: &Collection<T>,
        keys: Document,
        name: &str,
    ) -> Result<(), AppError>
    where
        T: Send + Sync,
    {
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().name(name.to_string()).build())
            .build();

        collection.create_index(index, None).await.map_err(|e| {
            tracing::error!("Failed to create {} index: {}", name, e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        Ok(())
    }

    // Collection accessors

    pub fn chats(&self) -> Collection<Chat> {
        self.db.collection("chats")
    }

    pub fn messages(&self) -> Collection<ChatMessage> {
        self.db.collection("messages")
    }

    pub fn usage_counters(&self) -> Collection<UsageCounter> {
        self.db.collection("usage_counters")
    }

    pub fn users(&self) -> Collection<UserProfile> {
        self.db.collection("users")
    }

    pub fn preferences(&self) -> Collection<UserPreferences> {
        self.db.collection("user_preferences")
    }
}

#[async_trait]
impl ChatStore for ChatDb {
    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    async fn get_usage(&self, user_id: &str) -> Result<Option<UsageCounter>, AppError> {
        let start = Instant::now();
        let counter = self
            .usage_counters()
            .find_one(doc! { "user_id": user_id }, None)
            .await
            .map_err(db_error("find_one", "usage_counters"))?;
        metrics::record_db_operation("find_one", "usage_counters", start.elapsed().as_secs_f64());
        Ok(counter)
    }

    async fn save_usage(&self, counter: &UsageCounter) -> Result<(), AppError> {
        let start = Instant::now();
        self.usage_counters()
            .replace_one(
                doc! { "user_id": counter.user_id.as_str() },
                counter,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(db_error("replace_one", "usage_counters"))?;
        metrics::record_db_operation("replace_one", "usage_counters", start.elapsed().as_secs_f64());
        Ok(())
    }

    async fn insert_chat(&self, chat: &Chat) -> Result<(), AppError> {
        self.chats()
            .insert_one(chat, None)
            .await
            .map_err(db_error("insert_one", "chats"))?;
        Ok(())
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError> {
        self.chats()
            .find_one(doc! { "id": chat_id }, None)
            .await
            .map_err(db_error("find_one", "chats"))
    }

    async fn update_chat_model(&self, chat_id: &str, model: &str) -> Result<bool, AppError> {
        let result = self
            .chats()
            .update_one(
                doc! { "id": chat_id },
                doc! {
                    "$set": {
                        "model": model,
                        "updated_at": Utc::now().timestamp_millis()
                    }
                },
                None,
            )
            .await
            .map_err(db_error("update_one", "chats"))?;
        Ok(result.matched_count > 0)
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        let start = Instant::now();
        self.messages()
            .insert_one(message, None)
            .await
            .map_err(db_error("insert_one", "messages"))?;
        metrics::record_db_operation("insert_one", "messages", start.elapsed().as_secs_f64());
        Ok(())
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let cursor = self
            .messages()
            .find(doc! { "chat_id": chat_id }, options)
            .await
            .map_err(db_error("find", "messages"))?;
        cursor
            .try_collect()
            .await
            .map_err(db_error("find", "messages"))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.users()
            .find_one(doc! { "id": user_id }, None)
            .await
            .map_err(db_error("find_one", "users"))
    }

    async fn insert_user_if_absent(&self, user: &UserProfile) -> Result<UserProfile, AppError> {
        let user_doc = mongodb::bson::to_document(user).map_err(|e| {
            tracing::error!("Failed to serialize user: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;

        self.users()
            .update_one(
                doc! { "id": user.id.as_str() },
                doc! { "$setOnInsert": user_doc },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(db_error("update_one", "users"))?;

        let stored = self.get_user(&user.id).await?;
        Ok(stored.unwrap_or_else(|| user.clone()))
    }

    async fn set_favorite_models(
        &self,
        user_id: &str,
        models: &[String],
    ) -> Result<bool, AppError> {
        let result = self
            .users()
            .update_one(
                doc! { "id": user_id },
                doc! { "$set": { "favorite_models": models.to_vec() } },
                None,
            )
            .await
            .map_err(db_error("update_one", "users"))?;
        Ok(result.matched_count > 0)
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>, AppError> {
        self.preferences()
            .find_one(doc! { "user_id": user_id }, None)
            .await
            .map_err(db_error("find_one", "user_preferences"))
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), AppError> {
        self.preferences()
            .replace_one(
                doc! { "user_id": prefs.user_id.as_str() },
                prefs,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(db_error("replace_one", "user_preferences"))?;
        Ok(())
    }
}
