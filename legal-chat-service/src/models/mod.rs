//! Domain models for the legal chat service.

pub mod catalog;
pub mod chat;
pub mod usage;
pub mod user;

pub use catalog::{builtin_models, GenerationDefaults, ModelConfig, ModelTier};
pub use chat::{
    Attachment, Chat, ChatMessage, MessageContent, MessagePart, Role, ToolInvocation,
    ToolInvocationState, UiMessage, UrlSource,
};
pub use usage::UsageCounter;
pub use user::{PreferencesPatch, UserPreferences, UserProfile};
