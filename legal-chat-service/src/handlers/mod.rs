//! HTTP handlers for the legal chat service.

pub mod chat;
pub mod chats;
pub mod health;
pub mod metrics;
pub mod models;
pub mod preferences;
pub mod search;
pub mod usage;
