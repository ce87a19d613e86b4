pub mod catalog;
pub mod credentials;
pub mod data_stream;
pub mod database;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod usage;
pub mod web_search;

pub use catalog::ModelCatalog;
pub use credentials::CredentialResolver;
pub use database::ChatDb;
pub use error::ChatError;
pub use memory::MemoryStore;
pub use orchestrator::{ChatOrchestrator, ChatTurn};
pub use store::ChatStore;
pub use usage::UsageGate;
pub use web_search::WebSearch;
