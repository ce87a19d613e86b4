//! TTL-cached model catalog owned by the application state.

use crate::models::{builtin_models, ModelConfig};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Catalog entry as listed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    #[serde(flatten)]
    pub model: ModelConfig,
    pub accessible: bool,
}

struct CacheEntry {
    models: Arc<Vec<ModelConfig>>,
    expires_at: Instant,
}

type Loader = dyn Fn() -> Vec<ModelConfig> + Send + Sync;

pub struct ModelCatalog {
    ttl: Duration,
    loader: Box<Loader>,
    entry: RwLock<Option<CacheEntry>>,
}

impl ModelCatalog {
    /// Catalog over the built-in Gemini models.
    pub fn new(ttl: Duration) -> Self {
        Self::with_loader(ttl, builtin_models)
    }

    pub fn with_loader<F>(ttl: Duration, loader: F) -> Self
    where
        F: Fn() -> Vec<ModelConfig> + Send + Sync + 'static,
    {
        Self {
            ttl,
            loader: Box::new(loader),
            entry: RwLock::new(None),
        }
    }

    /// All models, rebuilding the cache when it has expired.
    pub fn all(&self) -> Arc<Vec<ModelConfig>> {
        let now = Instant::now();

        if let Ok(guard) = self.entry.read() {
            if let Some(entry) = guard.as_ref().filter(|e| e.expires_at > now) {
                return Arc::clone(&entry.models);
            }
        }

        let models = Arc::new((self.loader)());
        tracing::debug!(count = models.len(), "Model catalog cache rebuilt");

        match self.entry.write() {
            Ok(mut guard) => {
                *guard = Some(CacheEntry {
                    models: Arc::clone(&models),
                    expires_at: now + self.ttl,
                });
            }
            Err(_) => tracing::warn!("Model catalog lock poisoned; serving uncached list"),
        }
        models
    }

    pub fn find(&self, model_id: &str) -> Option<ModelConfig> {
        self.all().iter().find(|m| m.id == model_id).cloned()
    }

    /// Drop the cached entry and reload.
    pub fn refresh(&self) -> Arc<Vec<ModelConfig>> {
        if let Ok(mut guard) = self.entry.write() {
            *guard = None;
        }
        tracing::info!("Model catalog cache refreshed");
        self.all()
    }

    /// Every model is accessible while user-supplied keys are disabled.
    pub fn with_access_flags(&self) -> Vec<ModelListing> {
        self.all()
            .iter()
            .cloned()
            .map(|model| ModelListing {
                model,
                accessible: true,
            })
            .collect()
    }
}
