use crate::config::ChatConfig;
use crate::services::providers::gemini::{GeminiConfig, GeminiProvider};
use crate::services::providers::ChatProvider;
use crate::services::{ChatDb, ChatStore, MemoryStore};
use crate::{build_router, AppState};
use service_core::error::AppError;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let store: Arc<dyn ChatStore> = match &config.mongodb {
            Some(mongo) => {
                let db = ChatDb::connect(&mongo.uri, &mongo.database)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to MongoDB: {}", e);
                        e
                    })?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Arc::new(db)
            }
            None => {
                tracing::warn!("MONGODB_URI not set, keeping chats and usage in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let provider = GeminiProvider::new(GeminiConfig {
            api_base: config.gemini.api_base.clone(),
            request_timeout: config.gemini.request_timeout(),
        })
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Gemini client: {}", e)))?;
        let provider: Arc<dyn ChatProvider> = Arc::new(provider);

        if config.gemini.api_key.is_empty() {
            tracing::warn!("No Gemini API key configured; chat and search will report it");
        }

        Self::with_state(AppState::new(config, store, provider)).await
    }

    /// Bind and serve an already wired state. Tests use this to swap in a
    /// scripted provider.
    pub async fn with_state(state: AppState) -> Result<Self, AppError> {
        let addr = format!("{}:{}", state.config.common.host, state.config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            service = %state.config.service_name,
            default_model = %state.config.chat.default_model,
            "Listening on {}",
            port
        );

        let app = build_router(state.clone());
        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
