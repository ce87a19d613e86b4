pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod sources;
pub mod startup;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    request_id, security_headers_middleware, request_id_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ChatConfig;
use crate::middleware::{metrics_middleware, USER_ID_HEADER};
use crate::services::providers::ChatProvider;
use crate::services::{
    ChatOrchestrator, ChatStore, CredentialResolver, ModelCatalog, UsageGate, WebSearch,
};
use crate::sources::SourceExtractor;

#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub store: Arc<dyn ChatStore>,
    pub catalog: Arc<ModelCatalog>,
    pub usage: UsageGate,
    pub credentials: CredentialResolver,
    pub web_search: WebSearch,
    pub orchestrator: ChatOrchestrator,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services over a store and a model provider.
    pub fn new(config: ChatConfig, store: Arc<dyn ChatStore>, provider: Arc<dyn ChatProvider>) -> Self {
        let catalog = Arc::new(ModelCatalog::new(config.chat.model_cache_ttl()));
        let usage = UsageGate::new(store.clone(), config.limits);
        let credentials = CredentialResolver::new(&config.gemini.api_key);
        let web_search = WebSearch::new(
            provider.clone(),
            SourceExtractor::default(),
            &config.gemini.search_model,
        );
        let orchestrator = ChatOrchestrator::new(
            store.clone(),
            catalog.clone(),
            usage.clone(),
            provider,
            credentials.clone(),
            web_search.clone(),
            &config.chat.default_model,
            config.chat.max_steps,
        );

        Self {
            config,
            store,
            catalog,
            usage,
            credentials,
            web_search,
            orchestrator,
            started_at: Instant::now(),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    layer.allow_origin(
        origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                    None
                }
            })
            .collect::<Vec<HeaderValue>>(),
    )
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/search", get(handlers::search::search))
        .route(
            "/api/user-preferences",
            get(handlers::preferences::get_preferences).put(handlers::preferences::update_preferences),
        )
        .route(
            "/api/user-preferences/favorite-models",
            get(handlers::preferences::get_favorite_models)
                .post(handlers::preferences::set_favorite_models),
        )
        .route(
            "/api/models",
            get(handlers::models::list_models).post(handlers::models::refresh_models),
        )
        .route("/api/rate-limits", get(handlers::usage::rate_limits))
        .route("/api/create-chat", post(handlers::chats::create_chat))
        .route("/api/update-chat-model", post(handlers::chats::update_chat_model))
        .route("/api/create-guest", post(handlers::chats::create_guest))
        .route(
            "/api/chats/:chat_id/messages",
            get(handlers::chats::list_messages),
        )
        .route("/api/health", get(handlers::health::health_check));

    Router::new()
        .merge(api)
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request_id(request.headers()).unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.common.origins()))
}
