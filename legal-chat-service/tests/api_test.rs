mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, body_string, TestApp};
use legal_chat_service::services::metrics::init_metrics;
use legal_chat_service::services::providers::mock::MockProvider;
use legal_chat_service::services::ChatStore;
use serde_json::json;

#[tokio::test]
async fn health_reports_service_and_uptime() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "legal-chat-service");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn ready_when_store_answers() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    init_metrics();
    let app = TestApp::new(MockProvider::new());
    let _ = app.get("/api/models").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("http_requests_total"));
}

#[tokio::test]
async fn rate_limits_start_at_the_anonymous_ceiling() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .get("/api/rate-limits?userId=user-1&isAuthenticated=false")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dailyCount"], 0);
    assert_eq!(body["dailyLimit"], 5);
    assert_eq!(body["remaining"], 5);
    assert_eq!(body["remainingPro"], 150);
}

#[tokio::test]
async fn rate_limits_use_the_authenticated_ceiling() {
    let app = TestApp::new(MockProvider::new());

    let body = body_json(
        app.get("/api/rate-limits?userId=user-2&isAuthenticated=true")
            .await,
    )
    .await;

    assert_eq!(body["dailyLimit"], 100);
}

#[tokio::test]
async fn rate_limits_require_a_user() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/api/rate-limits").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn models_are_listed_with_access_flags() {
    let app = TestApp::new(MockProvider::new());

    let body = body_json(app.get("/api/models").await).await;

    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["id"], "gemini-2.5-flash");
    assert_eq!(models[0]["accessible"], true);
    assert_eq!(models[1]["tier"], "pro");
}

#[tokio::test]
async fn models_refresh_returns_fresh_list() {
    let app = TestApp::new(MockProvider::new());

    let response = app.post_json("/api/models", json!({})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Models cache refreshed");
    assert_eq!(body["models"].as_array().unwrap().len(), 2);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn create_chat_defaults_title_and_model() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .post_json("/api/create-chat", json!({ "userId": "user-1" }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["chat"]["title"], "New Chat");
    assert_eq!(body["chat"]["model"], "gemini-2.5-flash");

    let chat_id = body["chat"]["id"].as_str().unwrap();
    assert!(app.store.get_chat(chat_id).await.unwrap().is_some());
}

#[tokio::test]
async fn create_chat_requires_user() {
    let app = TestApp::new(MockProvider::new());

    let response = app.post_json("/api/create-chat", json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_chat_model_switches_existing_chat() {
    let app = TestApp::new(MockProvider::new());
    let created = body_json(
        app.post_json("/api/create-chat", json!({ "userId": "user-1" }))
            .await,
    )
    .await;
    let chat_id = created["chat"]["id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            "/api/update-chat-model",
            json!({ "chatId": chat_id, "model": "gemini-2.5-pro" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
    let chat = app.store.get_chat(&chat_id).await.unwrap().unwrap();
    assert_eq!(chat.model, "gemini-2.5-pro");
}

#[tokio::test]
async fn update_chat_model_for_missing_chat_is_not_found() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .post_json(
            "/api/update-chat-model",
            json!({ "chatId": "missing", "model": "gemini-2.5-pro" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_guest_is_idempotent() {
    let app = TestApp::new(MockProvider::new());

    let first = body_json(
        app.post_json("/api/create-guest", json!({ "userId": "guest-1" }))
            .await,
    )
    .await;
    let second = body_json(
        app.post_json("/api/create-guest", json!({ "userId": "guest-1" }))
            .await,
    )
    .await;

    assert_eq!(first["user"]["id"], "guest-1");
    assert_eq!(first["user"]["anonymous"], true);
    assert_eq!(first["user"]["created_at"], second["user"]["created_at"]);
}

fn messages_request(chat_id: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/chats/{}/messages", chat_id))
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

async fn chat_with_one_turn(app: &TestApp, user_id: &str) -> String {
    let created = body_json(
        app.post_json("/api/create-chat", json!({ "userId": user_id }))
            .await,
    )
    .await;
    let chat_id = created["chat"]["id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            "/api/chat",
            json!({
                "messages": [{ "role": "user", "content": "Питання" }],
                "chatId": chat_id,
                "userId": user_id,
            }),
        )
        .await;
    let _ = body_string(response).await;
    chat_id
}

#[tokio::test]
async fn messages_of_a_chat_are_listed_in_order() {
    let app = TestApp::new(MockProvider::new().with_text_reply("Відповідь"));
    let chat_id = chat_with_one_turn(&app, "user-1").await;

    let response = app.send(messages_request(&chat_id, "user-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["model"], "gemini-2.5-flash");
}

#[tokio::test]
async fn messages_are_hidden_from_other_users() {
    let app = TestApp::new(MockProvider::new().with_text_reply("Відповідь"));
    let chat_id = chat_with_one_turn(&app, "user-1").await;

    let foreign = app.send(messages_request(&chat_id, "user-2")).await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let anonymous = app.get(&format!("/api/chats/{}/messages", chat_id)).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let missing = app.send(messages_request("no-such-chat", "user-1")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
