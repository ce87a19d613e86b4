mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, TestApp};
use legal_chat_service::services::providers::mock::MockProvider;
use serde_json::{json, Value};

fn with_user(method: &str, uri: &str, user_id: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id)
        .header("content-type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn requests_without_user_are_unauthorized() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/api/user-preferences").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn unknown_user_gets_defaults() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .send(with_user("GET", "/api/user-preferences", "user-1", None))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["layout"], "fullscreen");
    assert_eq!(body["prompt_suggestions"], true);
    assert_eq!(body["multi_model_enabled"], false);
    assert_eq!(body["hidden_models"], json!([]));
    assert!(body.get("user_id").is_none());
}

#[tokio::test]
async fn partial_update_is_merged_and_persisted() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .send(with_user(
            "PUT",
            "/api/user-preferences",
            "user-1",
            Some(json!({ "layout": "sidebar", "hidden_models": ["gemini-2.5-pro"] })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["layout"], "sidebar");
    assert_eq!(body["prompt_suggestions"], true);

    let reread = body_json(
        app.send(with_user("GET", "/api/user-preferences", "user-1", None))
            .await,
    )
    .await;
    assert_eq!(reread["layout"], "sidebar");
    assert_eq!(reread["hidden_models"], json!(["gemini-2.5-pro"]));
}

#[tokio::test]
async fn malformed_update_is_rejected() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .send(with_user(
            "PUT",
            "/api/user-preferences",
            "user-1",
            Some(json!({ "prompt_suggestions": "yes" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid preferences");
}

#[tokio::test]
async fn favorite_models_round_trip_for_existing_user() {
    let app = TestApp::new(MockProvider::new());
    let guest = app
        .post_json("/api/create-guest", json!({ "userId": "guest-1" }))
        .await;
    assert_eq!(guest.status(), StatusCode::OK);

    let response = app
        .send(with_user(
            "POST",
            "/api/user-preferences/favorite-models",
            "guest-1",
            Some(json!({ "favorite_models": ["gemini-2.5-pro"] })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    let listed = body_json(
        app.send(with_user(
            "GET",
            "/api/user-preferences/favorite-models",
            "guest-1",
            None,
        ))
        .await,
    )
    .await;
    assert_eq!(listed["favorite_models"], json!(["gemini-2.5-pro"]));
    assert!(listed.get("success").is_none());
}

#[tokio::test]
async fn favorite_models_for_unknown_user() {
    let app = TestApp::new(MockProvider::new());

    let listed = app
        .send(with_user(
            "GET",
            "/api/user-preferences/favorite-models",
            "nobody",
            None,
        ))
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(body_json(listed).await["favorite_models"], json!([]));

    let update = app
        .send(with_user(
            "POST",
            "/api/user-preferences/favorite-models",
            "nobody",
            Some(json!({ "favorite_models": ["gemini-2.5-flash"] })),
        ))
        .await;
    assert_eq!(update.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_models_must_be_strings() {
    let app = TestApp::new(MockProvider::new());

    let response = app
        .send(with_user(
            "POST",
            "/api/user-preferences/favorite-models",
            "user-1",
            Some(json!({ "favorite_models": "gemini-2.5-pro" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "favorite_models must be an array of strings"
    );
}
