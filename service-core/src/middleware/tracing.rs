use axum::http::{HeaderMap, HeaderValue};
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reads the request id propagated by `request_id_middleware`.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
}

/// Request id as the caller sent it. Absent from the extensions when the id
/// was generated here, so handlers can tell retries from fresh requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequestId(pub String);

/// Ensures every request carries an `x-request-id`, generating a UUID when
/// the caller did not send one, and echoes it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let client_id = request_id(req.headers()).map(|s| s.to_string());
    let request_id = client_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Some(id) = client_id {
        req.extensions_mut().insert(ClientRequestId(id));
    }

    let header_value = HeaderValue::from_str(&request_id).ok();

    if let Some(value) = header_value.clone() {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let mut response = next.run(req).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
