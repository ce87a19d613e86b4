use crate::dtos::chat::ChatRequestBody;
use crate::services::data_stream::{DATA_STREAM_HEADER, DATA_STREAM_VERSION};
use crate::services::ChatError;
use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    Extension,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use service_core::error::AppError;
use service_core::middleware::ClientRequestId;
use std::convert::Infallible;

pub const USAGE_LIMIT_HEADER: &str = "x-usage-limit";
pub const USAGE_REMAINING_HEADER: &str = "x-usage-remaining";

/// `POST /api/chat`: stream one assistant turn.
///
/// The body is parsed by hand so that an empty or malformed payload gets
/// the same 400 as a payload with missing fields.
pub async fn chat(
    State(state): State<AppState>,
    client_request_id: Option<Extension<ClientRequestId>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: ChatRequestBody = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Unreadable chat request body");
        ChatError::MissingInformation
    })?;
    let turn = request.into_turn(client_request_id.map(|Extension(id)| id.0))?;

    let prepared = state.orchestrator.prepare(turn).await?;
    let limit = prepared.admission.limit;
    let remaining = prepared.admission.remaining;

    let stream = state
        .orchestrator
        .start(prepared)
        .map(Ok::<_, Infallible>);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response_headers.insert(DATA_STREAM_HEADER, HeaderValue::from_static(DATA_STREAM_VERSION));
    response_headers.insert(USAGE_LIMIT_HEADER, HeaderValue::from(limit));
    response_headers.insert(USAGE_REMAINING_HEADER, HeaderValue::from(remaining));

    Ok((response_headers, Body::from_stream(stream)).into_response())
}
