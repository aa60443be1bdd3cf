//! Chat relay route.
//!
//! `POST` validates the body, trims the history to a [`ConversationWindow`],
//! starts a completion and returns its output as a streaming body. `OPTIONS`
//! answers preflight requests; every other method is rejected before the body
//! is read.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde_json::Value;
use tracing::debug;
use utoipa::OpenApi;

use crate::config::StreamFormat;
use crate::error::RelayError;
use crate::relay::relay;
use crate::schemas::chat::{ChatRequest, ChatTurn, ConversationWindow, ErrorBody, Role};
use crate::state::AppState;
use crate::upstream::data_stream::{DATA_STREAM_HEADER, DATA_STREAM_VERSION};
use crate::upstream::{ChunkStream, GenerateRequest, TEMPERATURE};

#[derive(OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(ChatRequest, ChatTurn, Role, ErrorBody))
)]
pub struct ChatApi;

/// Path the handler is documented under; [`super::doc::get_docs`] rewrites
/// it to the mounted path.
pub const DOCUMENTED_PATH: &str = "/api/chat";

/// Register the relay on `path`, accepting every method so that rejections
/// carry the JSON error body. Bodies over `max_body_bytes` are refused with 413.
pub fn router(path: &str, max_body_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, any(chat))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Relay a conversation to the completion service.
///
/// The body streams as the model produces it; its framing depends on
/// `RELAY_STREAM_FORMAT`.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Completion streamed as it is generated", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing messages", body = ErrorBody),
        (status = 405, description = "Method not allowed", body = ErrorBody),
        (status = 413, description = "Request body too large", body = ErrorBody),
        (status = 500, description = "Upstream or server error", body = ErrorBody),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Response, RelayError> {
    match req.method().clone() {
        Method::OPTIONS => return Ok(StatusCode::OK.into_response()),
        Method::POST => {}
        _ => return Err(RelayError::MethodNotAllowed),
    }

    let body = Bytes::from_request(req, &state).await?;
    let messages = conversation_window(&body)?;
    if messages.is_empty() {
        debug!("no user or assistant turns left after filtering");
    }
    debug!(turns = messages.len(), model = %state.config.model, "forwarding conversation");

    let upstream = state
        .upstream
        .generate(GenerateRequest {
            system: Arc::clone(&state.system_prompt),
            messages,
            temperature: TEMPERATURE,
            model: state.config.model.clone(),
        })
        .await?;

    Ok(stream_response(upstream, state.config.stream_format))
}

/// Extract and trim `messages`. An empty body or JSON `null` counts as `{}`.
fn conversation_window(body: &[u8]) -> Result<ConversationWindow, RelayError> {
    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body)?
    };
    match payload.get("messages") {
        Some(Value::Array(items)) if !items.is_empty() => Ok(ConversationWindow::from_values(items)),
        _ => Err(RelayError::MissingMessages),
    }
}

fn stream_response(upstream: ChunkStream, format: StreamFormat) -> Response {
    let mut response = Response::new(Body::from_stream(relay(upstream)));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    if format == StreamFormat::Data {
        headers.insert(
            HeaderName::from_static(DATA_STREAM_HEADER),
            HeaderValue::from_static(DATA_STREAM_VERSION),
        );
    }
    response
}

// ── Tests ──────────────────────────────────────────────────────────────────────
