//! OpenAPI document for the relay.

use utoipa::OpenApi;

use super::{chat, health};

#[derive(OpenApi)]
#[openapi(info(title = "chat-relay", description = "Streaming chat relay"))]
pub struct RelayApi;

/// Merged document with the relay listed under `route_path`.
pub fn get_docs(route_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = RelayApi::openapi();
    doc.merge(chat::ChatApi::openapi());
    doc.merge(health::HealthApi::openapi());

    if let Some(item) = doc.paths.paths.remove(chat::DOCUMENTED_PATH) {
        doc.paths.paths.insert(route_path.to_owned(), item);
    }
    doc
}
