//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - the chat relay on the configured path
//! - health / heartbeat route
//! - OpenAPI document (disable with `RELAY_ENABLE_DOCS=false`)
//! - fixed CORS / cache headers and per-request trace spans on every response

pub mod chat;
pub mod doc;
mod health;

use axum::routing::get;
use axum::{middleware, Json, Router};
use std::sync::Arc;

use crate::middleware::{headers, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(chat::router(&state.config.route_path, state.config.max_body_bytes));

    if state.config.enable_docs {
        let api_doc = doc::get_docs(&state.config.route_path);
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        );
    }

    app
        // Outermost layers execute first on the way in.
        .layer(headers::fixed_headers_layer())
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::upstream::{ChunkStream, CompletionService, GenerateRequest, UpstreamError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Unreachable;

    #[async_trait]
    impl CompletionService for Unreachable {
        async fn generate(&self, _: GenerateRequest) -> Result<ChunkStream, UpstreamError> {
            Err(UpstreamError::Interrupted("not used".into()))
        }
    }

    fn app(cfg: Config) -> Router {
        build(Arc::new(AppState::new(cfg, Arc::new(Unreachable))))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn fixed_headers_on_unmatched_routes() {
        let resp = app(Config::default()).oneshot(get_req("/nowhere")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(resp.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn health_carries_trace_id() {
        let resp = app(Config::default()).oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(trace::X_TRACE_ID));
        assert_eq!(resp.headers()["access-control-allow-methods"], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn caller_trace_id_is_echoed() {
        let id = "7f6c2f1e-3a2b-4c1d-9e8f-0a1b2c3d4e5f";
        let req = Request::builder()
            .uri("/health")
            .header(trace::X_TRACE_ID, id)
            .body(Body::empty())
            .unwrap();
        let resp = app(Config::default()).oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[trace::X_TRACE_ID], id);
    }

    #[tokio::test]
    async fn docs_route_follows_config() {
        let resp = app(Config::default())
            .oneshot(get_req("/api-docs/openapi.json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/api/chat"]["post"].is_object());

        let cfg = Config { enable_docs: false, ..Config::default() };
        let resp = app(cfg).oneshot(get_req("/api-docs/openapi.json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn relay_path_is_configurable() {
        let cfg = Config { route_path: "/chat".into(), ..Config::default() };
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .body(Body::empty())
            .unwrap();
        let resp = app(cfg.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app(cfg).oneshot(get_req("/api-docs/openapi.json")).await.unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/chat"]["post"].is_object());
        assert!(doc["paths"].get("/api/chat").is_none());
    }
}
