//! Liveness probe that also reports what the relay forwards to.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthReport)))]
pub struct HealthApi;

/// Body of `GET /health`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    /// Model every relayed conversation is sent to.
    pub model: String,
    /// `data` or `text`.
    pub stream_format: String,
    /// Path the relay handler is mounted on.
    pub route: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Never contacts the completion service, so a bad key still reports `ok`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Relay is up", body = HealthReport)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let cfg = &state.config;
    Json(HealthReport {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        model: cfg.model.clone(),
        stream_format: cfg.stream_format.as_str().to_owned(),
        route: cfg.route_path.clone(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Config, StreamFormat};
    use crate::upstream::{ChunkStream, CompletionService, GenerateRequest, UpstreamError};
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl CompletionService for NeverCalled {
        async fn generate(&self, _: GenerateRequest) -> Result<ChunkStream, UpstreamError> {
            panic!("health must not reach the completion service");
        }
    }

    fn state(cfg: Config) -> State<Arc<AppState>> {
        State(Arc::new(AppState::new(cfg, Arc::new(NeverCalled))))
    }

    #[tokio::test]
    async fn reports_configured_model_and_format() {
        let cfg = Config {
            model: "gpt-4o-mini".into(),
            stream_format: StreamFormat::Text,
            route_path: "/relay".into(),
            ..Config::default()
        };
        let Json(report) = get_health(state(cfg)).await;
        assert_eq!(report.status, "ok");
        assert_eq!(report.model, "gpt-4o-mini");
        assert_eq!(report.stream_format, "text");
        assert_eq!(report.route, "/relay");
    }

    #[tokio::test]
    async fn defaults_serialize_with_version() {
        let Json(report) = get_health(state(Config::default())).await;
        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body["stream_format"], "data");
        assert_eq!(body["route"], "/api/chat");
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }
}
