//! Completion service seam.
//!
//! The relay handler only sees [`CompletionService`]; the production
//! implementation is [`openai::OpenAiClient`], tests plug in scripted streams.

pub mod data_stream;
pub mod openai;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::schemas::chat::ConversationWindow;

/// Sampling temperature used for every request.
pub const TEMPERATURE: f32 = 0.5;

/// Lazy, single-pass sequence of output chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Arguments of one completion call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: Arc<str>,
    pub messages: ConversationWindow,
    pub temperature: f32,
    pub model: String,
}

/// Failures talking to the completion service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never produced a response (DNS, TLS, connection reset…).
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered but without a readable event stream.
    #[error("upstream response has no event stream (content-type: {content_type})")]
    NoStream { content_type: String },

    /// The body failed after streaming had begun.
    #[error("upstream stream interrupted: {0}")]
    Interrupted(String),
}

/// A hosted text-generation API.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a completion. Resolves once the service has accepted the call;
    /// output arrives through the returned stream.
    async fn generate(&self, request: GenerateRequest) -> Result<ChunkStream, UpstreamError>;
}
