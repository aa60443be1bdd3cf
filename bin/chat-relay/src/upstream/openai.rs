//! OpenAI-compatible streaming chat-completion client.
//!
//! Sends `POST {base_url}/chat/completions` with `stream: true` and turns the
//! server-sent-event body into framed output chunks (see
//! [`super::data_stream`]).

use std::collections::VecDeque;
use std::fmt::Display;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::data_stream::{FinishReason, Framer, Usage};
use super::sse::{SseDecoder, DONE_MARKER};
use super::{ChunkStream, CompletionService, GenerateRequest, UpstreamError};
use crate::config::{Config, StreamFormat};
use crate::schemas::chat::Role;

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

impl<'a> CompletionBody<'a> {
    fn new(request: &'a GenerateRequest) -> Self {
        let system = WireMessage { role: Role::System, content: &request.system };
        let history = request
            .messages
            .turns()
            .iter()
            .map(|t| WireMessage { role: t.role, content: &t.content });
        Self {
            model: &request.model,
            messages: std::iter::once(system).chain(history).collect(),
            temperature: request.temperature,
            stream: true,
            stream_options: StreamOptions { include_usage: true },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Streaming client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    format: StreamFormat,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, format: StreamFormat) -> Self {
        let client = Client::builder()
            .user_agent(concat!("chat-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self::with_http_client(client, base_url, api_key, format)
    }

    pub fn with_http_client(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        format: StreamFormat,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            format,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.base_url.clone(), cfg.api_key.clone(), cfg.stream_format)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<ChunkStream, UpstreamError> {
        let body = CompletionBody::new(&request);
        debug!(
            model = %request.model,
            turns = request.messages.len(),
            "sending completion request"
        );

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.starts_with("text/event-stream") {
            return Err(UpstreamError::NoStream { content_type });
        }

        Ok(completion_stream(resp.bytes_stream(), Framer::new(self.format)))
    }
}

// ── Event stream → framed chunks ─────────────────────────────────────────────

struct Completion<E> {
    body: BoxStream<'static, Result<Bytes, E>>,
    decoder: SseDecoder,
    framer: Framer,
    out: VecDeque<Bytes>,
    failure: Option<UpstreamError>,
    finish_reason: FinishReason,
    usage: Usage,
    done: bool,
}

impl<E: Display> Completion<E> {
    fn drain_events(&mut self) {
        while let Some(payload) = self.decoder.next_event() {
            if self.done {
                return;
            }
            if payload.trim() == DONE_MARKER {
                self.complete();
                return;
            }
            match serde_json::from_str::<CompletionChunk>(&payload) {
                Ok(chunk) => self.apply(chunk),
                Err(e) => warn!(error = %e, "skipping unparseable upstream event"),
            }
        }
    }

    fn apply(&mut self, chunk: CompletionChunk) {
        if let Some(err) = chunk.error {
            self.fail(format!("upstream reported error: {err}"));
            return;
        }
        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            };
        }
        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };
        match choice.delta.and_then(|d| d.content) {
            Some(text) if !text.is_empty() => self.out.push_back(self.framer.text(&text)),
            _ => {}
        }
        if let Some(reason) = choice.finish_reason {
            self.finish_reason = FinishReason::from_openai(Some(&reason));
        }
    }

    fn complete(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Some(tail) = self.framer.finish(self.finish_reason, self.usage) {
            self.out.push_back(tail);
        }
    }

    fn fail(&mut self, message: String) {
        warn!(error = %message, "upstream stream failed mid-response");
        self.done = true;
        match self.framer.error() {
            Some(part) => self.out.push_back(part),
            None => self.failure = Some(UpstreamError::Interrupted(message)),
        }
    }
}

/// Adapt a raw SSE byte stream into framed output chunks.
pub(crate) fn completion_stream<S, E>(body: S, framer: Framer) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut state = Completion {
        body: body.boxed(),
        decoder: SseDecoder::new(),
        framer,
        out: VecDeque::new(),
        failure: None,
        finish_reason: FinishReason::default(),
        usage: Usage::default(),
        done: false,
    };
    if let Some(start) = state.framer.start() {
        state.out.push_back(start);
    }

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.out.pop_front() {
                return Some((Ok(chunk), st));
            }
            if let Some(err) = st.failure.take() {
                return Some((Err(err), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    st.decoder.push(&bytes);
                    st.drain_events();
                }
                Some(Err(e)) => st.fail(e.to_string()),
                None => {
                    st.decoder.finish();
                    st.drain_events();
                    st.complete();
                }
            }
        }
    })
    .boxed()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
