//! Output framing for relayed completions.
//!
//! In [`StreamFormat::Data`] every piece of the completion becomes one line
//! `<code>:<json>\n` (the data stream protocol spoken by browser chat hooks):
//!
//! | code | payload |
//! |------|---------|
//! | `f`  | `{"messageId": ...}` at the start of a message |
//! | `0`  | text delta as a JSON string |
//! | `e`  | end of step: finish reason, usage, `isContinued` |
//! | `d`  | end of message: finish reason, usage |
//! | `3`  | error message as a JSON string |
//!
//! [`StreamFormat::Text`] emits the text deltas and nothing else.

use bytes::Bytes;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::StreamFormat;

/// Header advertising the data stream protocol version to clients.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";

/// Message sent in the error part; upstream details stay in the server log.
const ERROR_MESSAGE: &str = "An error occurred.";

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    #[default]
    Unknown,
}

impl FinishReason {
    /// Map an OpenAI `finish_reason` value.
    pub fn from_openai(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => Self::Stop,
            Some("length") => Self::Length,
            Some("content_filter") => Self::ContentFilter,
            Some("tool_calls") | Some("function_call") => Self::ToolCalls,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content-filter",
            Self::ToolCalls => "tool-calls",
            Self::Unknown => "unknown",
        }
    }
}

/// Token accounting reported by the service, when it reports any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl Usage {
    fn to_json(self) -> Value {
        json!({
            "promptTokens": self.prompt_tokens,
            "completionTokens": self.completion_tokens,
        })
    }
}

/// Turns completion events into response body chunks for one message.
#[derive(Debug, Clone)]
pub struct Framer {
    format: StreamFormat,
    message_id: String,
}

impl Framer {
    pub fn new(format: StreamFormat) -> Self {
        Self::with_message_id(format, format!("msg-{}", Uuid::new_v4().simple()))
    }

    pub fn with_message_id(format: StreamFormat, message_id: impl Into<String>) -> Self {
        Self { format, message_id: message_id.into() }
    }

    pub fn start(&self) -> Option<Bytes> {
        match self.format {
            StreamFormat::Data => Some(part('f', &json!({ "messageId": self.message_id }))),
            StreamFormat::Text => None,
        }
    }

    pub fn text(&self, delta: &str) -> Bytes {
        match self.format {
            StreamFormat::Data => part('0', &Value::String(delta.to_owned())),
            StreamFormat::Text => Bytes::copy_from_slice(delta.as_bytes()),
        }
    }

    pub fn finish(&self, reason: FinishReason, usage: Usage) -> Option<Bytes> {
        match self.format {
            StreamFormat::Data => {
                let step = part(
                    'e',
                    &json!({
                        "finishReason": reason.as_str(),
                        "usage": usage.to_json(),
                        "isContinued": false,
                    }),
                );
                let done = part(
                    'd',
                    &json!({
                        "finishReason": reason.as_str(),
                        "usage": usage.to_json(),
                    }),
                );
                let mut out = Vec::with_capacity(step.len() + done.len());
                out.extend_from_slice(&step);
                out.extend_from_slice(&done);
                Some(Bytes::from(out))
            }
            StreamFormat::Text => None,
        }
    }

    /// Error part for the data format. Text streams have no in-band error
    /// representation, so the caller ends the body instead.
    pub fn error(&self) -> Option<Bytes> {
        match self.format {
            StreamFormat::Data => Some(part('3', &Value::String(ERROR_MESSAGE.to_owned()))),
            StreamFormat::Text => None,
        }
    }
}

fn part(code: char, payload: &Value) -> Bytes {
    Bytes::from(format!("{code}:{payload}\n"))
}
