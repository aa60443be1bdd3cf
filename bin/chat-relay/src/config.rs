//! Relay configuration, loaded from environment variables at startup.

use std::str::FromStr;

/// System instruction used when neither `RELAY_SYSTEM_PROMPT` nor
/// `RELAY_SYSTEM_PROMPT_FILE` is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer concisely.";

/// Largest request body the relay buffers (4.5 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 4_718_592;

/// Wire format of the streamed response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    /// Line-oriented data stream parts (`0:"text"`, `d:{...}`), as consumed by
    /// chat UI hooks.
    #[default]
    Data,
    /// Bare text deltas.
    Text,
}

impl StreamFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Text => "text",
        }
    }
}

impl FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(Self::Data),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown stream format '{other}'")),
        }
    }
}

/// Runtime configuration for chat-relay.
///
/// Every field has a default so the relay starts without any environment
/// variables set. A missing `OPENAI_API_KEY` is not rejected here; the
/// upstream refuses the call and the relay reports it per request.
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// Path the relay handler is mounted on (default: `"/api/chat"`).
    pub route_path: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Credential sent as a bearer token to the completion service.
    pub api_key: String,

    /// Base URL of the OpenAI-compatible completion API.
    pub base_url: String,

    /// Model identifier passed on every upstream call.
    pub model: String,

    /// Framing of the relayed body.
    pub stream_format: StreamFormat,

    /// System instruction prepended to every conversation.
    pub system_prompt: String,

    /// Upper bound on the relay request body; larger bodies get 413.
    pub max_body_bytes: usize,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("RELAY_BIND", "0.0.0.0:3000"),
            route_path: env_or("RELAY_ROUTE", "/api/chat"),
            log_level: env_or("RELAY_LOG", "info"),
            log_json: env_flag("RELAY_LOG_JSON", false),
            enable_docs: env_flag("RELAY_ENABLE_DOCS", true),
            api_key: env_or("OPENAI_API_KEY", ""),
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or("RELAY_MODEL", "gpt-5-nano"),
            stream_format: stream_format_from_env(),
            system_prompt: system_prompt_from_env(),
            max_body_bytes: max_body_from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".into(),
            route_path: "/api/chat".into(),
            log_level: "info".into(),
            log_json: false,
            enable_docs: true,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-5-nano".into(),
            stream_format: StreamFormat::Data,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("route_path", &self.route_path)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("enable_docs", &self.enable_docs)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("stream_format", &self.stream_format)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn stream_format_from_env() -> StreamFormat {
    match std::env::var("RELAY_STREAM_FORMAT") {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            // Tracing is not installed yet when configuration is read.
            eprintln!("WARN: RELAY_STREAM_FORMAT ignored ({e}); falling back to 'data'");
            StreamFormat::Data
        }),
        Err(_) => StreamFormat::Data,
    }
}

fn max_body_from_env() -> usize {
    match std::env::var("RELAY_MAX_BODY_BYTES") {
        Ok(raw) => parse_body_limit(&raw).unwrap_or_else(|| {
            eprintln!(
                "WARN: RELAY_MAX_BODY_BYTES='{raw}' is not a positive byte count; \
                 using {DEFAULT_MAX_BODY_BYTES}"
            );
            DEFAULT_MAX_BODY_BYTES
        }),
        Err(_) => DEFAULT_MAX_BODY_BYTES,
    }
}

fn parse_body_limit(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

/// Inline prompt wins over the prompt file; an unreadable file falls back to
/// the built-in prompt.
fn system_prompt_from_env() -> String {
    if let Ok(prompt) = std::env::var("RELAY_SYSTEM_PROMPT") {
        return prompt;
    }
    if let Ok(path) = std::env::var("RELAY_SYSTEM_PROMPT_FILE") {
        match std::fs::read_to_string(&path) {
            Ok(prompt) => return prompt.trim().to_owned(),
            Err(e) => eprintln!(
                "WARN: failed to read RELAY_SYSTEM_PROMPT_FILE '{path}' ({e}); \
                 using the built-in prompt"
            ),
        }
    }
    DEFAULT_SYSTEM_PROMPT.to_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stream_format_parses_known_values() {
        assert_eq!("data".parse::<StreamFormat>(), Ok(StreamFormat::Data));
        assert_eq!(" TEXT ".parse::<StreamFormat>(), Ok(StreamFormat::Text));
        assert!("sse".parse::<StreamFormat>().is_err());
    }

    #[test]
    fn flags_accept_one_and_true() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn default_mounts_relay_on_api_chat() {
        let cfg = Config::default();
        assert_eq!(cfg.route_path, "/api/chat");
        assert_eq!(cfg.stream_format, StreamFormat::Data);
        assert_eq!(cfg.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn body_limit_must_be_positive() {
        assert_eq!(parse_body_limit(" 1048576 "), Some(1_048_576));
        assert_eq!(parse_body_limit("0"), None);
        assert_eq!(parse_body_limit("4MB"), None);
        assert_eq!(Config::default().max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let cfg = Config { api_key: "sk-secret".into(), ..Config::default() };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
