//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::upstream::CompletionService;

/// Built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Relay configuration (env-derived).
    pub config: Arc<Config>,
    /// Completion service every request is forwarded to.
    pub upstream: Arc<dyn CompletionService>,
    /// System instruction prepended to every conversation.
    pub system_prompt: Arc<str>,
}

impl AppState {
    pub fn new(config: Config, upstream: Arc<dyn CompletionService>) -> Self {
        let system_prompt = Arc::from(config.system_prompt.as_str());
        Self {
            config: Arc::new(config),
            upstream,
            system_prompt,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("system_prompt_len", &self.system_prompt.len())
            .finish_non_exhaustive()
    }
}
