//! chat-relay: streams chat completions from an OpenAI-compatible API to
//! browser clients.

mod config;
mod error;
mod middleware;
mod relay;
mod routes;
mod schemas;
mod state;
mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::upstream::openai::OpenAiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env();
    init_tracing(&cfg);
    info!(version = env!("CARGO_PKG_VERSION"), "chat-relay starting");

    if cfg.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; upstream calls will be rejected");
    }
    let upstream = OpenAiClient::from_config(&cfg);
    info!(
        base_url = %cfg.base_url,
        model = %cfg.model,
        format = cfg.stream_format.as_str(),
        max_body_bytes = cfg.max_body_bytes,
        "upstream client ready"
    );

    let addr: SocketAddr = cfg.bind_address.parse()?;
    let route = cfg.route_path.clone();
    let app = routes::build(Arc::new(AppState::new(cfg, Arc::new(upstream))));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %route, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("chat-relay stopped");
    Ok(())
}

fn init_tracing(cfg: &Config) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, rejected) = log_filter(rust_log.as_deref(), &cfg.log_level);
    if let Some(e) = rejected {
        eprintln!("WARN: RELAY_LOG='{}' is not a valid tracing filter ({e}); using 'info'", cfg.log_level);
    }

    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if cfg.log_json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

/// `RUST_LOG` wins when it parses; otherwise `relay_log`, otherwise `info`.
/// Returns the parse error of `relay_log` so it can be reported once a
/// writer exists.
fn log_filter(rust_log: Option<&str>, relay_log: &str) -> (EnvFilter, Option<ParseError>) {
    if let Some(filter) = rust_log.and_then(|d| EnvFilter::try_new(d).ok()) {
        return (filter, None);
    }
    match EnvFilter::try_new(relay_log) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable; only Ctrl-C stops the relay");
            None
        }
    };

    let terminate = async {
        #[cfg(unix)]
        if let Some(s) = sigterm.as_mut() {
            s.recv().await;
            return "SIGTERM";
        }
        std::future::pending::<&'static str>().await
    };

    let signal = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "Ctrl-C handler failed");
            }
            "SIGINT"
        }
        name = terminate => name,
    };
    info!(signal, "draining in-flight streams before exit");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rust_log_takes_precedence() {
        let (filter, rejected) = log_filter(Some("warn"), "debug");
        assert_eq!(filter.to_string(), "warn");
        assert!(rejected.is_none());
    }

    #[test]
    fn relay_log_used_without_rust_log() {
        let (filter, rejected) = log_filter(None, "chat_relay=debug");
        assert_eq!(filter.to_string(), "chat_relay=debug");
        assert!(rejected.is_none());
    }

    #[test]
    fn invalid_relay_log_falls_back_to_info() {
        let (filter, rejected) = log_filter(Some("chat_relay=loud"), "chat_relay=verbose");
        assert_eq!(filter.to_string(), "info");
        assert!(rejected.is_some());
    }
}
