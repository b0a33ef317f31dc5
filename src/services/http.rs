//! HTTP server thread.
//!
//! # Responsibilities
//! - Bind the listener and serve the key-value handler
//! - Hand the orchestrator a shutdown procedure once listening
//! - Drain in-flight requests on shutdown
//!
//! The procedure starts the drain and resolves once the server has stopped
//! accepting and every in-flight request has completed.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::lifecycle::{Deadline, ShutdownRegistrar, UnitResult};
use crate::services::store::KvStore;

/// Key every request reads or writes.
pub const VALUE_KEY: &str = "test";

/// TTL of values written through `POST /`.
pub const VALUE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
struct AppState {
    label: Arc<str>,
    store: Arc<KvStore>,
    slow: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct RequestParams {
    slow: Option<String>,
}

impl RequestParams {
    fn is_slow(&self) -> bool {
        self.slow
            .as_deref()
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "t" | "true"))
    }
}

#[derive(Debug, Deserialize)]
struct SetValue {
    value: String,
}

/// One HTTP server, run as an orchestrated thread.
pub struct HttpService {
    name: String,
    bind_address: String,
    state: AppState,
}

impl HttpService {
    pub fn new(config: &ServerConfig, store: Arc<KvStore>, slow_request: Duration) -> Self {
        Self {
            name: config.name.clone(),
            bind_address: config.bind_address.clone(),
            state: AppState {
                label: Arc::from(config.name.as_str()),
                store,
                slow: slow_request,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Thread body: bind, register the drain procedure, serve until drained.
    pub async fn run(self, token: CancellationToken, registrar: ShutdownRegistrar) -> UnitResult {
        let listener = TcpListener::bind(&self.bind_address).await?;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server listening");

        let drain = CancellationToken::new();
        let stopped = CancellationToken::new();
        {
            let drain = drain.clone();
            let stopped = stopped.clone();
            registrar.register(move |deadline: Deadline| async move {
                tracing::info!(remaining = ?deadline.remaining(), "Draining in-flight requests");
                drain.cancel();
                stopped.cancelled().await;
                Ok(())
            });
        }
        let _stopped = stopped.drop_guard();

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = drain.cancelled() => {}
                    _ = token.cancelled() => {}
                }
            })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handle))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn handle(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<RequestParams>,
    body: Bytes,
) -> Response {
    tracing::debug!(server = %state.label, method = %method, "Request received");
    if params.is_slow() {
        tokio::time::sleep(state.slow).await;
    }

    let response = match method {
        Method::GET => match state.store.get(VALUE_KEY) {
            Ok(Some(value)) => (StatusCode::OK, format!("Value: {value}")).into_response(),
            Ok(None) => StatusCode::NOT_FOUND.into_response(),
            Err(e) => {
                tracing::error!(server = %state.label, error = %e, "Store read failed");
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
        },
        Method::POST => {
            let payload: SetValue = match serde_json::from_slice(&body) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::debug!(server = %state.label, error = %e, "Rejecting malformed body");
                    return StatusCode::BAD_REQUEST.into_response();
                }
            };
            match state.store.set(VALUE_KEY, payload.value, VALUE_TTL) {
                Ok(()) => StatusCode::OK.into_response(),
                Err(e) => {
                    tracing::error!(server = %state.label, error = %e, "Store write failed");
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            }
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    };

    tracing::debug!(server = %state.label, status = %response.status(), "Request completed");
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_flag_parsing() {
        let parse = |v: Option<&str>| RequestParams {
            slow: v.map(str::to_string),
        }
        .is_slow();

        assert!(parse(Some("true")));
        assert!(parse(Some("TRUE")));
        assert!(parse(Some("1")));
        assert!(!parse(Some("false")));
        assert!(!parse(Some("yes please")));
        assert!(!parse(None));
    }
}
