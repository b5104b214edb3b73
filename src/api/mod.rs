//! Memory Service: the HTTP surface over the [`MemoryStore`].
//!
//! - `GET /` health, public
//! - `GET /lookup?query=&k=` nearest memory entries, token required
//! - `POST /add` append messages, token required
//!
//! Handlers receive an [`AppContext`] built once at startup. When retrieval is
//! disabled the context carries no store and both protected routes answer 503.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::config::VesperConfig;
use crate::error::MemoryError;
use crate::memory::store::MemoryStore;

/// Process-wide state shared by every handler.
pub struct AppContext {
    store: Option<Arc<MemoryStore>>,
    /// `None` when the configured secret is still the placeholder.
    secret: Option<String>,
    default_k: usize,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("retrieval_enabled", &self.store.is_some())
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .field("default_k", &self.default_k)
            .finish()
    }
}

impl AppContext {
    /// `store` is `None` when retrieval is disabled.
    pub fn new(config: &VesperConfig, store: Option<Arc<MemoryStore>>) -> Self {
        let secret = (!config.secret_is_placeholder()).then(|| config.server.api_secret.clone());
        Self {
            store,
            secret,
            default_k: config.retrieval.default_k,
        }
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// The store, or [`MemoryError::Unavailable`] when retrieval is disabled.
    pub fn store(&self) -> Result<&Arc<MemoryStore>, MemoryError> {
        self.store
            .as_ref()
            .ok_or_else(|| MemoryError::Unavailable("retrieval is disabled".into()))
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }
}

/// Error response body.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl MemoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady(_) | Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Misconfigured(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MemoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// Build the service router: the public health route plus the token-guarded
/// memory routes.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::health))
        .with_state(Arc::clone(&ctx));

    let memory_routes = Router::new()
        .route("/lookup", get(handlers::lookup))
        .route("/add", post(handlers::add))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&ctx),
            auth::require_token,
        ))
        .with_state(ctx);

    Router::new().merge(public_routes).merge(memory_routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        let cases = [
            (MemoryError::InvalidArgument("x".into()), 400),
            (MemoryError::Forbidden("x".into()), 403),
            (MemoryError::NotFound("x".into()), 404),
            (MemoryError::Misconfigured("x".into()), 500),
            (MemoryError::NotReady("x".into()), 503),
            (MemoryError::Unavailable("x".into()), 503),
            (MemoryError::Internal(anyhow::anyhow!("boom")), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status_code().as_u16(), code, "{err}");
        }
    }

    #[test]
    fn placeholder_secret_is_not_kept() {
        let config = VesperConfig::default();
        let ctx = AppContext::new(&config, None);
        assert!(ctx.secret().is_none());
        assert!(!ctx.retrieval_enabled());
        assert!(matches!(ctx.store(), Err(MemoryError::Unavailable(_))));
    }

    #[test]
    fn debug_redacts_secret() {
        let mut config = VesperConfig::default();
        config.server.api_secret = "hunter2".into();
        let ctx = AppContext::new(&config, None);
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[redacted]"));
    }
}
