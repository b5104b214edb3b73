//! HTTP request handlers for the memory API.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::error::{MemoryError, MemoryResult};
use crate::memory::types::{AddOutcome, NewMessage, SearchHit};

/// Response body for `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// The memory table exists and lookups can be served.
    pub ready: bool,
    pub retrieval_enabled: bool,
    pub memory_chunks: u64,
}

/// Query string for `GET /lookup`.
///
/// `k` stays raw text so out-of-range values such as `-1` reach the clamp
/// instead of failing extraction.
#[derive(Debug, Deserialize)]
pub struct LookupParams {
    #[serde(default)]
    pub query: String,
    pub k: Option<String>,
}

impl LookupParams {
    /// Requested result count, floored at 1. The store caps it at `MAX_K`.
    fn k(&self, default_k: usize) -> MemoryResult<usize> {
        let Some(raw) = self.k.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(default_k);
        };
        let k: i64 = raw.parse().map_err(|_| {
            MemoryError::InvalidArgument(format!("k must be an integer, got {raw:?}"))
        })?;
        Ok(usize::try_from(k.max(1)).unwrap_or(usize::MAX))
    }
}

/// Response body for `GET /lookup`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LookupResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Run store work (SQLite, ONNX inference) off the async runtime.
async fn blocking<T, F>(f: F) -> MemoryResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> MemoryResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MemoryError::Internal(anyhow::anyhow!("store task failed: {e}")))?
}

/// GET /
///
/// Never fails; a store error reads as zero entries.
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    let (ready, memory_chunks) = match ctx.store() {
        Ok(store) => {
            let store = Arc::clone(store);
            let counted = blocking(move || {
                let ready = store.try_attach()?;
                let count = if ready { store.entry_count()? } else { 0 };
                Ok((ready, count))
            })
            .await;
            counted.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "health check could not count entries");
                (false, 0)
            })
        }
        Err(_) => (false, 0),
    };

    Json(HealthResponse {
        status: "ok".into(),
        ready,
        retrieval_enabled: ctx.retrieval_enabled(),
        memory_chunks,
    })
}

/// GET /lookup?query=&k=
pub async fn lookup(
    State(ctx): State<Arc<AppContext>>,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> MemoryResult<Json<LookupResponse>> {
    let store = Arc::clone(ctx.store()?);
    let Query(params) = params.map_err(|e| MemoryError::InvalidArgument(e.body_text()))?;
    if params.query.trim().is_empty() {
        return Err(MemoryError::InvalidArgument(
            "query parameter cannot be empty".into(),
        ));
    }

    let k = params.k(ctx.default_k())?;
    let query = params.query.clone();
    let results = blocking(move || store.search(&query, k)).await?;
    tracing::debug!(k, hits = results.len(), "lookup served");

    Ok(Json(LookupResponse {
        query: params.query,
        results,
    }))
}

/// POST /add
///
/// Body is a JSON list of `{role, content, timestamp?}`.
pub async fn add(
    State(ctx): State<Arc<AppContext>>,
    messages: Result<Json<Vec<NewMessage>>, JsonRejection>,
) -> MemoryResult<Json<AddOutcome>> {
    let store = Arc::clone(ctx.store()?);
    let Json(messages) = messages.map_err(|e| MemoryError::InvalidArgument(e.body_text()))?;
    if messages.is_empty() {
        return Err(MemoryError::InvalidArgument(
            "message list must not be empty".into(),
        ));
    }
    let outcome = blocking(move || store.add(messages)).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: Option<&str>) -> LookupParams {
        LookupParams {
            query: "q".into(),
            k: k.map(String::from),
        }
    }

    #[test]
    fn k_falls_back_to_default() {
        assert_eq!(params(None).k(5).unwrap(), 5);
        assert_eq!(params(Some("")).k(5).unwrap(), 5);
    }

    #[test]
    fn k_below_one_is_floored() {
        assert_eq!(params(Some("-1")).k(5).unwrap(), 1);
        assert_eq!(params(Some("0")).k(5).unwrap(), 1);
        assert_eq!(params(Some("1000")).k(5).unwrap(), 1000);
    }

    #[test]
    fn non_numeric_k_is_invalid() {
        assert!(matches!(
            params(Some("many")).k(5),
            Err(MemoryError::InvalidArgument(_))
        ));
    }
}
