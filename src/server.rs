//! Startup sequence for the memory service.
//!
//! Loads the embedding model and opens the vector store once, unpacks the
//! export archive when needed, builds the memory table before the listener is
//! bound, then serves the [`api`](crate::api) router until ctrl-c.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{self, AppContext};
use crate::config::{expand_tilde, VesperConfig};
use crate::db::schema;
use crate::db::vector::SqliteVecStore;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::MemoryError;
use crate::memory::store::{MemoryStore, StoreOptions};
use crate::memory::types::BuildOutcome;

/// Open the vector store and load the embedding model.
///
/// Records the model name on first use and warns when the configured model
/// differs from the one the stored vectors were computed with.
pub fn open_store(config: &VesperConfig) -> Result<MemoryStore> {
    let db_path = config.resolved_db_path();
    let vectors = SqliteVecStore::open_path(&db_path)?;
    tracing::info!(db = %db_path.display(), "vector store ready");

    let configured = config.embedding.model.as_str();
    vectors.with_connection(|conn| {
        match schema::get_embedding_model(conn)? {
            Some(stored) if stored != configured => tracing::warn!(
                stored = %stored,
                configured = %configured,
                "embedding model changed; delete the database and rebuild to re-embed memory"
            ),
            Some(_) => {}
            None => schema::set_embedding_model(conn, configured)?,
        }
        Ok(())
    })?;

    tracing::info!(model = %configured, device = %config.embedding.device, "loading embedding model");
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    tracing::info!("embedding provider ready");

    let options = StoreOptions {
        table: config.storage.table.clone(),
        chunk_tokens: config.ingest.chunk_tokens,
    };
    Ok(MemoryStore::new(provider, Arc::new(vectors), options)?)
}

/// Extract `zip_path` into `unzip_dir` unless the directory already exists.
///
/// Returns the directory to read the export from. A missing archive is not an
/// error here; the extractor reports the missing export.
pub fn prepare_export(zip_path: &Path, unzip_dir: &Path) -> Result<PathBuf> {
    if unzip_dir.exists() {
        tracing::info!(dir = %unzip_dir.display(), "export directory exists, skipping unzip");
        return Ok(unzip_dir.to_path_buf());
    }
    if !zip_path.is_file() {
        tracing::warn!(zip = %zip_path.display(), "export archive not found");
        return Ok(unzip_dir.to_path_buf());
    }

    tracing::info!(zip = %zip_path.display(), dir = %unzip_dir.display(), "unzipping export");
    let file = std::fs::File::open(zip_path)
        .with_context(|| format!("failed to open {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("not a readable zip archive")?;
    if let Err(e) = archive.extract(unzip_dir) {
        // leave nothing behind so the next start retries the extraction
        let _ = std::fs::remove_dir_all(unzip_dir);
        return Err(e).context("failed to extract export archive");
    }
    tracing::info!(entries = archive.len(), "export unzipped");
    Ok(unzip_dir.to_path_buf())
}

/// Unzip (if needed) and build.
///
/// A missing export is a soft failure: it is logged and the table stays
/// unbuilt. Any other failure is returned.
pub fn build_at_startup(store: &MemoryStore, config: &VesperConfig) -> Result<Option<BuildOutcome>> {
    let source = prepare_export(
        &expand_tilde(&config.ingest.zip_path),
        &expand_tilde(&config.ingest.unzip_dir),
    )?;
    match store.build(&source) {
        Ok(outcome) => {
            tracing::info!(?outcome, "memory build finished");
            Ok(Some(outcome))
        }
        Err(MemoryError::NotFound(reason)) => {
            tracing::warn!(%reason, "memory not built; lookups answer 503 until a build succeeds");
            Ok(None)
        }
        Err(e) => Err(e).context("memory build failed"),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down memory server"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

/// Run the memory service until ctrl-c.
pub async fn serve(config: VesperConfig) -> Result<()> {
    let store = if config.retrieval.enabled {
        let cfg = config.clone();
        let store = tokio::task::spawn_blocking(move || -> Result<Arc<MemoryStore>> {
            let store = open_store(&cfg)?;
            build_at_startup(&store, &cfg)?;
            Ok(Arc::new(store))
        })
        .await
        .context("startup task panicked")??;
        Some(store)
    } else {
        tracing::info!("retrieval disabled; no embedding model or vector store loaded");
        None
    };

    if config.secret_is_placeholder() {
        tracing::error!(
            "api_secret is still the placeholder; /lookup and /add will answer 500 until VESPER_API_SECRET is set"
        );
    }

    let ctx = Arc::new(AppContext::new(&config, store));
    let app = api::router(ctx);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "memory server listening at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
