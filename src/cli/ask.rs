//! CLI `ask` command: answer a query with retrieved memory as context.

use anyhow::Result;

use crate::config::VesperConfig;
use crate::error::MemoryError;
use crate::generation::{self, LlamaServerGenerator};

pub async fn ask(config: &VesperConfig, query: &str, k: Option<usize>) -> Result<()> {
    let context = if config.retrieval.enabled {
        match super::search::lookup(config, query, k).await {
            Ok(hits) => {
                tracing::info!(hits = hits.len(), "retrieved memory context");
                generation::context_from_hits(&hits)
            }
            Err(e) if matches!(e.downcast_ref::<MemoryError>(), Some(MemoryError::NotReady(_))) => {
                tracing::warn!("memory not built yet, answering without context");
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    let generator = LlamaServerGenerator::new(&config.generation);
    let text = generation::answer(
        &generator,
        query,
        context.as_deref(),
        config.generation.max_tokens,
    )
    .await?;

    println!("{text}");
    Ok(())
}
