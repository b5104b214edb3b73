//! CLI `build` command: unzip the export if needed and build the memory table.

use anyhow::{bail, Result};

use crate::config::{expand_tilde, VesperConfig};
use crate::error::MemoryError;
use crate::memory::types::BuildOutcome;
use crate::server::{open_store, prepare_export};

pub async fn build(config: &VesperConfig) -> Result<()> {
    let config = config.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<BuildOutcome> {
        let store = open_store(&config)?;
        let source = prepare_export(
            &expand_tilde(&config.ingest.zip_path),
            &expand_tilde(&config.ingest.unzip_dir),
        )?;
        match store.build(&source) {
            Ok(outcome) => Ok(outcome),
            Err(MemoryError::NotFound(reason)) => bail!(
                "{reason}\nSet VESPER_ZIP_PATH or VESPER_UNZIP_DIR to point at your export"
            ),
            Err(e) => Err(e.into()),
        }
    })
    .await??;

    match outcome {
        BuildOutcome::AlreadyBuilt { entries } => {
            println!("Memory already built ({entries} entries). Nothing to do.");
        }
        BuildOutcome::Built {
            messages,
            chunks,
            placeholder,
            healed,
        } => {
            if healed {
                println!("Dropped an empty memory table left by an earlier run.");
            }
            if placeholder {
                println!("Export held no messages; wrote a placeholder entry.");
            } else {
                println!("Built memory: {messages} messages in {chunks} chunks.");
            }
        }
    }
    Ok(())
}
