//! CLI `reset` command: drop the memory table so the next build starts over.

use anyhow::{bail, Result};
use std::io::Write;

use crate::config::VesperConfig;
use crate::db::schema;
use crate::db::vector::{SqliteVecStore, VectorStore};

/// Drop `table` and forget the recorded embedding model. Returns the number
/// of entries that were removed.
pub fn reset_memory(vectors: &SqliteVecStore, table: &str) -> Result<u64> {
    let removed = vectors.count(table)?;
    vectors.drop_table(table)?;
    vectors.with_connection(|conn| Ok(schema::clear_embedding_model(conn)?))?;
    Ok(removed)
}

/// Delete all memory after user confirmation (skipped with `yes`).
pub fn reset(config: &VesperConfig, yes: bool) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !yes {
        println!("WARNING: This will permanently delete the '{}' memory table.", config.storage.table);
        println!("Database: {}", db_path.display());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    let vectors = SqliteVecStore::open_path(&db_path)?;
    let removed = reset_memory(&vectors, &config.storage.table)?;

    println!("Removed {removed} memory entries. Run `vesper-memory build` to rebuild.");
    Ok(())
}
