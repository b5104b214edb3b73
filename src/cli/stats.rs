//! CLI `stats` command: what the memory database holds, without loading the
//! embedding model.

use anyhow::Result;
use std::path::Path;

use crate::config::VesperConfig;
use crate::db::schema;
use crate::db::vector::{SqliteVecStore, TableInfo, VectorStore};

#[derive(Debug)]
pub struct MemoryStats {
    pub table: Option<TableInfo>,
    pub schema_version: u32,
    pub stored_model: Option<String>,
    pub file_size: u64,
}

pub fn gather(vectors: &SqliteVecStore, table: &str, db_path: &Path) -> Result<MemoryStats> {
    let table = vectors.open(table)?;
    let (schema_version, stored_model) = vectors.with_connection(|conn| {
        Ok((
            schema::get_schema_version(conn)?,
            schema::get_embedding_model(conn)?,
        ))
    })?;
    let file_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    Ok(MemoryStats {
        table,
        schema_version,
        stored_model,
        file_size,
    })
}

/// Display memory statistics in the terminal.
pub fn stats(config: &VesperConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `vesper-memory build` to create it.");
        return Ok(());
    }

    let vectors = SqliteVecStore::open_path(&db_path)?;
    let stats = gather(&vectors, &config.storage.table, &db_path)?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Database:            {}", db_path.display());
    println!("  File size:           {}", format_bytes(stats.file_size));
    println!("  Schema version:      {}", stats.schema_version);
    println!();

    match &stats.table {
        Some(info) => {
            println!("  Table:               {}", info.name);
            println!("  Entries:             {}", info.rows);
            println!("  Dimensions:          {}", info.dimensions);
        }
        None => println!("  Table '{}' not built yet", config.storage.table),
    }
    println!();

    println!(
        "  Embedding model:     {}",
        stats.stored_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Configured model:    {}", config.embedding.model);
    if let Some(stored) = &stats.stored_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch! Run `vesper-memory reset` and rebuild.");
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
