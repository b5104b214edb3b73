//! Store-wide metadata.
//!
//! Vector tables are created on demand by [`super::vector::SqliteVecStore`];
//! the only fixed table is `schema_meta`, a key/value map holding the schema
//! version, the embedding model that produced the stored vectors, and the
//! vector dimension of each logical table.

use rusqlite::{params, Connection, OptionalExtension};

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize the metadata table. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(get_meta(conn, "schema_version")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    set_meta(conn, "embedding_model", model)
}

/// Forget the stored embedding model so the next start records the configured one.
pub fn clear_embedding_model(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_meta WHERE key = 'embedding_model'", [])?;
    Ok(())
}

fn dims_key(table: &str) -> String {
    format!("table_dims:{table}")
}

pub fn get_table_dimensions(conn: &Connection, table: &str) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, &dims_key(table))?.and_then(|v| v.parse().ok()))
}

pub fn set_table_dimensions(conn: &Connection, table: &str, dims: usize) -> rusqlite::Result<()> {
    set_meta(conn, &dims_key(table), &dims.to_string())
}

pub fn clear_table_dimensions(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_meta WHERE key = ?1", [dims_key(table)])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = test_db();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn sqlite_vec_is_registered() {
        let conn = test_db();
        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn set_and_get_embedding_model() {
        let conn = test_db();
        assert!(get_embedding_model(&conn).unwrap().is_none());

        set_embedding_model(&conn, "BAAI/bge-large-en-v1.5").unwrap();
        set_embedding_model(&conn, "BAAI/bge-small-en-v1.5").unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some("BAAI/bge-small-en-v1.5".to_string())
        );

        clear_embedding_model(&conn).unwrap();
        assert!(get_embedding_model(&conn).unwrap().is_none());
    }

    #[test]
    fn table_dimensions_roundtrip_and_clear() {
        let conn = test_db();
        set_table_dimensions(&conn, "memory", 1024).unwrap();
        assert_eq!(get_table_dimensions(&conn, "memory").unwrap(), Some(1024));
        assert_eq!(get_table_dimensions(&conn, "other").unwrap(), None);

        clear_table_dimensions(&conn, "memory").unwrap();
        assert_eq!(get_table_dimensions(&conn, "memory").unwrap(), None);
    }
}
