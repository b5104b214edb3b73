//! Vector-store capability and its sqlite-vec implementation.
//!
//! A logical table `T` is stored as two SQLite tables joined by rowid:
//! `T` (id, text, created_at) holds the payload and `T_vec`, a `vec0`
//! virtual table, holds the embedding. The dimension of `T` is fixed at
//! creation and recorded in `schema_meta`.

use std::sync::Mutex;

use anyhow::{bail, ensure, Context, Result};
use rusqlite::{params, Connection};

use super::schema;

/// One row to persist: an L2-normalized vector and the text it was computed from.
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub vector: Vec<f32>,
    pub text: String,
}

/// Shape of an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub dimensions: usize,
    pub rows: u64,
}

/// A ranked nearest-neighbor hit.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub text: String,
    /// L2 distance between the query and the stored vector.
    pub distance: f64,
}

impl Neighbor {
    /// Cosine similarity, valid when both vectors are unit length.
    pub fn similarity(&self) -> f64 {
        1.0 - (self.distance * self.distance) / 2.0
    }
}

/// Persistent nearest-neighbor storage over named tables.
///
/// Implementations must tolerate `append` interleaved with `nearest` from
/// other threads. All methods are synchronous; async callers use
/// `tokio::task::spawn_blocking`.
pub trait VectorStore: Send + Sync {
    fn exists(&self, table: &str) -> Result<bool>;

    /// Table shape, or `None` when the table is missing or incomplete.
    fn open(&self, table: &str) -> Result<Option<TableInfo>>;

    /// Create `table` from `rows`. The first row fixes the dimension.
    fn create(&self, table: &str, rows: &[VectorRow]) -> Result<TableInfo>;

    /// Append rows to an existing table. Returns the number of rows written.
    fn append(&self, table: &str, rows: &[VectorRow]) -> Result<usize>;

    fn drop_table(&self, table: &str) -> Result<()>;

    /// Row count; zero when the table does not exist.
    fn count(&self, table: &str) -> Result<u64>;

    /// Top-`k` rows by ascending distance.
    fn nearest(&self, table: &str, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// [`VectorStore`] backed by a single SQLite connection with sqlite-vec loaded.
pub struct SqliteVecStore {
    conn: Mutex<Connection>,
}

impl SqliteVecStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (or create) the store at `path`.
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(super::open_database(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(super::open_memory_database()?))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
    }

    /// Run `f` with the underlying connection (metadata access from the CLI).
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    ensure!(
        !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "invalid table name {table:?}: only ASCII letters, digits and '_' are allowed"
    );
    Ok(())
}

fn sqlite_table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )
}

fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    if !sqlite_table_exists(conn, table)? {
        return Ok(0);
    }
    let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })?;
    Ok(n as u64)
}

fn insert_rows(conn: &Connection, table: &str, rows: &[VectorRow]) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut insert_text =
        conn.prepare(&format!("INSERT INTO \"{table}\" (text, created_at) VALUES (?1, ?2)"))?;
    let mut insert_vec = conn.prepare(&format!(
        "INSERT INTO \"{table}_vec\" (rowid, embedding) VALUES (?1, ?2)"
    ))?;
    for row in rows {
        insert_text.execute(params![row.text, now])?;
        let rowid = conn.last_insert_rowid();
        insert_vec.execute(params![rowid, embedding_to_bytes(&row.vector)])?;
    }
    Ok(())
}

fn check_dimensions(rows: &[VectorRow], dims: usize) -> Result<()> {
    if let Some(bad) = rows.iter().find(|r| r.vector.len() != dims) {
        bail!(
            "vector dimension mismatch: table expects {dims}, got {}",
            bad.vector.len()
        );
    }
    Ok(())
}

impl VectorStore for SqliteVecStore {
    fn exists(&self, table: &str) -> Result<bool> {
        validate_table_name(table)?;
        let conn = self.lock()?;
        Ok(sqlite_table_exists(&conn, table)?
            || sqlite_table_exists(&conn, &format!("{table}_vec"))?)
    }

    fn open(&self, table: &str) -> Result<Option<TableInfo>> {
        validate_table_name(table)?;
        let conn = self.lock()?;
        if !sqlite_table_exists(&conn, table)?
            || !sqlite_table_exists(&conn, &format!("{table}_vec"))?
        {
            return Ok(None);
        }
        let Some(dimensions) = schema::get_table_dimensions(&conn, table)? else {
            return Ok(None);
        };
        Ok(Some(TableInfo {
            name: table.to_string(),
            dimensions,
            rows: count_rows(&conn, table)?,
        }))
    }

    fn create(&self, table: &str, rows: &[VectorRow]) -> Result<TableInfo> {
        validate_table_name(table)?;
        let first = rows
            .first()
            .context("cannot create a vector table without at least one row")?;
        let dims = first.vector.len();
        ensure!(dims > 0, "cannot create a vector table with zero-length vectors");
        check_dimensions(rows, dims)?;

        let mut conn = self.lock()?;
        ensure!(
            !sqlite_table_exists(&conn, table)?,
            "table {table} already exists"
        );

        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "CREATE TABLE \"{table}\" (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE VIRTUAL TABLE \"{table}_vec\" USING vec0(
                embedding FLOAT[{dims}]
            );"
        ))?;
        schema::set_table_dimensions(&tx, table, dims)?;
        insert_rows(&tx, table, rows)?;
        tx.commit()?;

        tracing::info!(table, dims, rows = rows.len(), "vector table created");
        Ok(TableInfo {
            name: table.to_string(),
            dimensions: dims,
            rows: rows.len() as u64,
        })
    }

    fn append(&self, table: &str, rows: &[VectorRow]) -> Result<usize> {
        validate_table_name(table)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let dims = schema::get_table_dimensions(&conn, table)?
            .with_context(|| format!("table {table} does not exist"))?;
        check_dimensions(rows, dims)?;

        let tx = conn.transaction()?;
        insert_rows(&tx, table, rows)?;
        tx.commit()?;

        tracing::debug!(table, rows = rows.len(), "rows appended");
        Ok(rows.len())
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{table}_vec\";
             DROP TABLE IF EXISTS \"{table}\";"
        ))?;
        schema::clear_table_dimensions(&tx, table)?;
        tx.commit()?;
        tracing::info!(table, "vector table dropped");
        Ok(())
    }

    fn count(&self, table: &str) -> Result<u64> {
        validate_table_name(table)?;
        let conn = self.lock()?;
        count_rows(&conn, table)
    }

    fn nearest(&self, table: &str, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        validate_table_name(table)?;
        let conn = self.lock()?;
        let dims = schema::get_table_dimensions(&conn, table)?
            .with_context(|| format!("table {table} does not exist"))?;
        ensure!(
            vector.len() == dims,
            "query dimension mismatch: table expects {dims}, got {}",
            vector.len()
        );

        let mut stmt = conn.prepare(&format!(
            "WITH knn AS (
                SELECT rowid, distance FROM \"{table}_vec\"
                WHERE embedding MATCH ?1 AND k = ?2
            )
            SELECT m.text, knn.distance FROM knn
            JOIN \"{table}\" m ON m.id = knn.rowid
            ORDER BY knn.distance"
        ))?;
        let hits = stmt
            .query_map(params![embedding_to_bytes(vector), k as i64], |row| {
                Ok(Neighbor {
                    text: row.get(0)?,
                    distance: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
