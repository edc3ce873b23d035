//! SQLite vector store backend.
//!
//! Each tenant gets its own lazily created table named after the hex-encoded
//! tenant key, so arbitrary tenant identities form valid SQL identifiers and
//! collections stay physically separate. Similarity search runs through the
//! `sqlite-vec` extension's `vec_distance_cosine`.

use std::fmt::Write as _;
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, ffi};

use super::{ChunkRecord, ScoredChunk, VectorStore};
use crate::types::{DocumentId, PipelineError, TenantKey};

/// SQLite-backed [`VectorStore`] using `sqlite-vec` for cosine search.
#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
}

impl SqliteChunkStore {
    /// Opens (or creates) a store at the given path and verifies that the
    /// `sqlite-vec` extension is available.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        Self::verify_extension(&conn).await?;
        Ok(Self { conn })
    }

    /// Opens a transient in-memory store, mostly for tests.
    pub async fn in_memory() -> Result<Self, PipelineError> {
        register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        Self::verify_extension(&conn).await?;
        Ok(Self { conn })
    }

    async fn verify_extension(conn: &Connection) -> Result<(), PipelineError> {
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map(|_| ())
        .map_err(|err| PipelineError::Store(err.to_string()))
    }

    /// Creates the tenant's table if it does not exist yet and returns its
    /// name.
    async fn ensure_collection(&self, tenant: &TenantKey) -> Result<String, PipelineError> {
        let table = collection_table(tenant);
        let table_for_call = table.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {table_for_call} (
                            id TEXT PRIMARY KEY,
                            doc_id INTEGER NOT NULL,
                            content TEXT NOT NULL,
                            inserted_at TEXT NOT NULL,
                            embedding TEXT
                        )"
                    ),
                    [],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                conn.execute(
                    &format!(
                        "CREATE INDEX IF NOT EXISTS idx_{table_for_call}_doc_id \
                         ON {table_for_call}(doc_id)"
                    ),
                    [],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))?;
        Ok(table)
    }

    /// Whether the tenant's collection exists. Read paths treat a missing
    /// collection as empty rather than creating it.
    async fn collection_exists(&self, tenant: &TenantKey) -> Result<bool, PipelineError> {
        let table = collection_table(tenant);
        self.conn
            .call(move |conn| {
                let exists = conn
                    .query_row(
                        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                        [&table],
                        |_| Ok(()),
                    )
                    .is_ok();
                Ok(exists)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| PipelineError::Store(err.to_string()))
    }
}

/// Table name for a tenant: `chunks_` plus the hex-encoded key bytes.
fn collection_table(tenant: &TenantKey) -> String {
    let mut name = String::with_capacity(7 + tenant.as_str().len() * 2);
    name.push_str("chunks_");
    for byte in tenant.as_str().bytes() {
        // Writing hex digits to a String cannot fail.
        let _ = write!(name, "{byte:02x}");
    }
    name
}

#[async_trait]
impl VectorStore for SqliteChunkStore {
    async fn insert_chunks(
        &self,
        tenant: &TenantKey,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), PipelineError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let table = self.ensure_collection(tenant).await?;

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                {
                    let mut stmt = tx
                        .prepare(&format!(
                            "INSERT OR REPLACE INTO {table} \
                             (id, doc_id, content, inserted_at, embedding) \
                             VALUES (?, ?, ?, ?, ?)"
                        ))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for chunk in &chunks {
                        let embedding = chunk
                            .embedding
                            .as_ref()
                            .map(|vector| serde_json::to_string(vector).unwrap_or_default());
                        stmt.execute((
                            &chunk.id,
                            chunk.doc_id,
                            &chunk.content,
                            chunk.inserted_at.to_rfc3339(),
                            embedding,
                        ))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn chunks_by_document(
        &self,
        tenant: &TenantKey,
        doc: DocumentId,
    ) -> Result<Vec<ChunkRecord>, PipelineError> {
        if !self.collection_exists(tenant).await? {
            return Ok(Vec::new());
        }
        let table = collection_table(tenant);

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, doc_id, content, inserted_at, embedding \
                         FROM {table} WHERE doc_id = ?"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([doc], |row| {
                        let inserted_at: String = row.get(3)?;
                        let embedding: Option<String> = row.get(4)?;
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            doc_id: row.get(1)?,
                            content: row.get(2)?,
                            inserted_at: DateTime::parse_from_rfc3339(&inserted_at)
                                .map(|dt| dt.with_timezone(&Utc))
                                .unwrap_or_default(),
                            embedding: embedding
                                .and_then(|raw| serde_json::from_str(&raw).ok()),
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(records)
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn search_similar(
        &self,
        tenant: &TenantKey,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        if !self.collection_exists(tenant).await? {
            return Ok(Vec::new());
        }
        let table = collection_table(tenant);
        let query_json =
            serde_json::to_string(query).map_err(|err| PipelineError::Store(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, doc_id, content, inserted_at, embedding, \
                         vec_distance_cosine(vec_f32(embedding), vec_f32(?)) AS distance \
                         FROM {table} \
                         WHERE embedding IS NOT NULL \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([&query_json], |row| {
                        let inserted_at: String = row.get(3)?;
                        let embedding: Option<String> = row.get(4)?;
                        let distance: f32 = row.get(5)?;
                        Ok(ScoredChunk {
                            record: ChunkRecord {
                                id: row.get(0)?,
                                doc_id: row.get(1)?,
                                content: row.get(2)?,
                                inserted_at: DateTime::parse_from_rfc3339(&inserted_at)
                                    .map(|dt| dt.with_timezone(&Utc))
                                    .unwrap_or_default(),
                                embedding: embedding
                                    .and_then(|raw| serde_json::from_str(&raw).ok()),
                            },
                            // Cosine distance to similarity.
                            score: 1.0 - distance,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(hits)
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn delete_chunks(
        &self,
        tenant: &TenantKey,
        ids: &[String],
    ) -> Result<usize, PipelineError> {
        if ids.is_empty() || !self.collection_exists(tenant).await? {
            return Ok(0);
        }
        let table = collection_table(tenant);
        let ids = ids.to_vec();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut removed = 0usize;
                {
                    let mut stmt = tx
                        .prepare(&format!("DELETE FROM {table} WHERE id = ?"))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for id in &ids {
                        removed += stmt
                            .execute([id])
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(removed)
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }

    async fn count(&self, tenant: &TenantKey) -> Result<usize, PipelineError> {
        if !self.collection_exists(tenant).await? {
            return Ok(0);
        }
        let table = collection_table(tenant);

        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| PipelineError::Store(err.to_string()))
    }
}

/// Registers `sqlite-vec` as an auto-loaded extension, once per process.
fn register_sqlite_vec() -> Result<(), PipelineError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *const c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(PipelineError::Store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_valid_identifiers_for_any_tenant() {
        let table = collection_table(&TenantKey::new("user@example.com; DROP TABLE"));
        assert!(table.starts_with("chunks_"));
        assert!(
            table[7..].chars().all(|c| c.is_ascii_hexdigit()),
            "non-hex in {table}"
        );
    }

    #[test]
    fn distinct_tenants_get_distinct_tables() {
        assert_ne!(
            collection_table(&TenantKey::new("alice")),
            collection_table(&TenantKey::new("bob"))
        );
    }
}
