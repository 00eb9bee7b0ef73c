use anyhow::Result;
use bytemuck::cast_slice;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

/// SQLite-backed vector index. One collection per source document (named by
/// the sanitized filename); chunk rows carry the content-addressed id, the
/// original text, and the embedding as a little-endian f32 blob.
#[derive(Clone)]
pub struct VectorIndex {
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ChunkInsert {
    pub chunk_id: String,
    pub ordinal: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub ordinal: usize,
    pub text: String,
    pub score: f32,
}

impl VectorIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let index = Self {
            path: path.as_ref().to_path_buf(),
        };
        index.init()?;
        Ok(index)
    }

    // Connections are opened per operation rather than pooled.
    fn connection(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS collections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection_id INTEGER NOT NULL,
                chunk_id TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(collection_id, chunk_id),
                FOREIGN KEY(collection_id) REFERENCES collections(id)
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_collection(&self, name: &str) -> Result<i64> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id FROM collections WHERE name = ?1")?;
        if let Some(id) = stmt.query_row([name], |row| row.get(0)).optional()? {
            return Ok(id);
        }
        conn.execute("INSERT INTO collections (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    /// Removes a collection and its chunks. The explicit destroy half of the
    /// index lifecycle; growth is otherwise bounded only by uploads.
    pub fn drop_collection(&self, name: &str) -> Result<bool> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id FROM collections WHERE name = ?1")?;
        let Some(id) = stmt
            .query_row([name], |row| row.get::<_, i64>(0))
            .optional()?
        else {
            return Ok(false);
        };
        conn.execute("DELETE FROM chunks WHERE collection_id = ?1", params![id])?;
        conn.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        Ok(true)
    }

    /// Inserts chunks, deduplicating by content id: a chunk whose id already
    /// exists in the collection is skipped. Returns the number stored.
    pub fn add_chunks(&self, collection_id: i64, chunks: &[ChunkInsert]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let mut stored = 0usize;
        for chunk in chunks {
            let blob = cast_slice::<f32, u8>(&chunk.embedding);
            let changed = tx.execute(
                "INSERT OR IGNORE INTO chunks (collection_id, chunk_id, ordinal, text, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![collection_id, chunk.chunk_id, chunk.ordinal as i64, chunk.text, blob],
            )?;
            stored += changed;
        }
        tx.commit()?;
        debug!(collection_id, total = chunks.len(), stored, "indexed chunks");
        Ok(stored)
    }

    /// Full-scan cosine search over the collection, descending score, ties
    /// kept in insertion order, truncated to `top_k`.
    pub fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT chunks.chunk_id, chunks.ordinal, chunks.text, chunks.embedding
            FROM chunks
            JOIN collections ON chunks.collection_id = collections.id
            WHERE collections.name = ?1
            ORDER BY chunks.id
            "#,
        )?;
        let mut rows = stmt.query([collection])?;
        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(3)?;
            let embedding = decode_embedding(&blob);
            let score = cosine_similarity(query_embedding, &embedding);
            hits.push(ScoredChunk {
                chunk_id: row.get(0)?,
                ordinal: row.get::<_, i64>(1)? as usize,
                text: row.get(2)?,
                score,
            });
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

// Decoded explicitly rather than cast, since a blob read back from SQLite
// carries no alignment guarantee for f32.
fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonforge_core::chunk_id;
    use tempfile::tempdir;

    fn insert(text: &str, ordinal: usize, embedding: Vec<f32>) -> ChunkInsert {
        ChunkInsert {
            chunk_id: chunk_id(text),
            ordinal,
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn duplicate_content_collapses_to_one_row() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite")).unwrap();
        let id = index.ensure_collection("unit").unwrap();
        let stored = index
            .add_chunks(
                id,
                &[
                    insert("repeated paragraph", 0, vec![1.0, 0.0]),
                    insert("repeated paragraph", 1, vec![1.0, 0.0]),
                    insert("unique paragraph", 2, vec![0.0, 1.0]),
                ],
            )
            .unwrap();
        assert_eq!(stored, 2);
    }

    #[test]
    fn search_ranks_by_cosine_and_truncates() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite")).unwrap();
        let id = index.ensure_collection("unit").unwrap();
        index
            .add_chunks(
                id,
                &[
                    insert("about fractions", 0, vec![1.0, 0.0, 0.0]),
                    insert("about geometry", 1, vec![0.0, 1.0, 0.0]),
                    insert("about history", 2, vec![0.0, 0.0, 1.0]),
                ],
            )
            .unwrap();
        let hits = index.search("unit", &[0.9, 0.1, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "about fractions");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn repeated_queries_return_identical_results() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite")).unwrap();
        let id = index.ensure_collection("unit").unwrap();
        index
            .add_chunks(
                id,
                &[
                    insert("alpha", 0, vec![0.5, 0.5]),
                    insert("beta", 1, vec![0.5, 0.5]),
                    insert("gamma", 2, vec![0.1, 0.9]),
                ],
            )
            .unwrap();
        let first = index.search("unit", &[0.5, 0.5], 3).unwrap();
        let second = index.search("unit", &[0.5, 0.5], 3).unwrap();
        let order = |hits: &[ScoredChunk]| hits.iter().map(|h| h.ordinal).collect::<Vec<_>>();
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn drop_collection_removes_rows() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite")).unwrap();
        let id = index.ensure_collection("stale").unwrap();
        index
            .add_chunks(id, &[insert("old content", 0, vec![1.0])])
            .unwrap();
        assert!(index.drop_collection("stale").unwrap());
        assert!(index.search("stale", &[1.0], 5).unwrap().is_empty());
        assert!(!index.drop_collection("stale").unwrap());
    }
}
