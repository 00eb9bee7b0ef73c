use anyhow::Result;

use crate::embedding::EmbeddingClient;
use crate::index::{ScoredChunk, VectorIndex};

/// Context retrieved for a query: the chunks in rank order plus their texts
/// joined with blank lines, ready to interpolate into a prompt.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub chunks: Vec<ScoredChunk>,
    pub text: String,
}

pub fn retrieve_context(
    index: &VectorIndex,
    embeddings: &EmbeddingClient,
    collection: &str,
    query: &str,
    top_k: usize,
) -> Result<RetrievedContext> {
    let query_embedding = embeddings.embed(query)?;
    let chunks = index.search(collection, &query_embedding, top_k)?;
    let text = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(RetrievedContext { chunks, text })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkInsert;
    use lessonforge_core::chunk_id;
    use tempfile::tempdir;

    #[test]
    fn retrieval_joins_chunk_texts_in_rank_order() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite")).unwrap();
        let embeddings = EmbeddingClient::hash();
        let id = index.ensure_collection("unit").unwrap();
        let texts = [
            "Fractions name equal parts of a whole.",
            "A denominator counts the parts in the whole.",
            "The French Revolution began in 1789.",
        ];
        let vectors = embeddings
            .embed_batch(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .unwrap();
        let inserts: Vec<ChunkInsert> = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(ordinal, (text, embedding))| ChunkInsert {
                chunk_id: chunk_id(text),
                ordinal,
                text: text.to_string(),
                embedding,
            })
            .collect();
        index.add_chunks(id, &inserts).unwrap();

        let retrieved =
            retrieve_context(&index, &embeddings, "unit", "parts of a whole fractions", 2)
                .unwrap();
        assert_eq!(retrieved.chunks.len(), 2);
        assert!(retrieved.text.contains("equal parts"));
        assert!(!retrieved.text.contains("French Revolution"));
    }

    #[test]
    fn repeated_retrieval_is_deterministic() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("index.sqlite")).unwrap();
        let embeddings = EmbeddingClient::hash();
        let id = index.ensure_collection("unit").unwrap();
        let text = "stable ordering check".to_string();
        let embedding = embeddings.embed(&text).unwrap();
        index
            .add_chunks(
                id,
                &[ChunkInsert {
                    chunk_id: chunk_id(&text),
                    ordinal: 0,
                    text,
                    embedding,
                }],
            )
            .unwrap();
        let first = retrieve_context(&index, &embeddings, "unit", "ordering", 5).unwrap();
        let second = retrieve_context(&index, &embeddings, "unit", "ordering", 5).unwrap();
        assert_eq!(first.text, second.text);
    }
}
