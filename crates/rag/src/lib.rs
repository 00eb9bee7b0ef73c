pub mod embedding;
pub mod index;
pub mod retriever;

pub use embedding::{EmbeddingBackend, EmbeddingClient};
pub use index::{ChunkInsert, ScoredChunk, VectorIndex};
pub use retriever::{retrieve_context, RetrievedContext};
