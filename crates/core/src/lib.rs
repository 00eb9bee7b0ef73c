mod chunk;
mod embed;
mod error;
mod metadata;
mod pdf;
mod sanitize;

pub use chunk::{chunk_id, Chunk, ChunkConfig, Chunker};
pub use embed::{HashEmbedder, HashEmbedderConfig};
pub use error::{CoreError, Result};
pub use metadata::{
    parse_metadata_reply, validate_metadata, Assessment, CurriculumMetadata, MaterialSet, Standard,
};
pub use pdf::{extract_pdf_pages, extract_pdf_text};
pub use sanitize::sanitize_name;
