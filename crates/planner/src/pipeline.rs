use anyhow::{anyhow, Context, Result};
use tracing::info;

use lessonforge_core::{
    extract_pdf_text, sanitize_name, ChunkConfig, Chunker, CurriculumMetadata,
};
use lessonforge_llm::ChatClient;
use lessonforge_rag::{ChunkInsert, EmbeddingClient, VectorIndex};

use crate::extractor::extract_metadata;
use crate::generator::generate_lesson_plan;
use crate::records::RecordStore;
use crate::session::Session;

pub const MAX_PLAN_DAYS: u32 = 100;

/// One user-triggered generation request, validated before any stage runs.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub file_name: String,
    pub pdf_bytes: Vec<u8>,
    pub grade: String,
    pub topic: String,
    pub days: u32,
}

impl PlanRequest {
    pub fn validate(&self) -> Result<()> {
        if self.pdf_bytes.is_empty() {
            return Err(anyhow!("a PDF file is required"));
        }
        if self.grade.trim().is_empty() {
            return Err(anyhow!("a class/grade label is required"));
        }
        if self.topic.trim().is_empty() {
            return Err(anyhow!("a topic is required"));
        }
        if self.days == 0 || self.days > MAX_PLAN_DAYS {
            return Err(anyhow!("days must be between 1 and {MAX_PLAN_DAYS}"));
        }
        Ok(())
    }
}

pub struct PipelineDeps {
    pub records: RecordStore,
    pub index: VectorIndex,
    pub embeddings: EmbeddingClient,
    pub chat: ChatClient,
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub record_id: String,
    pub collection: String,
    pub metadata: CurriculumMetadata,
    pub lesson_plan: String,
}

/// Runs the whole pipeline in strict sequence: PDF text extraction, metadata
/// extraction, chunk/embed/index, record insert, plan generation, record
/// update. Each stage returns early on failure and names itself in the error
/// chain; nothing downstream runs after a failing stage.
pub fn run_pipeline(deps: &PipelineDeps, request: &PlanRequest) -> Result<PlanOutcome> {
    request.validate()?;
    let mut session = Session::new();
    session
        .begin_generation()
        .map_err(|err| anyhow!(err.to_string()))?;
    match execute(deps, request) {
        Ok(outcome) => {
            session
                .generation_succeeded()
                .map_err(|err| anyhow!(err.to_string()))?;
            Ok(outcome)
        }
        Err(err) => {
            // Best effort: the session is request-scoped, so a failed reset
            // has nothing further to corrupt.
            let _ = session.generation_failed();
            Err(err)
        }
    }
}

fn execute(deps: &PipelineDeps, request: &PlanRequest) -> Result<PlanOutcome> {
    let full_text = extract_pdf_text(&request.pdf_bytes).context("pdf extraction failed")?;
    info!(chars = full_text.len(), "extracted document text");

    let mut metadata = extract_metadata(&deps.chat, &full_text, &request.grade)
        .context("metadata extraction failed")?;
    metadata.duration = format!("{} days", request.days);

    let collection = index_document(deps, &request.file_name, &full_text)
        .context("document indexing failed")?;

    let record_id = deps
        .records
        .insert(&request.grade, &request.topic, &metadata)
        .context("failed to persist extracted metadata")?;

    let lesson_plan = generate_lesson_plan(
        &deps.chat,
        &deps.index,
        &deps.embeddings,
        &collection,
        &request.grade,
        &request.topic,
        request.days,
    )
    .context("lesson plan generation failed")?;

    deps.records
        .update_plan(&record_id, &lesson_plan)
        .context("failed to persist lesson plan")?;

    Ok(PlanOutcome {
        record_id,
        collection,
        metadata,
        lesson_plan,
    })
}

/// Chunks, embeds, and indexes the document under a collection named from the
/// sanitized filename. Returns the collection name.
fn index_document(deps: &PipelineDeps, file_name: &str, full_text: &str) -> Result<String> {
    let mut collection = sanitize_name(file_name);
    if collection.is_empty() {
        collection = "document".to_string();
    }
    let chunks = Chunker::new(ChunkConfig::default()).split(full_text);
    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = deps.embeddings.embed_batch(&texts)?;
    let inserts: Vec<ChunkInsert> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| ChunkInsert {
            chunk_id: chunk.id,
            ordinal: chunk.ordinal,
            text: chunk.text,
            embedding,
        })
        .collect();
    let collection_id = deps.index.ensure_collection(&collection)?;
    let stored = deps.index.add_chunks(collection_id, &inserts)?;
    info!(collection = %collection, total = inserts.len(), stored, "indexed document");
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlanRequest {
        PlanRequest {
            file_name: "unit.pdf".to_string(),
            pdf_bytes: vec![1],
            grade: "Grade 5".to_string(),
            topic: "Fractions".to_string(),
            days: 2,
        }
    }

    #[test]
    fn validation_accepts_a_complete_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn validation_rejects_missing_fields() {
        let mut missing_file = request();
        missing_file.pdf_bytes.clear();
        assert!(missing_file.validate().is_err());

        let mut missing_grade = request();
        missing_grade.grade = "  ".to_string();
        assert!(missing_grade.validate().is_err());

        let mut missing_topic = request();
        missing_topic.topic.clear();
        assert!(missing_topic.validate().is_err());
    }

    #[test]
    fn validation_bounds_the_day_count() {
        let mut zero = request();
        zero.days = 0;
        assert!(zero.validate().is_err());

        let mut too_many = request();
        too_many.days = 101;
        assert!(too_many.validate().is_err());

        let mut max = request();
        max.days = 100;
        assert!(max.validate().is_ok());
    }
}
