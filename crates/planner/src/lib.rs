pub mod config;
pub mod extractor;
pub mod generator;
pub mod pipeline;
pub mod records;
pub mod session;

pub use config::PlannerConfig;
pub use extractor::extract_metadata;
pub use generator::generate_lesson_plan;
pub use pipeline::{run_pipeline, PipelineDeps, PlanOutcome, PlanRequest};
pub use records::{PlanRecord, RecordStore};
pub use session::{Phase, Session, SessionError};
