use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("pdf extraction failed: {0}")]
    PdfExtract(String),
    #[error("document contains no extractable text")]
    EmptyDocument,
    #[error("model reply is not valid JSON: {0}")]
    MalformedReply(String),
    #[error("extracted metadata failed validation: {}", .issues.join("; "))]
    InvalidMetadata { issues: Vec<String> },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
