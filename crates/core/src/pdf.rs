use std::io::Write;

use tempfile::NamedTempFile;

use crate::error::{CoreError, Result};

/// Extracts per-page text from raw PDF bytes. The bytes are spooled to a
/// temporary file because the extraction library reads from a path; the file
/// is removed on every exit path when the handle drops.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    if bytes.is_empty() {
        return Err(CoreError::InvalidInput("uploaded file is empty".to_string()));
    }
    let mut tmp = NamedTempFile::new()?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    let pages = pdf_extract::extract_text_by_pages(tmp.path())
        .map_err(|err| CoreError::PdfExtract(err.to_string()))?;
    Ok(pages)
}

/// Full document text: page texts joined with newlines.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let pages = extract_pdf_pages(bytes)?;
    let full_text = pages.join("\n");
    if full_text.trim().is_empty() {
        return Err(CoreError::EmptyDocument);
    }
    Ok(full_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(
            extract_pdf_text(&[]),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn garbage_bytes_fail_extraction() {
        assert!(matches!(
            extract_pdf_text(b"definitely not a pdf"),
            Err(CoreError::PdfExtract(_))
        ));
    }
}
