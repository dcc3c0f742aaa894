//! PDF text extraction.
//!
//! Thin wrapper over the `pdf-extract` crate that maps its failures onto
//! the Docent error taxonomy. Only readable PDFs are accepted; everything
//! else is an `UnsupportedFormat` before the extractor ever runs.

use std::path::Path;

use tracing::debug;

use docent_core::error::{DocentError, Result};

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Extract the full text of a PDF document from its raw bytes.
///
/// Returns `UnsupportedFormat` when the payload is not a PDF and
/// `Extraction` when the document is a PDF but cannot be read.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(DocentError::UnsupportedFormat(
            "expected a PDF document".to_string(),
        ));
    }

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DocentError::Extraction(format!("PDF extraction failed: {}", e)))?;

    debug!(bytes = bytes.len(), chars = text.len(), "PDF text extracted");
    Ok(text)
}

/// Extract the full text of a PDF document from a file path.
pub fn extract_text_from_path(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    extract_text(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_pdf_bytes_rejected() {
        let err = extract_text(b"hello, plain text").unwrap_err();
        assert!(matches!(err, DocentError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let err = extract_text(b"").unwrap_err();
        assert!(matches!(err, DocentError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_truncated_pdf_is_extraction_error() {
        // Correct magic but no document body behind it.
        let err = extract_text(b"%PDF-1.7\n").unwrap_err();
        assert!(matches!(err, DocentError::Extraction(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = extract_text_from_path(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, DocentError::Io(_)));
    }
}
