//! PDF text extraction, one entry per page.

use std::path::Path;

use qvrag_core::{Error, Result};

/// Extract the text of every page in order. Pages without extractable text
/// (scanned images, blank pages) come back as empty strings.
pub fn load_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
        Error::InvalidInput(format!("failed to extract text from {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_pdf_pages(Path::new("/nonexistent/qvrag/doc.pdf")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn garbage_bytes_are_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(matches!(load_pdf_pages(&path), Err(Error::InvalidInput(_))));
    }
}
