use super::{ExtractError, PdfTextExtractor};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// PDF text extraction backed by the pure-Rust `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractEngine;

impl PdfTextExtractor for PdfExtractEngine {
    fn extract_pdf_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        // pdf-extract panics on some malformed documents instead of returning an error.
        let pages = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }))
        .map_err(|_| ExtractError::CorruptPdf("PDF parser aborted".to_string()))?
        .map_err(|e| ExtractError::CorruptPdf(e.to_string()))?;

        debug!("pdf-extract returned {} pages", pages.len());
        Ok(join_pages(pages.iter().map(String::as_str)))
    }
}

/// Concatenates pages in order, terminating each with a newline.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(page);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pages_contribute_only_the_separator() {
        let text = join_pages(["first", "", "third"]);
        assert_eq!(text, "first\n\nthird\n");
    }

    #[test]
    fn garbage_bytes_are_reported_as_corrupt() {
        let err = PdfExtractEngine
            .extract_pdf_text(b"definitely not a pdf")
            .unwrap_err();
        assert!(matches!(err, ExtractError::CorruptPdf(_)));
    }
}
