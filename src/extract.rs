//! PDF text extraction with page and line positions.
//!
//! Each uploaded document is parsed independently. A document that fails to
//! parse is reported as [`DocumentExtraction::Failed`] and the rest of the
//! batch continues; extraction never aborts the whole upload.

use thiserror::Error;

use crate::models::{ExtractedLine, UploadedDocument};

pub const MIME_PDF: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("PDF parser panicked: {0}")]
    Panicked(String),
}

/// Per-document extraction outcome.
#[derive(Debug)]
pub enum DocumentExtraction {
    Ok(Vec<ExtractedLine>),
    Failed {
        document_index: usize,
        reason: String,
    },
}

/// Turns one document's bytes into page texts, in page order.
pub type PageExtractor = fn(&[u8]) -> Result<Vec<String>, ExtractError>;

/// Page texts of one PDF, in page order.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Split page texts into line records. Pages and lines are numbered from 1.
///
/// A trailing newline does not produce an extra empty line; interior blank
/// lines are kept so line numbers match the page layout.
pub fn lines_from_pages(document_index: usize, pages: &[String]) -> Vec<ExtractedLine> {
    let mut lines = Vec::new();
    for (page_idx, page) in pages.iter().enumerate() {
        for (line_idx, text) in page.lines().enumerate() {
            lines.push(ExtractedLine {
                document_index,
                page_number: page_idx as u32 + 1,
                line_number: line_idx as u32 + 1,
                text: text.to_string(),
            });
        }
    }
    lines
}

pub fn extract_document(
    document_index: usize,
    bytes: &[u8],
    extractor: PageExtractor,
) -> DocumentExtraction {
    match extractor(bytes) {
        Ok(pages) => DocumentExtraction::Ok(lines_from_pages(document_index, &pages)),
        Err(e) => DocumentExtraction::Failed {
            document_index,
            reason: e.to_string(),
        },
    }
}

/// Extract every document on the blocking pool.
///
/// Runs each document in its own blocking task so a panic inside the PDF
/// parser only fails that document.
pub async fn extract_all(
    documents: &[UploadedDocument],
    extractor: PageExtractor,
) -> Vec<DocumentExtraction> {
    let mut outcomes = Vec::with_capacity(documents.len());
    for (index, doc) in documents.iter().enumerate() {
        let bytes = doc.bytes.clone();
        let task = tokio::task::spawn_blocking(move || extract_document(index, &bytes, extractor));
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(join_err) => DocumentExtraction::Failed {
                document_index: index,
                reason: ExtractError::Panicked(join_err.to_string()).to_string(),
            },
        };
        match &outcome {
            DocumentExtraction::Ok(lines) => {
                tracing::debug!(document = %doc.name, lines = lines.len(), "extracted document");
            }
            DocumentExtraction::Failed { reason, .. } => {
                tracing::warn!(document = %doc.name, %reason, "skipping unreadable document");
            }
        }
        outcomes.push(outcome);
    }
    outcomes
}
