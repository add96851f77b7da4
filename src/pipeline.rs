//! The Process action: uploads in, ready-to-ask conversation out.
//!
//! ```text
//! uploads ──▶ extract (blocking pool) ──▶ chunk ──▶ embed + index ──▶ retriever
//! ```
//!
//! Unreadable documents are skipped and listed in [`ProcessReport::failures`].
//! If nothing readable is left the run stops with [`ProcessError::NoContent`]
//! before any network call is made.

use std::sync::Arc;
use thiserror::Error;

use crate::chunk::chunk_lines;
use crate::config::Config;
use crate::conversation::ConversationalRetriever;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::extract::{extract_all, DocumentExtraction, PageExtractor};
use crate::index::VectorIndex;
use crate::llm::{create_chat_model, ChatModel};
use crate::models::{TextChunk, UploadedDocument};
use crate::progress::{ProcessProgressEvent, ProcessProgressReporter};

/// The two remote models a conversation needs.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn ChatModel>,
}

impl Providers {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            embedder: create_provider(&config.embedding)?,
            llm: create_chat_model(&config.llm)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub name: String,
    pub reason: String,
}

/// What one Process run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub documents: usize,
    pub failures: Vec<DocumentFailure>,
    pub lines: usize,
    pub chunks: usize,
}

impl ProcessReport {
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Processed {} document(s): {} lines, {} chunks.",
            self.documents - self.failures.len(),
            self.lines,
            self.chunks
        );
        for failure in &self.failures {
            s.push_str(&format!(" Skipped {}: {}.", failure.name, failure.reason));
        }
        s
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("No content found to process.")]
    NoContent { report: ProcessReport },
    #[error("indexing failed: {message}")]
    Indexing { message: String },
}

/// Extract and chunk `uploads`. No network access.
pub async fn prepare_chunks(
    uploads: &[UploadedDocument],
    min_chars: usize,
    extractor: PageExtractor,
    progress: &dyn ProcessProgressReporter,
) -> (Vec<TextChunk>, ProcessReport) {
    for doc in uploads {
        progress.report(ProcessProgressEvent::Extracting {
            document: doc.name.clone(),
        });
    }

    let mut report = ProcessReport {
        documents: uploads.len(),
        ..ProcessReport::default()
    };
    let mut lines = Vec::new();
    for outcome in extract_all(uploads, extractor).await {
        match outcome {
            DocumentExtraction::Ok(doc_lines) => lines.extend(doc_lines),
            DocumentExtraction::Failed {
                document_index,
                reason,
            } => report.failures.push(DocumentFailure {
                name: uploads
                    .get(document_index)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| format!("document {}", document_index + 1)),
                reason,
            }),
        }
    }

    let chunks = chunk_lines(&lines, min_chars);
    report.lines = lines.len();
    report.chunks = chunks.len();
    progress.report(ProcessProgressEvent::Chunked {
        chunks: chunks.len() as u64,
    });
    (chunks, report)
}

/// Run the full Process action and return a fresh retriever.
pub async fn process_documents(
    config: &Config,
    providers: &Providers,
    extractor: PageExtractor,
    uploads: &[UploadedDocument],
    progress: &dyn ProcessProgressReporter,
) -> Result<(ConversationalRetriever, ProcessReport), ProcessError> {
    let (chunks, report) =
        prepare_chunks(uploads, config.chunking.min_chars, extractor, progress).await;
    if chunks.is_empty() {
        tracing::warn!(documents = report.documents, "no content found to process");
        return Err(ProcessError::NoContent { report });
    }

    let total = chunks.len() as u64;
    let index = VectorIndex::build(
        providers.embedder.as_ref(),
        &chunks,
        config.embedding.batch_size,
        |n| {
            progress.report(ProcessProgressEvent::Embedding {
                n: n as u64,
                total,
            })
        },
    )
    .await
    .map_err(|e| ProcessError::Indexing {
        message: format!("{:#}", e),
    })?;

    tracing::info!(
        documents = report.documents,
        skipped = report.failures.len(),
        chunks = report.chunks,
        model = index.model(),
        "index built"
    );
    progress.report(ProcessProgressEvent::Ready);

    let retriever = ConversationalRetriever::new(
        index,
        providers.embedder.clone(),
        providers.llm.clone(),
        config.retrieval.top_k,
    );
    Ok((retriever, report))
}
