//! Core data models used throughout Converse.
//!
//! These types flow through the processing pipeline (lines → chunks →
//! indexed chunks) and the conversation (messages, answers, Q/A pairs).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One line of text extracted from a PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLine {
    /// Position of the source document in the upload set.
    pub document_index: usize,
    /// 1-based page number.
    pub page_number: u32,
    /// 1-based line number within the page.
    pub line_number: u32,
    pub text: String,
}

impl ExtractedLine {
    pub fn reference(&self) -> LineRef {
        LineRef {
            document_index: self.document_index,
            page_number: self.page_number,
            line_number: self.line_number,
        }
    }
}

/// Where a piece of chunk text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRef {
    pub document_index: usize,
    pub page_number: u32,
    pub line_number: u32,
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {}, Line {}", self.page_number, self.line_number)
    }
}

/// A retrieval unit: trimmed text plus the lines folded into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub references: Vec<LineRef>,
}

impl TextChunk {
    /// `"Page P, Line L"` strings in fold order.
    pub fn reference_labels(&self) -> Vec<String> {
        self.references.iter().map(|r| r.to_string()).collect()
    }
}

/// Metadata stored next to every vector in the index.
///
/// `references` is what link construction reads; `references_display` is
/// the flattened form shown to humans and sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    pub references: Vec<LineRef>,
    pub references_display: String,
}

impl ChunkMetadata {
    pub fn from_references(references: &[LineRef]) -> Self {
        let references_display = references
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            references: references.to_vec(),
            references_display,
        }
    }

    /// Distinct `(document_index, page_number)` pairs in first-seen order.
    pub fn pages(&self) -> Vec<(usize, u32)> {
        let mut pages: Vec<(usize, u32)> = Vec::new();
        for r in &self.references {
            let key = (r.document_index, r.page_number);
            if !pages.contains(&key) {
                pages.push(key);
            }
        }
        pages
    }
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Result of one question through the conversational retriever.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub chat_history: Vec<ChatMessage>,
    pub source_documents: Vec<SourceDocument>,
}

/// A stored question with its formatted (HTML) answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaPair {
    pub user: String,
    pub bot: String,
}

/// An uploaded PDF, kept for page deep-links.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}
