//! Source references appended to every answer.
//!
//! Precedence: a full refusal wins, then a partial refusal, and only a
//! normal answer gets page links. Link construction is best effort: a
//! reference that cannot be resolved becomes an inline error entry and the
//! rest of the answer is unaffected.
//!
//! Links either point at the server's `/documents/{index}` route or embed
//! the whole PDF as a `data:` URL, per [`LinkStyle`].

use base64::Engine;

use crate::config::LinkStyle;
use crate::models::{SourceDocument, UploadedDocument};
use crate::refusal::Refusal;

pub const ACCESS_RESTRICTED: &str = "No references found due to access restrictions.";
pub const PARTIAL_LIMITATION: &str =
    "Some information may not be available due to access limitations.";
pub const NONE_FOUND: &str = "No references found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceEntry {
    Link {
        document_index: usize,
        page_number: u32,
        href: String,
    },
    Error {
        page_number: u32,
        message: String,
    },
}

impl ReferenceEntry {
    pub fn label(&self) -> String {
        match self {
            ReferenceEntry::Link { page_number, .. } => format!("Page {}", page_number),
            ReferenceEntry::Error {
                page_number,
                message,
            } => format!("Error generating link for page {}: {}", page_number, message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum References {
    AccessRestricted,
    PartialLimitation,
    Entries(Vec<ReferenceEntry>),
    NoneFound,
}

/// `data:` URL embedding the whole PDF, suitable for `href`.
pub fn pdf_data_url(bytes: &[u8]) -> String {
    format!(
        "data:application/pdf;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn page_link(
    uploads: &[UploadedDocument],
    document_index: usize,
    page_number: u32,
    style: LinkStyle,
) -> Result<String, String> {
    let doc = uploads
        .get(document_index)
        .ok_or_else(|| format!("no uploaded document at index {}", document_index))?;
    if doc.bytes.is_empty() {
        return Err(format!("uploaded document '{}' is empty", doc.name));
    }
    let target = match style {
        LinkStyle::Route => format!("/documents/{}", document_index),
        LinkStyle::Inline => pdf_data_url(&doc.bytes),
    };
    Ok(format!("{}#page={}", target, page_number))
}

/// One entry per distinct `(document, page)` across `sources`, first-seen order.
pub fn build_references(
    refusal: Refusal,
    sources: &[SourceDocument],
    uploads: &[UploadedDocument],
    style: LinkStyle,
) -> References {
    match refusal {
        Refusal::Full => return References::AccessRestricted,
        Refusal::Partial => return References::PartialLimitation,
        Refusal::Normal => {}
    }

    let mut seen: Vec<(usize, u32)> = Vec::new();
    let mut entries = Vec::new();
    for source in sources {
        for (document_index, page_number) in source.metadata.pages() {
            if seen.contains(&(document_index, page_number)) {
                continue;
            }
            seen.push((document_index, page_number));
            let entry = match page_link(uploads, document_index, page_number, style) {
                Ok(href) => ReferenceEntry::Link {
                    document_index,
                    page_number,
                    href,
                },
                Err(message) => {
                    tracing::warn!(document_index, page_number, %message, "reference link failed");
                    ReferenceEntry::Error {
                        page_number,
                        message,
                    }
                }
            };
            entries.push(entry);
        }
    }

    if entries.is_empty() {
        References::NoneFound
    } else {
        References::Entries(entries)
    }
}

/// Plain-text form used by the CLI: `answer`, a blank line, then the
/// `**References:**` block with one line per entry.
pub fn format_plain(answer: &str, references: &References) -> String {
    let body = match references {
        References::AccessRestricted => ACCESS_RESTRICTED.to_string(),
        References::PartialLimitation => PARTIAL_LIMITATION.to_string(),
        References::NoneFound => NONE_FOUND.to_string(),
        References::Entries(entries) => entries
            .iter()
            .map(|e| match e {
                ReferenceEntry::Link {
                    document_index,
                    page_number,
                    ..
                } => format!("Page {} (document {})", page_number, document_index + 1),
                other => other.label(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    format!("{}\n\n**References:**\n{}", answer, body)
}
