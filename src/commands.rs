//! `converse ask` and `converse extract`.
//!
//! Both take a list of paths; a directory argument expands to every PDF
//! beneath it (see [`DirectorySource`]). Results go to stdout, progress and
//! logs to stderr.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::extract::extract_pages;
use crate::models::UploadedDocument;
use crate::pipeline::{prepare_chunks, process_documents, ProcessError, ProcessReport, Providers};
use crate::progress::ProcessProgressReporter;
use crate::references::{build_references, format_plain};
use crate::refusal::{PhraseClassifier, RefusalClassifier};
use crate::session::NO_CONTENT_NOTICE;
use crate::sources::{DirectorySource, DocumentSource};

/// Read every path; directories contribute all PDFs beneath them.
pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<UploadedDocument>> {
    let mut documents = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = DirectorySource::new(path)
                .fetch()
                .await
                .with_context(|| format!("Failed to scan {}", path.display()))?;
            documents.extend(found);
        } else {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            documents.push(UploadedDocument {
                name: display_name(path),
                bytes,
            });
        }
    }
    Ok(documents)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_report(report: &ProcessReport) {
    println!(
        "documents: {} ({} skipped)",
        report.documents,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  skipped {}: {}", failure.name, failure.reason);
    }
    println!("lines: {}", report.lines);
    println!("chunks: {}", report.chunks);
}

/// Dry run: extract and chunk without touching any provider.
pub async fn run_extract(
    config: &Config,
    paths: &[PathBuf],
    json: bool,
    progress: &dyn ProcessProgressReporter,
) -> Result<()> {
    let documents = load_documents(paths).await?;
    let (chunks, report) =
        prepare_chunks(&documents, config.chunking.min_chars, extract_pages, progress).await;

    if json {
        let out = serde_json::json!({
            "documents": report.documents,
            "skipped": report.failures.iter().map(|f| serde_json::json!({
                "name": f.name,
                "reason": f.reason,
            })).collect::<Vec<_>>(),
            "lines": report.lines,
            "chunks": chunks.iter().map(|c| serde_json::json!({
                "content": c.content,
                "references": c.reference_labels(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&report);
        for (i, chunk) in chunks.iter().enumerate() {
            println!();
            println!("--- chunk {} ---", i + 1);
            println!("refs: {}", chunk.reference_labels().join(", "));
            println!("{}", chunk.content);
        }
    }

    if chunks.is_empty() {
        bail!(NO_CONTENT_NOTICE);
    }
    Ok(())
}

/// Process `paths` and ask each question in turn, as one conversation.
pub async fn run_ask(
    config: &Config,
    paths: &[PathBuf],
    questions: &[String],
    progress: &dyn ProcessProgressReporter,
) -> Result<()> {
    if questions.iter().all(|q| q.trim().is_empty()) {
        bail!("at least one non-empty --question is required");
    }
    let documents = load_documents(paths).await?;
    let providers = Providers::from_config(config)?;

    let (mut retriever, report) =
        match process_documents(config, &providers, extract_pages, &documents, progress).await {
            Ok(done) => done,
            Err(ProcessError::NoContent { report }) => {
                print_report(&report);
                bail!(NO_CONTENT_NOTICE);
            }
            Err(e) => return Err(e.into()),
        };
    tracing::info!("{}", report.summary());

    let classifier = PhraseClassifier::new(config.refusal.phrases.as_slice());
    for question in questions.iter().map(|q| q.trim()).filter(|q| !q.is_empty()) {
        let answer = retriever.ask(question).await?;
        let refusal = classifier.classify(&answer.text);
        let references = build_references(
            refusal,
            &answer.source_documents,
            &documents,
            config.references.link_style,
        );
        println!("Q: {}", question);
        println!("{}", format_plain(&answer.text, &references));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[tokio::test]
    async fn load_documents_expands_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("pdfs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.pdf"), b"a").unwrap();
        std::fs::write(dir.join("b.txt"), b"b").unwrap();
        let single = tmp.path().join("single.pdf");
        std::fs::write(&single, b"s").unwrap();

        let docs = load_documents(&[dir, single]).await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "single.pdf"]);
    }

    #[tokio::test]
    async fn load_documents_missing_file_is_error() {
        let err = load_documents(&[PathBuf::from("/no/such/file.pdf")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[tokio::test]
    async fn ask_requires_a_question() {
        let err = run_ask(&Config::minimal(), &[], &["  ".to_string()], &NoProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--question"));
    }
}
