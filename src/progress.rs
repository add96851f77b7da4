//! Processing progress reporting.
//!
//! Reports what the Process pipeline is doing (extracting, chunking,
//! embedding) so a CLI user can see how far along a large upload is.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for one Process run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessProgressEvent {
    /// Text extraction started for this document.
    Extracting { document: String },
    /// All documents were split into this many chunks.
    Chunked { chunks: u64 },
    /// n chunks embedded out of total.
    Embedding { n: u64, total: u64 },
    /// Index built; the conversation is ready for questions.
    Ready,
}

/// Reports processing progress. Implementations write to stderr (human or JSON).
pub trait ProcessProgressReporter: Send + Sync {
    fn report(&self, event: ProcessProgressEvent);
}

/// Human-friendly progress on stderr: "process  embedding  128 / 1,024 chunks".
pub struct StderrProgress;

impl ProcessProgressReporter for StderrProgress {
    fn report(&self, event: ProcessProgressEvent) {
        let line = match &event {
            ProcessProgressEvent::Extracting { document } => {
                format!("process  extracting  {}\n", document)
            }
            ProcessProgressEvent::Chunked { chunks } => {
                format!("process  chunked  {} chunks\n", format_number(*chunks))
            }
            ProcessProgressEvent::Embedding { n, total } => format!(
                "process  embedding  {} / {} chunks\n",
                format_number(*n),
                format_number(*total)
            ),
            ProcessProgressEvent::Ready => "process  ready\n".to_string(),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &ProcessProgressEvent) -> serde_json::Value {
        match event {
            ProcessProgressEvent::Extracting { document } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "document": document
            }),
            ProcessProgressEvent::Chunked { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "chunked",
                "chunks": chunks
            }),
            ProcessProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            ProcessProgressEvent::Ready => serde_json::json!({
                "event": "progress",
                "phase": "ready"
            }),
        }
    }
}

impl ProcessProgressReporter for JsonProgress {
    fn report(&self, event: ProcessProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter; the HTTP server uses this.
pub struct NoProgress;

impl ProcessProgressReporter for NoProgress {
    fn report(&self, _event: ProcessProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProcessProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn json_embedding_event() {
        let v = JsonProgress::to_json(&ProcessProgressEvent::Embedding { n: 64, total: 100 });
        assert_eq!(v["phase"], "embedding");
        assert_eq!(v["n"], 64);
        assert_eq!(v["total"], 100);
    }

    #[test]
    fn json_extracting_names_document() {
        let v = JsonProgress::to_json(&ProcessProgressEvent::Extracting {
            document: "report.pdf".to_string(),
        });
        assert_eq!(v["document"], "report.pdf");
    }
}
