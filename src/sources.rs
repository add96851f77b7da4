//! Where PDFs come from.
//!
//! Every source produces the same thing, a list of [`UploadedDocument`]s in
//! a stable order, so the processing pipeline does not care whether bytes
//! arrived as a multipart upload, over HTTP, or from a local directory.

use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::RemoteSourceConfig;
use crate::models::UploadedDocument;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("authentication failed for {0}")]
    AuthFailed(String),
    #[error("remote server returned {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("document is larger than {limit} bytes")]
    TooLarge { limit: usize },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory does not exist: {0}")]
    MissingRoot(String),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid glob: {0}")]
    Glob(#[from] globset::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<UploadedDocument>, SourceError>;
}

/// Documents already in memory (multipart upload, tests).
pub struct UploadSource {
    documents: Vec<UploadedDocument>,
}

impl UploadSource {
    pub fn new(documents: Vec<UploadedDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for UploadSource {
    fn name(&self) -> &str {
        "upload"
    }

    async fn fetch(&self) -> Result<Vec<UploadedDocument>, SourceError> {
        Ok(self.documents.clone())
    }
}

/// A single PDF fetched over HTTP(S), optionally with basic auth.
pub struct RemoteSource {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, String)>,
    max_bytes: usize,
}

impl RemoteSource {
    pub fn new(
        url: &str,
        credentials: Option<(String, String)>,
        config: &RemoteSourceConfig,
    ) -> Result<Self, SourceError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SourceError::InvalidUrl(url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            credentials: credentials.filter(|(user, _)| !user.is_empty()),
            max_bytes: config.max_bytes,
        })
    }

    /// Last path segment without query or fragment, or `document.pdf`.
    pub fn file_name(url: &str) -> String {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let after_scheme = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
        after_scheme
            .split_once('/')
            .and_then(|(_, p)| p.rsplit('/').find(|s| !s.is_empty()))
            .map(|s| s.to_string())
            .unwrap_or_else(|| "document.pdf".to_string())
    }
}

#[async_trait]
impl DocumentSource for RemoteSource {
    fn name(&self) -> &str {
        "remote"
    }

    async fn fetch(&self) -> Result<Vec<UploadedDocument>, SourceError> {
        let mut request = self.client.get(&self.url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        let mut response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SourceError::AuthFailed(self.url.clone()));
            }
            status if !status.is_success() => {
                return Err(SourceError::Status {
                    url: self.url.clone(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(SourceError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        // Chunked responses carry no length; stop as soon as the cap is passed.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(SourceError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        tracing::info!(url = %self.url, bytes = bytes.len(), "fetched remote document");

        Ok(vec![UploadedDocument {
            name: Self::file_name(&self.url),
            bytes,
        }])
    }
}

/// Every `*.pdf` under a directory, sorted by relative path.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn pdf_globset() -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    builder.add(GlobBuilder::new("**/*.pdf").case_insensitive(true).build()?);
    builder.build()
}

#[async_trait]
impl DocumentSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self) -> Result<Vec<UploadedDocument>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::MissingRoot(self.root.display().to_string()));
        }
        let include = pdf_globset()?;

        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();
            if !include.is_match(&rel_str) {
                continue;
            }
            found.push((rel_str, path.to_path_buf()));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut documents = Vec::with_capacity(found.len());
        for (name, path) in found {
            documents.push(UploadedDocument {
                name,
                bytes: tokio::fs::read(&path).await?,
            });
        }
        Ok(documents)
    }
}
