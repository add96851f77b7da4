//! Fakes shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use converse::config::Config;
use converse::embedding::EmbeddingProvider;
use converse::extract::ExtractError;
use converse::llm::ChatModel;
use converse::models::{ChatMessage, UploadedDocument};
use converse::pipeline::Providers;
use converse::session::Services;

/// Treats bytes as UTF-8 text with pages separated by form feeds.
pub fn text_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text.split('\u{c}').map(|p| p.to_string()).collect())
}

pub fn doc(name: &str, pages: &[&str]) -> UploadedDocument {
    UploadedDocument {
        name: name.to_string(),
        bytes: pages.join("\u{c}").into_bytes(),
    }
}

/// Two-axis embedder: texts mentioning "revenue" point one way, the rest
/// the other.
pub struct KeywordEmbedder {
    pub fail: bool,
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts
            .iter()
            .map(|t| {
                if t.to_lowercase().contains("revenue") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }
}

/// Answers every question with `answer`, and rewrites follow-ups to
/// `standalone` when asked to condense. Records every prompt.
pub struct FakeChat {
    pub answer: Mutex<String>,
    pub standalone: String,
    pub fail: bool,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChat {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Mutex::new(answer.to_string()),
            standalone: "What was revenue?".to_string(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::answering("")
        }
    }

    pub fn set_answer(&self, answer: &str) {
        *self.answer.lock().unwrap() = answer.to_string();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn condense_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|msgs| msgs.iter().any(|m| m.content.contains("Standalone question:")))
            .count()
    }

    pub fn last_prompt(&self) -> String {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|msgs| {
                msgs.iter()
                    .map(|m| m.content.clone())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    fn model_name(&self) -> &str {
        "fake"
    }
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if self.fail {
            anyhow::bail!("chat service unavailable");
        }
        if messages
            .iter()
            .any(|m| m.content.contains("Standalone question:"))
        {
            return Ok(self.standalone.clone());
        }
        Ok(self.answer.lock().unwrap().clone())
    }
}

pub fn services(embedder: KeywordEmbedder, chat: Arc<FakeChat>) -> Services {
    services_with(Config::minimal(), embedder, chat)
}

pub fn services_with(config: Config, embedder: KeywordEmbedder, chat: Arc<FakeChat>) -> Services {
    let providers = Providers {
        embedder: Arc::new(embedder),
        llm: chat,
    };
    Services::new(config, providers)
        .unwrap()
        .with_extractor(text_pages)
}
