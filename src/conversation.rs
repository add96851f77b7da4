//! Retrieval-augmented conversation over a [`VectorIndex`].
//!
//! Each question goes through three steps:
//!
//! ```text
//! question + memory ──▶ condense (LLM) ──▶ standalone question
//!                                               │ embed
//!                                               ▼
//!                         top-k chunks ◀── VectorIndex::search
//!                               │
//!                               ▼
//!                  answer (LLM, context-stuffed prompt)
//! ```
//!
//! The retriever owns its memory. There is no reset: the session drops the
//! retriever and builds a new one when documents are processed again.

use anyhow::Result;
use std::sync::Arc;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::llm::ChatModel;
use crate::models::{Answer, ChatMessage, Role, SourceDocument};

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const QA_PROMPT: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

pub struct ConversationalRetriever {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn ChatModel>,
    top_k: usize,
    memory: Vec<ChatMessage>,
}

impl ConversationalRetriever {
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            top_k,
            memory: Vec::new(),
        }
    }

    /// Prior turns, oldest first.
    pub fn memory(&self) -> &[ChatMessage] {
        &self.memory
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answer `question` from retrieved context and record the turn.
    ///
    /// Memory is only updated when the answer succeeds.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let standalone = if self.memory.is_empty() {
            question.to_string()
        } else {
            let condensed = self
                .llm
                .complete(&condense_messages(&self.memory, question))
                .await?;
            let condensed = condensed.trim();
            if condensed.is_empty() {
                question.to_string()
            } else {
                condensed.to_string()
            }
        };
        tracing::debug!(%standalone, "retrieving context");

        let query_vec = embed_query(self.embedder.as_ref(), &standalone).await?;
        let sources = self.index.search(&query_vec, self.top_k);

        let reply = self
            .llm
            .complete(&answer_messages(&sources, &standalone))
            .await?;

        self.memory.push(ChatMessage::user(question));
        self.memory.push(ChatMessage::assistant(reply.clone()));

        Ok(Answer {
            text: reply,
            chat_history: self.memory.clone(),
            source_documents: sources,
        })
    }
}

fn format_history(memory: &[ChatMessage]) -> String {
    memory
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Human",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn condense_messages(memory: &[ChatMessage], question: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "{}\n\nChat History:\n{}\nFollow Up Input: {}\nStandalone question:",
        CONDENSE_PROMPT,
        format_history(memory),
        question
    ))]
}

fn answer_messages(sources: &[SourceDocument], question: &str) -> Vec<ChatMessage> {
    let context = sources
        .iter()
        .map(|s| format!("[{}]\n{}", s.metadata.references_display, s.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        ChatMessage::system(format!("{}\n----------------\n{}", QA_PROMPT, context)),
        ChatMessage::user(question),
    ]
}
