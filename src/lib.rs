//! # Converse
//!
//! Chat with multiple PDFs using retrieval-augmented generation.
//!
//! Uploaded PDFs are split into page/line-addressed text, folded into
//! chunks, embedded into an in-memory index, and queried by a
//! conversational retriever. Every answer is followed by links to the pages
//! it was drawn from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │  Sources    │──▶│ Extract + Chunk   │──▶│ VectorIndex │
//! │ Upload/URL  │   │ (page, line refs) │   │ (embedded)  │
//! └─────────────┘   └──────────────────┘   └──────┬──────┘
//!                                                 │
//!                                   ┌─────────────▼────────────┐
//!                                   │ ConversationalRetriever  │
//!                                   │ condense → search → LLM  │
//!                                   └─────────────┬────────────┘
//!                                                 │
//!                      ┌──────────────────────────┤
//!                      ▼                          ▼
//!                 ┌──────────┐              ┌───────────┐
//!                 │   CLI    │              │  Web UI   │
//!                 │ (ask)    │              │ (session) │
//!                 └──────────┘              └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction with page/line positions |
//! | [`chunk`] | Line folding into minimum-length chunks |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat model abstraction |
//! | [`index`] | In-memory cosine-similarity index |
//! | [`conversation`] | Conversational retriever with memory |
//! | [`pipeline`] | The Process action |
//! | [`refusal`] | Refusal phrase detection |
//! | [`references`] | Page references for answers |
//! | [`history`] | Date-bucketed question log |
//! | [`render`] | HTML templates |
//! | [`session`] | Per-browser session state |
//! | [`sources`] | Upload, remote URL and directory sources |
//! | [`server`] | HTTP server |
//! | [`commands`] | CLI command implementations |

pub mod backoff;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod extract;
pub mod history;
pub mod index;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod references;
pub mod refusal;
pub mod render;
pub mod server;
pub mod session;
pub mod sources;
