//! Per-browser chat state.
//!
//! A [`SessionContext`] owns everything one user has done: the uploaded
//! PDFs, the current conversation, the dated question log and the history
//! selection. Handlers lock one session for the whole request, so actions
//! inside a session never interleave.
//!
//! Processing again replaces the conversation (index and memory) but keeps
//! the dated question log. The main panel renders that log, so earlier
//! answers stay on screen after a reprocess.
//!
//! The [`SessionStore`] is bounded: idle sessions are swept and the least
//! recently used one is evicted once `max_sessions` is reached.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::Config;
use crate::conversation::ConversationalRetriever;
use crate::extract::{extract_pages, PageExtractor};
use crate::history::QuestionLog;
use crate::models::{QaPair, UploadedDocument};
use crate::pipeline::{process_documents, ProcessError, ProcessReport, Providers};
use crate::progress::ProcessProgressReporter;
use crate::references::build_references;
use crate::refusal::{PhraseClassifier, RefusalClassifier};
use crate::render::{Notice, PageView, Renderer};

pub const NO_CONTENT_NOTICE: &str = "No content found to process.";
pub const NOT_PROCESSED_NOTICE: &str = "Upload and process documents first.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Upload and process documents first.")]
    NotProcessed,
    #[error("No content found to process.")]
    NoContent,
    #[error("Could not index the documents: {0}")]
    IndexingUnavailable(String),
    #[error("Could not answer the question: {0}")]
    AnswerUnavailable(String),
    #[error("no history entry {index} for {date}")]
    UnknownHistoryEntry { date: String, index: usize },
    #[error("rendering failed: {0}")]
    Render(String),
}

impl SessionError {
    /// How the error is shown on the page.
    pub fn notice(&self) -> Notice {
        match self {
            SessionError::NotProcessed => Notice::warning(NOT_PROCESSED_NOTICE),
            SessionError::NoContent => Notice::warning(NO_CONTENT_NOTICE),
            other => Notice::error(other.to_string()),
        }
    }
}

impl From<ProcessError> for SessionError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NoContent { .. } => SessionError::NoContent,
            ProcessError::Indexing { message } => SessionError::IndexingUnavailable(message),
        }
    }
}

/// Shared, read-only collaborators every session uses.
pub struct Services {
    pub config: Config,
    pub providers: Providers,
    pub classifier: Box<dyn RefusalClassifier>,
    pub renderer: Renderer,
    pub extractor: PageExtractor,
}

impl Services {
    pub fn new(config: Config, providers: Providers) -> anyhow::Result<Self> {
        let classifier = Box::new(PhraseClassifier::new(config.refusal.phrases.as_slice()));
        Ok(Self {
            config,
            providers,
            classifier,
            renderer: Renderer::new()?,
            extractor: extract_pages,
        })
    }

    /// Swap the PDF text extractor (tests feed plain text pages).
    pub fn with_extractor(mut self, extractor: PageExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let providers = Providers::from_config(&config)?;
        Self::new(config, providers)
    }
}

pub struct SessionContext {
    id: String,
    uploads: Vec<UploadedDocument>,
    conversation: Option<ConversationalRetriever>,
    log: QuestionLog,
    selected: Option<(String, usize)>,
    notice: Option<Notice>,
}

impl SessionContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uploads: Vec::new(),
            conversation: None,
            log: QuestionLog::new(),
            selected: None,
            notice: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uploads(&self) -> &[UploadedDocument] {
        &self.uploads
    }

    pub fn is_processed(&self) -> bool {
        self.conversation.is_some()
    }

    pub fn log(&self) -> &QuestionLog {
        &self.log
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Replace the uploads and rebuild the conversation from them.
    ///
    /// The previous conversation is dropped before anything else happens,
    /// so a failed run leaves the session unprocessed rather than answering
    /// from stale documents.
    pub async fn process(
        &mut self,
        services: &Services,
        uploads: Vec<UploadedDocument>,
        progress: &dyn ProcessProgressReporter,
    ) -> Result<ProcessReport, SessionError> {
        self.conversation = None;
        self.selected = None;
        self.uploads = uploads;

        let (retriever, report) = process_documents(
            &services.config,
            &services.providers,
            services.extractor,
            &self.uploads,
            progress,
        )
        .await?;
        self.conversation = Some(retriever);
        Ok(report)
    }

    /// Answer `question` and record it under `today`.
    ///
    /// Blank questions are ignored and return `Ok(None)`.
    pub async fn ask(
        &mut self,
        services: &Services,
        question: &str,
        today: NaiveDate,
    ) -> Result<Option<QaPair>, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }
        let conversation = self
            .conversation
            .as_mut()
            .ok_or(SessionError::NotProcessed)?;

        let answer = conversation
            .ask(question)
            .await
            .map_err(|e| SessionError::AnswerUnavailable(format!("{:#}", e)))?;

        let refusal = services.classifier.classify(&answer.text);
        let references = build_references(
            refusal,
            &answer.source_documents,
            &self.uploads,
            services.config.references.link_style,
        );
        let bot = services
            .renderer
            .bot_message(&answer.text, &references)
            .map_err(|e| SessionError::Render(e.to_string()))?;

        let pair = QaPair {
            user: question.to_string(),
            bot,
        };
        tracing::debug!(session = %self.id, ?refusal, "answered question");
        self.log.record(today, pair.clone());
        self.selected = None;
        Ok(Some(pair))
    }

    pub fn select(&mut self, date: &str, index: usize) -> Result<&QaPair, SessionError> {
        let unknown = || SessionError::UnknownHistoryEntry {
            date: date.to_string(),
            index,
        };
        self.log.get(date, index).ok_or_else(unknown)?;
        self.selected = Some((date.to_string(), index));
        self.selected_pair().ok_or_else(unknown)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_pair(&self) -> Option<&QaPair> {
        self.selected
            .as_ref()
            .and_then(|(date, index)| self.log.get(date, *index))
    }

    /// Forget everything except the session id.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.id));
    }

    /// Snapshot for rendering. Consumes the pending notice.
    pub fn view(&mut self, today: NaiveDate) -> PageView {
        PageView {
            notice: self.notice.take(),
            documents: self.uploads.iter().map(|d| d.name.clone()).collect(),
            history: self.log.all().cloned().collect(),
            selected: self.selected_pair().cloned(),
            sidebar: self.log.sidebar(today),
        }
    }
}

struct SessionSlot {
    session: Arc<Mutex<SessionContext>>,
    last_seen: Instant,
}

/// All live sessions, keyed by cookie id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionSlot>>,
    max_sessions: usize,
    idle: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_limits(256, Duration::from_secs(60 * 60))
    }

    pub fn with_limits(max_sessions: usize, idle: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle,
        }
    }

    /// The session for `id`, if it exists. Marks it as used.
    pub async fn get(&self, id: Option<&str>) -> Option<Arc<Mutex<SessionContext>>> {
        let id = id?;
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(id)?;
        slot.last_seen = Instant::now();
        Some(slot.session.clone())
    }

    /// Look up `id`, or create a session under a fresh id when it is
    /// missing or unknown. Returns the id actually used.
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, Arc<Mutex<SessionContext>>) {
        if let Some(id) = id {
            if let Some(session) = self.get(Some(id)).await {
                return (id.to_string(), session);
            }
        }

        let now = Instant::now();
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(SessionContext::new(id.clone())));
        let mut sessions = self.sessions.write().await;
        let idle = self.idle;
        sessions.retain(|_, slot| now.saturating_duration_since(slot.last_seen) <= idle);
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_seen)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    sessions.remove(&key);
                    tracing::debug!(session = %key, "evicted least recently used session");
                }
                None => break,
            }
        }
        sessions.insert(
            id.clone(),
            SessionSlot {
                session: session.clone(),
                last_seen: now,
            },
        );
        tracing::debug!(session = %id, live = sessions.len(), "created session");
        (id, session)
    }

    /// Drop sessions idle for longer than the configured limit as of `now`.
    /// Returns how many were removed.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let idle = self.idle;
        sessions.retain(|_, slot| now.saturating_duration_since(slot.last_seen) <= idle);
        before - sessions.len()
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn services() -> Services {
        let config = Config::minimal();
        let providers = Providers::from_config(&config).unwrap();
        Services::new(config, providers).unwrap()
    }

    #[tokio::test]
    async fn asking_before_processing_is_not_processed() {
        let mut session = SessionContext::new("s");
        let err = session.ask(&services(), "hello?", day(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotProcessed));
        assert_eq!(err.notice().text, "Upload and process documents first.");
    }

    #[tokio::test]
    async fn blank_question_is_ignored() {
        let mut session = SessionContext::new("s");
        assert!(session
            .ask(&services(), "   ", day(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unreadable_upload_gives_no_content_notice() {
        let mut session = SessionContext::new("s");
        let uploads = vec![UploadedDocument {
            name: "x.pdf".to_string(),
            bytes: b"nope".to_vec(),
        }];
        let err = session
            .process(&services(), uploads, &crate::progress::NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoContent));
        assert_eq!(err.notice().text, NO_CONTENT_NOTICE);
        assert!(!session.is_processed());
        assert_eq!(session.uploads().len(), 1);
    }

    #[test]
    fn selecting_unknown_entry_fails() {
        let mut session = SessionContext::new("s");
        assert!(matches!(
            session.select("2024-05-01", 0),
            Err(SessionError::UnknownHistoryEntry { .. })
        ));
        assert!(session.selected_pair().is_none());
    }

    #[test]
    fn reset_keeps_id_and_clears_notice() {
        let mut session = SessionContext::new("keep-me");
        session.set_notice(Notice::success("done"));
        session.reset();
        assert_eq!(session.id(), "keep-me");
        assert!(session.view(day(1)).notice.is_none());
    }

    #[test]
    fn view_takes_notice_once() {
        let mut session = SessionContext::new("s");
        session.set_notice(Notice::warning(NO_CONTENT_NOTICE));
        assert!(session.view(day(1)).notice.is_some());
        assert!(session.view(day(1)).notice.is_none());
    }

    #[tokio::test]
    async fn store_evicts_least_recently_used_at_capacity() {
        let store = SessionStore::with_limits(2, Duration::from_secs(3600));
        let (first, _) = store.get_or_create(None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (second, _) = store.get_or_create(None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Touch the first so the second becomes the oldest.
        assert!(store.get(Some(&first)).await.is_some());

        let (third, _) = store.get_or_create(None).await;
        assert_eq!(store.len().await, 2);
        assert!(store.get(Some(&first)).await.is_some());
        assert!(store.get(Some(&second)).await.is_none());
        assert!(store.get(Some(&third)).await.is_some());
    }

    #[tokio::test]
    async fn store_sweeps_idle_sessions() {
        let store = SessionStore::with_limits(10, Duration::from_secs(60));
        store.get_or_create(None).await;
        store.get_or_create(None).await;

        assert_eq!(store.evict_idle(Instant::now()).await, 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(store.evict_idle(later).await, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn get_never_creates() {
        let store = SessionStore::new();
        assert!(store.get(None).await.is_none());
        assert!(store.get(Some("unknown")).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn store_reuses_known_ids_and_replaces_unknown() {
        let store = SessionStore::new();
        let (id, _) = store.get_or_create(None).await;
        let (again, _) = store.get_or_create(Some(&id)).await;
        assert_eq!(id, again);
        let (fresh, _) = store.get_or_create(Some("forged")).await;
        assert_ne!(fresh, "forged");
        assert_eq!(store.len().await, 2);
        assert!(store.remove(&id).await);
        assert_eq!(store.len().await, 1);
    }
}
