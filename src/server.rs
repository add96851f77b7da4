//! Browser front end.
//!
//! Serves one HTML page plus the form endpoints behind it. Every state
//! change is a `POST` that redirects back to `/` (post/redirect/get), so a
//! page refresh never resubmits a question.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Render the chat page |
//! | `POST` | `/process` | Multipart upload (`files`), then Process |
//! | `POST` | `/process/remote` | Fetch `url` (optional basic auth), then Process |
//! | `POST` | `/ask` | Answer `question` |
//! | `POST` | `/history/select` | Show one past Q/A pair (`date`, `index`) |
//! | `POST` | `/history/clear` | Back to the full conversation |
//! | `GET`  | `/documents/{index}` | The uploaded PDF, inline |
//! | `POST` | `/session/reset` | Forget the session |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Sessions are identified by the `converse_session` cookie. Only `POST`
//! routes create one; `GET` routes never do. A background task sweeps idle
//! sessions, and `/session/reset` removes the session and clears the cookie.
//!
//! # Error Contract
//!
//! User-facing problems (nothing processed yet, provider down) become a
//! notice on the page. Malformed requests get a JSON body instead:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "only PDF files are accepted: notes.txt" } }
//! ```

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::extract::MIME_PDF;
use crate::models::UploadedDocument;
use crate::progress::NoProgress;
use crate::render::{Notice, PageView};
use crate::session::{SessionContext, SessionStore, Services};
use crate::sources::{DocumentSource, RemoteSource, UploadSource};

pub const SESSION_COOKIE: &str = "converse_session";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    services: Arc<Services>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        let sessions = SessionStore::with_limits(
            services.config.server.max_sessions,
            Duration::from_secs(services.config.server.session_idle_secs),
        );
        Self {
            services: Arc::new(services),
            sessions: Arc::new(sessions),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Build the router. Split from [`run_server`] so tests can drive it
/// without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.services.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(handle_page))
        .route("/process", post(handle_process))
        .route("/process/remote", post(handle_process_remote))
        .route("/ask", post(handle_ask))
        .route("/history/select", post(handle_select))
        .route("/history/clear", post(handle_clear))
        .route("/documents/{index}", get(handle_document))
        .route("/session/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let services = Services::from_config(config.clone())?;
    let state = AppState::new(services);
    let app = build_router(state.clone());

    println!("converse listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let sessions = state.sessions.clone();
    let sweep_every = Duration::from_secs(config.server.session_idle_secs.clamp(1, 60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(Instant::now()).await;
            if evicted > 0 {
                tracing::info!(evicted, "swept idle sessions");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Converts into a JSON error response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Sessions ============

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

async fn session_for(state: &AppState, headers: &HeaderMap) -> (String, Arc<Mutex<SessionContext>>) {
    let id = session_cookie(headers);
    state.sessions.get_or_create(id.as_deref()).await
}

fn with_cookie(id: &str, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn back_home(id: &str) -> Response {
    with_cookie(id, Redirect::to("/"))
}

fn expire_cookie(response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Fetch from `source` and run Process, leaving the outcome as a notice.
async fn process_from(services: &Services, session: &mut SessionContext, source: &dyn DocumentSource) {
    let uploads = match source.fetch().await {
        Ok(uploads) => uploads,
        Err(e) => {
            tracing::warn!(source = source.name(), error = %e, "document source failed");
            session.set_notice(Notice::error(format!("Could not fetch documents: {}", e)));
            return;
        }
    };
    match session.process(services, uploads, &NoProgress).await {
        Ok(report) => session.set_notice(Notice::success(report.summary())),
        Err(e) => {
            tracing::warn!(session = session.id(), error = %e, "process failed");
            session.set_notice(e.notice());
        }
    }
}

// ============ GET / ============

async fn handle_page(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let id = session_cookie(&headers);
    let view = match state.sessions.get(id.as_deref()).await {
        Some(session) => session.lock().await.view(today()),
        None => PageView::default(),
    };
    let html = state
        .services
        .renderer
        .page(&view)
        .map_err(|e| internal(e.to_string()))?;
    Ok(Html(html).into_response())
}

// ============ POST /process ============

fn is_pdf(name: &str, content_type: Option<&str>) -> bool {
    content_type == Some(MIME_PDF) || name.to_ascii_lowercase().ends_with(".pdf")
}

async fn handle_process(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
        // Browsers send one empty part when no file was chosen.
        if name.is_empty() && bytes.is_empty() {
            continue;
        }
        if !is_pdf(&name, content_type.as_deref()) {
            return Err(bad_request(format!("only PDF files are accepted: {}", name)));
        }
        uploads.push(UploadedDocument {
            name,
            bytes: bytes.to_vec(),
        });
    }

    let (id, session) = session_for(&state, &headers).await;
    let mut session = session.lock().await;
    tracing::info!(session = %id, files = uploads.len(), "processing uploads");
    process_from(&state.services, &mut session, &UploadSource::new(uploads)).await;
    Ok(back_home(&id))
}

// ============ POST /process/remote ============

#[derive(Deserialize)]
struct RemoteForm {
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

async fn handle_process_remote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RemoteForm>,
) -> Result<Response, AppError> {
    let credentials = form
        .username
        .filter(|u| !u.trim().is_empty())
        .map(|u| (u, form.password.unwrap_or_default()));
    let source = RemoteSource::new(&form.url, credentials, &state.services.config.sources.remote)
        .map_err(|e| bad_request(e.to_string()))?;

    let (id, session) = session_for(&state, &headers).await;
    let mut session = session.lock().await;
    tracing::info!(session = %id, url = %form.url, "processing remote document");
    process_from(&state.services, &mut session, &source).await;
    Ok(back_home(&id))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskForm {
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AskForm>,
) -> Response {
    let (id, session) = session_for(&state, &headers).await;
    let mut session = session.lock().await;
    if let Err(e) = session.ask(&state.services, &form.question, today()).await {
        tracing::warn!(session = %id, error = %e, "question failed");
        session.set_notice(e.notice());
    }
    back_home(&id)
}

// ============ POST /history/* ============

#[derive(Deserialize)]
struct SelectForm {
    date: String,
    index: usize,
}

async fn handle_select(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SelectForm>,
) -> Result<Response, AppError> {
    let (id, session) = session_for(&state, &headers).await;
    session
        .lock()
        .await
        .select(&form.date, form.index)
        .map_err(|e| not_found(e.to_string()))?;
    Ok(back_home(&id))
}

async fn handle_clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session) = session_for(&state, &headers).await;
    session.lock().await.clear_selection();
    back_home(&id)
}

// ============ GET /documents/{index} ============

async fn handle_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(index): Path<usize>,
) -> Result<Response, AppError> {
    let session = state
        .sessions
        .get(session_cookie(&headers).as_deref())
        .await
        .ok_or_else(|| not_found("no session"))?;
    let session = session.lock().await;
    let doc = session
        .uploads()
        .get(index)
        .ok_or_else(|| not_found(format!("no uploaded document at index {}", index)))?;

    let disposition = format!("inline; filename=\"{}\"", doc.name.replace('"', ""));
    let response = (
        [
            (header::CONTENT_TYPE, MIME_PDF.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        doc.bytes.clone(),
    );
    Ok(response.into_response())
}

// ============ POST /session/reset ============

async fn handle_reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_cookie(&headers) {
        if state.sessions.remove(&id).await {
            tracing::info!(session = %id, "session reset");
        }
    }
    expire_cookie(Redirect::to("/"))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
