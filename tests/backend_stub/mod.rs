//! In-process stand-in for the chat backend, served with axum on an ephemeral port

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const USERNAME: &str = "ada";
pub const PASSWORD: &str = "correct-horse";
const MAX_UPLOAD_BYTES: usize = 2_621_440;

#[derive(Default)]
pub struct StubState {
    pub valid_access: Vec<String>,
    pub valid_refresh: Vec<String>,
    pub issued: usize,
    pub refresh_calls: usize,
    pub next_thread: u64,
    pub threads: Vec<u64>,
    pub titles: HashMap<String, String>,
    pub chat_messages: Vec<Value>,
    pub rate_limit_next_chat: Option<u64>,
    pub documents: Vec<String>,
}

pub type Shared = Arc<Mutex<StubState>>;

pub struct Backend {
    pub base_url: String,
    pub state: Shared,
}

impl Backend {
    /// Invalidate every access token so the next call gets a 401
    pub fn expire_access_tokens(&self) {
        self.state.lock().unwrap().valid_access.clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.state.lock().unwrap().valid_refresh.clear();
    }

    pub fn rate_limit_next_chat(&self, retry_after_secs: u64) {
        self.state.lock().unwrap().rate_limit_next_chat = Some(retry_after_secs);
    }
}

pub async fn spawn() -> Backend {
    let state: Shared = Arc::new(Mutex::new(StubState {
        next_thread: 1,
        documents: vec!["handbook.pdf".to_string()],
        ..Default::default()
    }));

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/threads", get(list_threads))
        .route("/threads/new", post(new_thread))
        .route("/threads/:id/title", post(set_title))
        .route("/threads/:id/history", get(history))
        .route("/chat", post(chat))
        .route("/documents", get(list_documents).delete(clear_documents))
        .route("/documents/:name", delete(delete_document))
        .route("/documents/upload", post(upload))
        .route("/documents/upload-status/:job_id", get(upload_status))
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend {
        base_url: format!("http://{}", addr),
        state,
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn authorized(state: &Shared, headers: &HeaderMap) -> bool {
    match bearer(headers) {
        Some(token) => state.lock().unwrap().valid_access.contains(&token),
        None => false,
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response()
}

fn issue_tokens(state: &Shared) -> Value {
    let mut s = state.lock().unwrap();
    s.issued += 1;
    let access = format!("access-{}", s.issued);
    let refresh = format!("refresh-{}", s.issued);
    s.valid_access.push(access.clone());
    s.valid_refresh.push(refresh.clone());
    json!({"access_token": access, "refresh_token": refresh, "token_type": "bearer"})
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["username"] == USERNAME && body["password"] == PASSWORD {
        Json(issue_tokens(&state)).into_response()
    } else {
        unauthorized()
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if body["username"] == USERNAME {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Username already registered"})),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(issue_tokens(&state))).into_response()
}

async fn refresh(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let token = bearer(&headers);
    let valid = {
        let mut s = state.lock().unwrap();
        s.refresh_calls += 1;
        token.is_some_and(|t| s.valid_refresh.contains(&t))
    };
    if valid {
        Json(issue_tokens(&state)).into_response()
    } else {
        unauthorized()
    }
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({"username": USERNAME, "id": 1, "email": "ada@example.com"})).into_response()
}

async fn list_threads(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let threads = state.lock().unwrap().threads.clone();
    Json(json!({ "threads": threads })).into_response()
}

async fn new_thread(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let mut s = state.lock().unwrap();
    let id = s.next_thread;
    s.next_thread += 1;
    s.threads.push(id);
    Json(json!({ "thread_id": id })).into_response()
}

async fn set_title(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let title = body["title"].as_str().unwrap_or_default().to_string();
    state.lock().unwrap().titles.insert(id, title);
    Json(json!({"ok": true})).into_response()
}

async fn history(State(state): State<Shared>, Path(_id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({"messages": []})).into_response()
}

async fn chat(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let mut s = state.lock().unwrap();
    if let Some(secs) = s.rate_limit_next_chat.take() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, secs.to_string())],
            Json(json!({"detail": "Rate limit exceeded"})),
        )
            .into_response();
    }
    let message = body["message"].as_str().unwrap_or_default().to_string();
    s.chat_messages.push(body);
    Json(json!({ "reply": format!("You asked: {}", message) })).into_response()
}

async fn list_documents(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let documents = state.lock().unwrap().documents.clone();
    Json(json!({ "documents": documents })).into_response()
}

async fn delete_document(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let mut s = state.lock().unwrap();
    let before = s.documents.len();
    s.documents.retain(|d| d != &name);
    if s.documents.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found"}))).into_response();
    }
    Json(json!({"deleted": name})).into_response()
}

async fn clear_documents(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    state.lock().unwrap().documents.clear();
    Json(json!({"deleted": "all"})).into_response()
}

async fn upload(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    if !is_multipart {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Expected multipart"}))).into_response();
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return (StatusCode::PAYLOAD_TOO_LARGE, Json(json!({"detail": "Too large"}))).into_response();
    }
    if !body.windows(8).any(|w| w == b"%PDF-1.4") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "PDF produced 0 chunks"})),
        )
            .into_response();
    }
    Json(json!({"job_id": "job-42", "status": "processing", "message": "Upload queued"}))
        .into_response()
}

async fn upload_status(
    State(state): State<Shared>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let status = if job_id == "job-42" { "done" } else { "deleted" };
    Json(json!({ "status": status })).into_response()
}
