//! End-to-end session flows against a stub backend over real HTTP

mod backend_stub;

use backend_stub::{PASSWORD, USERNAME};
use docchat::auth::{AuthError, AuthManager, Registration};
use docchat::chat::{ChatController, SubmitRejected, TurnOutcome};
use docchat::clock::{Clock, ManualClock};
use docchat::config::{ChatConfig, TimeoutConfig, UploadConfig};
use docchat::documents::{DocumentService, UploadError, UploadPoller};
use docchat::gateway::{ApiGateway, FilePart, ReqwestTransport};
use docchat::session::{JobStatus, Session};
use std::sync::Arc;

fn gateway_for(base_url: &str) -> ApiGateway {
    let url = url::Url::parse(base_url).unwrap();
    let transport = ReqwestTransport::new(&url).unwrap();
    ApiGateway::new(Arc::new(transport), TimeoutConfig::default())
}

async fn signed_in(gateway: &ApiGateway) -> Session {
    let mut session = Session::new();
    AuthManager::new(gateway)
        .login(&mut session, USERNAME, PASSWORD)
        .await
        .unwrap();
    session
}

#[tokio::test]
async fn test_login_and_wrong_password() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let auth = AuthManager::new(&gateway);
    let mut session = Session::new();

    let err = auth.login(&mut session, USERNAME, "wrong-pass").await.unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
    assert!(!session.is_authenticated());

    auth.login(&mut session, USERNAME, PASSWORD).await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(session.profile().map(|p| p.username.as_str()), Some(USERNAME));
    assert_eq!(session.profile().and_then(|p| p.id.as_deref()), Some("1"));
}

#[tokio::test]
async fn test_registration_paths() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let auth = AuthManager::new(&gateway);

    let mut taken = Session::new();
    let form = Registration {
        username: USERNAME.to_string(),
        email: "ada@example.com".to_string(),
        password: "long-enough".to_string(),
        confirm_password: Some("long-enough".to_string()),
    };
    assert_eq!(
        auth.register(&mut taken, &form).await.unwrap_err(),
        AuthError::Rejected("Username already registered".to_string())
    );

    let mut fresh = Session::new();
    let form = Registration {
        username: "grace".to_string(),
        ..form
    };
    auth.register(&mut fresh, &form).await.unwrap();
    assert!(fresh.is_authenticated());
}

#[tokio::test]
async fn test_first_message_creates_thread_and_replies() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let mut session = signed_in(&gateway).await;
    let chat = ChatController::new(
        gateway.clone(),
        Arc::new(ManualClock::default()),
        ChatConfig::default(),
    );

    let outcome = chat
        .submit(&mut session, "What is the refund policy?")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Reply("You asked: What is the refund policy?".to_string())
    );
    assert_eq!(session.thread_id(), Some("1"));
    assert_eq!(session.threads().title("1"), Some("What Is The Refund"));
    assert_eq!(session.threads().order, vec!["1"]);
    assert_eq!(session.history().len(), 2);

    let state = backend.state.lock().unwrap();
    assert_eq!(state.titles.get("1").map(String::as_str), Some("What Is The Refund"));
    assert_eq!(state.chat_messages[0]["thread_id"], "1");
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_once() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let mut session = signed_in(&gateway).await;
    let chat = ChatController::new(
        gateway.clone(),
        Arc::new(ManualClock::default()),
        ChatConfig::default(),
    );
    chat.submit(&mut session, "first").await.unwrap();
    let old_access = session.access_token().map(str::to_string);

    backend.expire_access_tokens();
    let outcome = chat.submit(&mut session, "second").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Reply("You asked: second".to_string()));
    assert_ne!(session.access_token().map(str::to_string), old_access);
    assert_eq!(backend.state.lock().unwrap().refresh_calls, 1);
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let mut session = signed_in(&gateway).await;
    let chat = ChatController::new(
        gateway.clone(),
        Arc::new(ManualClock::default()),
        ChatConfig::default(),
    );

    backend.expire_access_tokens();
    backend.revoke_refresh_tokens();
    let outcome = chat.submit(&mut session, "hello").await.unwrap();

    assert_eq!(outcome, TurnOutcome::SessionExpired);
    assert!(!session.is_authenticated());
    assert!(session.history().is_empty());
    assert_eq!(backend.state.lock().unwrap().refresh_calls, 1);
    let notices: Vec<String> = session.drain_notices().into_iter().map(|n| n.message).collect();
    assert_eq!(notices, vec!["Session expired. Please login again.".to_string()]);
}

#[tokio::test]
async fn test_rate_limit_cooldown_window() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let mut session = signed_in(&gateway).await;
    let clock = Arc::new(ManualClock::default());
    let chat = ChatController::new(gateway.clone(), clock.clone(), ChatConfig::default());
    let start = clock.now();

    backend.rate_limit_next_chat(45);
    let outcome = chat.submit(&mut session, "hello").await.unwrap();
    assert_eq!(outcome, TurnOutcome::RateLimited { retry_after_secs: 45 });
    assert_eq!(
        session.rate_limited_until(),
        Some(start + chrono::Duration::seconds(45))
    );

    clock.advance(chrono::Duration::seconds(44));
    assert!(matches!(
        chat.submit(&mut session, "again").await,
        Err(SubmitRejected::CoolingDown { remaining_secs: 1 })
    ));

    clock.advance(chrono::Duration::seconds(2));
    let outcome = chat.submit(&mut session, "again").await.unwrap();
    assert_eq!(outcome, TurnOutcome::Reply("You asked: again".to_string()));
}

#[tokio::test]
async fn test_upload_flow() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let mut session = signed_in(&gateway).await;
    let config = UploadConfig::default();
    let uploads = UploadPoller::new(&gateway, &config);

    let huge = FilePart::new("scan.pdf", "application/pdf", vec![b'x'; 3 * 1024 * 1024]);
    assert_eq!(
        uploads.submit(&mut session, huge).await.unwrap_err(),
        UploadError::TooLarge
    );

    let empty = FilePart::new("blank.pdf", "application/pdf", b"not a pdf".to_vec());
    assert_eq!(
        uploads.submit(&mut session, empty).await.unwrap_err(),
        UploadError::EmptyOrInvalid
    );

    let pdf = FilePart::new("policy.pdf", "application/pdf", b"%PDF-1.4 refund terms".to_vec());
    let accepted = uploads.submit(&mut session, pdf).await.unwrap();
    assert_eq!(accepted.job_id, "job-42");
    assert_eq!(accepted.message.as_deref(), Some("Upload queued"));
    assert!(session.upload_job().is_some());

    assert_eq!(uploads.poll(&mut session).await, Some(JobStatus::Done));
    assert!(session.upload_job().is_none());
}

#[tokio::test]
async fn test_knowledge_base_management() {
    let backend = backend_stub::spawn().await;
    let gateway = gateway_for(&backend.base_url);
    let mut session = signed_in(&gateway).await;
    let docs = DocumentService::new(&gateway);

    assert_eq!(docs.list_documents(&mut session).await, vec!["handbook.pdf"]);
    assert!(!docs.delete_document(&mut session, "missing.pdf").await);
    assert!(docs.delete_document(&mut session, "handbook.pdf").await);
    assert!(docs.list_documents(&mut session).await.is_empty());
    assert!(docs.clear_documents(&mut session).await);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let gateway = gateway_for(&format!("http://127.0.0.1:{}", port));
    let mut session = Session::new();

    let err = AuthManager::new(&gateway)
        .login(&mut session, USERNAME, PASSWORD)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Network(_)));
    assert!(err.to_string().starts_with("Error: "));
    assert!(!session.is_authenticated());
}
