//! Resilient API gateway
//!
//! Every backend call goes through [`ApiGateway::call`], which:
//! - attaches the bearer access token when the session has one
//! - picks the timeout for the endpoint class unless the caller overrides it
//! - on HTTP 401 refreshes the tokens once and replays the call once
//! - classifies transport faults instead of propagating them
//!
//! Non-401 statuses are handed back untouched; callers decide what a 429 or
//! 503 means for them.

mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use transport::{
    FilePart, HttpRequest, HttpResponse, ReqwestTransport, RequestBody, Transport, TransportError,
};

use crate::auth::AuthManager;
use crate::config::TimeoutConfig;
use crate::session::{NoticeLevel, Session};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Endpoint class, used to pick a default timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endpoint {
    Auth,
    Chat,
    #[default]
    General,
}

/// A logical backend call, before credentials and timeout are resolved
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub endpoint: Endpoint,
    pub timeout: Option<Duration>,
}

impl ApiCall {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            endpoint: Endpoint::General,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn file(mut self, file: FilePart) -> Self {
        self.body = RequestBody::File(file);
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Structured result of a gateway call; nothing escapes as a panic or error
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The backend answered, with any status
    Response(HttpResponse),
    /// The request never produced a response
    Network(TransportError),
    /// A 401 could not be recovered; the session has been logged out
    SessionExpired,
}

impl Outcome {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Response(resp) => Some(resp.status),
            _ => None,
        }
    }

    /// The response when its status is exactly `status`
    pub fn response_if(&self, status: StatusCode) -> Option<&HttpResponse> {
        match self {
            Outcome::Response(resp) if resp.status == status => Some(resp),
            _ => None,
        }
    }

    pub fn ok(&self) -> Option<&HttpResponse> {
        self.response_if(StatusCode::OK)
    }
}

#[derive(Clone)]
pub struct ApiGateway {
    transport: Arc<dyn Transport>,
    timeouts: TimeoutConfig,
}

impl ApiGateway {
    pub fn new(transport: Arc<dyn Transport>, timeouts: TimeoutConfig) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn timeout_for(&self, call: &ApiCall) -> Duration {
        call.timeout.unwrap_or(match call.endpoint {
            Endpoint::Auth => self.timeouts.auth(),
            Endpoint::Chat => self.timeouts.chat(),
            Endpoint::General => self.timeouts.default_timeout(),
        })
    }

    fn resolve(&self, call: &ApiCall, bearer: Option<String>) -> HttpRequest {
        HttpRequest {
            method: call.method.clone(),
            path: call.path.clone(),
            bearer,
            body: call.body.clone(),
            timeout: self.timeout_for(call),
        }
    }

    /// Issue one attempt with an explicit bearer; no refresh, no retry
    pub(crate) async fn send(&self, call: &ApiCall, bearer: Option<String>) -> Outcome {
        let request = self.resolve(call, bearer);
        tracing::debug!("{} {} (timeout {:?})", request.method, request.path, request.timeout);
        match self.transport.send(request).await {
            Ok(response) => {
                tracing::debug!("{} {} -> {}", call.method, call.path, response.status);
                Outcome::Response(response)
            }
            Err(e) => {
                tracing::warn!("{} {} failed: {}", call.method, call.path, e);
                Outcome::Network(e)
            }
        }
    }

    /// Issue a call on behalf of the session, with refresh-and-retry on 401
    pub async fn call(&self, session: &mut Session, call: ApiCall) -> Outcome {
        let bearer = session.access_token().map(str::to_string);
        let outcome = self.send(&call, bearer).await;

        let outcome = match outcome {
            Outcome::Response(resp)
                if resp.status == StatusCode::UNAUTHORIZED && session.is_authenticated() =>
            {
                tracing::info!("Access token rejected on {}, refreshing", call.path);
                if AuthManager::new(self).refresh(session).await {
                    let bearer = session.access_token().map(str::to_string);
                    self.send(&call, bearer).await
                } else {
                    tracing::warn!("Token refresh failed, ending session");
                    AuthManager::logout(session);
                    session.notify(NoticeLevel::Error, SESSION_EXPIRED_MESSAGE);
                    return Outcome::SessionExpired;
                }
            }
            other => other,
        };

        if let Outcome::Network(e) = &outcome {
            session.notify(NoticeLevel::Error, e.user_message(self.base_url()));
        }
        outcome
    }
}

/// Format a non-success response for display
///
/// A `detail` that already reads like a sentence (more than three words, or
/// carrying a warning/error marker) is shown as-is; anything shorter is
/// prefixed with the status code.
pub fn format_api_error(response: &HttpResponse) -> String {
    let code = response.status.as_u16();
    let parsed: Option<serde_json::Value> = serde_json::from_str(&response.body).ok();
    let detail = match parsed.as_ref().map(|v| v.get("detail")) {
        Some(Some(serde_json::Value::String(detail))) => detail.clone(),
        Some(None) => "Unknown error".to_string(),
        _ => return format!("Error {}: {}", code, response.body),
    };

    if detail.contains('⚠') || detail.contains('❌') || detail.split_whitespace().count() > 3 {
        detail
    } else {
        format!("Error {}: {}", code, detail)
    }
}
