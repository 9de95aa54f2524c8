//! Scripted transport for unit tests

use super::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::session::{Credentials, Session};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Reply = Result<HttpResponse, TransportError>;

/// Replies are queued per `(method, path)` and consumed in order.
/// An exhausted route answers 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn respond(
        &self,
        method: Method,
        path: &str,
        status: StatusCode,
        body: serde_json::Value,
    ) {
        self.push(method, path, Ok(HttpResponse::json_body(status, &body)));
    }

    pub(crate) fn respond_with(&self, method: Method, path: &str, response: HttpResponse) {
        self.push(method, path, Ok(response));
    }

    pub(crate) fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.push(method, path, Err(error));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn base_url(&self) -> &str {
        "http://backend.test"
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method.clone(), request.path.clone());
        self.requests.lock().unwrap().push(request);
        self.routes
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(HttpResponse::new(StatusCode::NOT_FOUND, "{}")))
    }
}

pub(crate) fn authenticated_session(access: &str, refresh: &str) -> Session {
    let mut session = Session::new();
    session.credentials = Some(Credentials {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    });
    session
}
