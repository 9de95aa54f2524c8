//! Thread list and title cache
//!
//! Thin wrappers over the thread endpoints plus the client-side ordering
//! (most recently active first) and title map kept in the session.
//! Every wrapper degrades to an empty or failed result instead of erroring.

use crate::chat::title::{derive_title, fallback_title};
use crate::gateway::{ApiCall, ApiGateway};
use crate::session::{Message, NoticeLevel, Session};
use serde::{Deserialize, Deserializer};
use serde_json::json;

/// Server ids arrive as strings or integers depending on the backend store
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RawId::deserialize(deserializer)?.into())
}

pub(crate) fn opt_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

#[derive(Deserialize)]
struct NewThreadResponse {
    thread_id: RawId,
}

#[derive(Deserialize)]
struct ThreadListResponse {
    threads: Vec<RawId>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    messages: Vec<Message>,
}

pub struct ThreadService<'a> {
    gateway: &'a ApiGateway,
    title_words: usize,
}

impl<'a> ThreadService<'a> {
    pub fn new(gateway: &'a ApiGateway, title_words: usize) -> Self {
        Self {
            gateway,
            title_words,
        }
    }

    pub async fn list_threads(&self, session: &mut Session) -> Vec<String> {
        self.fetch_threads(session).await.unwrap_or_default()
    }

    /// `None` when the list could not be fetched, as opposed to an empty list
    async fn fetch_threads(&self, session: &mut Session) -> Option<Vec<String>> {
        let outcome = self.gateway.call(session, ApiCall::get("/threads")).await;
        outcome
            .ok()
            .and_then(|resp| resp.json::<ThreadListResponse>())
            .map(|list| list.threads.into_iter().map(String::from).collect())
    }

    pub async fn create_thread(&self, session: &mut Session) -> Option<String> {
        let outcome = self.gateway.call(session, ApiCall::post("/threads/new")).await;
        let id = outcome
            .ok()
            .and_then(|resp| resp.json::<NewThreadResponse>())
            .map(|created| String::from(created.thread_id));
        if let Some(id) = &id {
            tracing::debug!("Created thread {}", id);
        }
        id
    }

    pub async fn load_history(&self, session: &mut Session, thread_id: &str) -> Vec<Message> {
        let path = format!("/threads/{}/history", thread_id);
        let outcome = self.gateway.call(session, ApiCall::get(path)).await;
        outcome
            .ok()
            .and_then(|resp| resp.json::<HistoryResponse>())
            .map(|history| history.messages)
            .unwrap_or_default()
    }

    pub async fn set_title(&self, session: &mut Session, thread_id: &str, title: &str) -> bool {
        let path = format!("/threads/{}/title", thread_id);
        let call = ApiCall::post(path).json(json!({ "title": title }));
        self.gateway.call(session, call).await.ok().is_some()
    }

    /// Load the thread list and title every thread not yet titled
    ///
    /// Only runs while no thread is open, so an in-progress conversation is
    /// never reordered underneath the user.
    pub async fn bootstrap(&self, session: &mut Session) {
        if !session.is_authenticated() || session.thread_id.is_some() {
            return;
        }
        let Some(threads) = self.fetch_threads(session).await else {
            return;
        };
        if !session.is_authenticated() {
            return;
        }
        for id in &threads {
            if session.threads.titles.contains_key(id) {
                continue;
            }
            let history = self.load_history(session, id).await;
            let title = history
                .first()
                .and_then(|first| derive_title(&first.content, self.title_words))
                .unwrap_or_else(|| fallback_title(id));
            session.threads.titles.insert(id.clone(), title);
        }
        session.threads.order = threads;
    }

    /// Open an existing thread: make it current, load its history, move it first
    pub async fn activate(&self, session: &mut Session, thread_id: &str) {
        let messages = self.load_history(session, thread_id).await;
        if !session.is_authenticated() {
            return;
        }
        session.thread_id = Some(thread_id.to_string());
        session.history = messages;
        session.threads.promote(thread_id);
    }

    /// Start an empty conversation
    ///
    /// The new thread is neither listed nor titled until its first message
    /// is sent; see [`ThreadService::commit_first_message`].
    pub async fn new_chat(&self, session: &mut Session) -> Option<String> {
        match self.create_thread(session).await {
            Some(id) => {
                session.thread_id = Some(id.clone());
                session.history.clear();
                Some(id)
            }
            None => {
                if session.is_authenticated() {
                    session.notify(NoticeLevel::Error, "Could not start a new chat");
                }
                None
            }
        }
    }

    /// Title a thread from its first user message and list it first
    pub async fn commit_first_message(
        &self,
        session: &mut Session,
        thread_id: &str,
        first_message: &str,
    ) {
        let title = derive_title(first_message, self.title_words)
            .unwrap_or_else(|| fallback_title(thread_id));
        session
            .threads
            .titles
            .insert(thread_id.to_string(), title.clone());
        if !self.set_title(session, thread_id, &title).await {
            tracing::warn!("Backend did not accept title for thread {}", thread_id);
        }

        let listed = self.fetch_threads(session).await;
        if !session.is_authenticated() {
            return;
        }
        match listed {
            Some(order) => session.threads.order = order,
            None => tracing::warn!("Could not refresh thread list; keeping cached order"),
        }
        session.threads.promote(thread_id);
    }

    /// Label to show for a thread
    pub fn display_title(session: &Session, thread_id: &str) -> String {
        session
            .threads
            .title(thread_id)
            .map(str::to_string)
            .unwrap_or_else(|| fallback_title(thread_id))
    }
}
