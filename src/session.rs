//! Session state for a single signed-in user
//!
//! The session is an explicit context object owned by the event loop and
//! handed `&mut` to each component. Field ownership:
//! - credentials and profile: [`crate::auth`]
//! - history, current thread and thread cache: [`crate::chat`] and [`crate::threads`]
//! - upload job: [`crate::documents::upload`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Access and refresh token, always held together
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Profile returned by `GET /auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, deserialize_with = "crate::threads::opt_id_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Backend-reported state of a document ingestion job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Failed,
    Deleted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub id: String,
    pub status: JobStatus,
}

/// Thread ordering (most recently active first) and display titles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadCache {
    pub order: Vec<String>,
    pub titles: HashMap<String, String>,
}

impl ThreadCache {
    /// Move `id` to the front of the order, inserting it if unknown
    pub fn promote(&mut self, id: &str) {
        self.order.retain(|existing| existing != id);
        self.order.insert(0, id.to_string());
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.titles.get(id).map(String::as_str)
    }
}

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient feedback for the front end
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

#[derive(Debug, Default)]
pub struct Session {
    pub(crate) credentials: Option<Credentials>,
    pub(crate) profile: Option<UserProfile>,
    pub(crate) history: Vec<Message>,
    pub(crate) thread_id: Option<String>,
    pub(crate) threads: ThreadCache,
    pub(crate) rate_limited_until: Option<DateTime<Utc>>,
    pub(crate) is_generating: bool,
    pub(crate) upload_job: Option<UploadJob>,
    notices: VecDeque<Notice>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn threads(&self) -> &ThreadCache {
        &self.threads
    }

    pub fn rate_limited_until(&self) -> Option<DateTime<Utc>> {
        self.rate_limited_until
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn upload_job(&self) -> Option<&UploadJob> {
        self.upload_job.as_ref()
    }

    /// Whether a rate-limit cooldown is active at `now`
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.rate_limited_until.is_some_and(|until| now < until)
    }

    /// Whole seconds left in the cooldown, `None` when not cooling down
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        let until = self.rate_limited_until?;
        let remaining = (until - now).num_seconds();
        if now < until {
            Some(remaining.max(0) as u64)
        } else {
            None
        }
    }

    /// Replace the whole session with an empty one
    ///
    /// Notices queued before the reset are dropped with everything else.
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push_back(Notice {
            message: message.into(),
            level,
            timestamp: chrono::Local::now(),
        });
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }
}
