//! Chat interaction controller
//!
//! A turn runs in two steps so the front end can render in between:
//! [`ChatController::begin_turn`] validates the input and appends the user
//! message immediately, [`ChatController::complete_turn`] makes sure a
//! thread exists, sends the message and records whatever came back.
//!
//! At most one turn is in flight per session. A rate-limit response starts a
//! cooldown during which new turns are refused; it ends on its own once the
//! clock passes the deadline.

mod rate_limit;
pub mod title;

use crate::clock::Clock;
use crate::config::ChatConfig;
use crate::gateway::{format_api_error, ApiCall, ApiGateway, Endpoint, Outcome};
use crate::session::{Message, NoticeLevel, Session};
use crate::threads::ThreadService;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

const QUOTA_FALLBACK: &str = "AI service temporarily unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
}

/// Why a submission was refused before anything was recorded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("Message is empty")]
    EmptyInput,

    #[error("Still waiting for the previous reply")]
    AlreadySending,

    #[error("Cooling down... {remaining_secs}s remaining")]
    CoolingDown { remaining_secs: u64 },

    #[error("Please login first")]
    NotAuthenticated,
}

/// An accepted user turn whose message is already in the history
#[derive(Debug)]
#[must_use = "a pending turn keeps the session in the sending state until completed"]
pub struct PendingTurn {
    message: String,
}

impl PendingTurn {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply(String),
    RateLimited { retry_after_secs: u64 },
    Quota(String),
    Network,
    Server(String),
    SessionExpired,
}

#[derive(Deserialize)]
struct ChatReply {
    reply: String,
}

pub struct ChatController {
    gateway: ApiGateway,
    clock: Arc<dyn Clock>,
    config: ChatConfig,
}

impl ChatController {
    pub fn new(gateway: ApiGateway, clock: Arc<dyn Clock>, config: ChatConfig) -> Self {
        Self {
            gateway,
            clock,
            config,
        }
    }

    pub fn state(&self, session: &Session) -> ChatState {
        if session.is_generating() {
            ChatState::Sending
        } else {
            ChatState::Idle
        }
    }

    pub fn is_cooling_down(&self, session: &Session) -> bool {
        session.is_cooling_down(self.clock.now())
    }

    pub fn cooldown_remaining(&self, session: &Session) -> Option<u64> {
        session.cooldown_remaining(self.clock.now())
    }

    /// Timer hook: drop an expired deadline. Returns whether cooldown is still active.
    pub fn tick(&self, session: &mut Session) -> bool {
        let now = self.clock.now();
        if session.is_cooling_down(now) {
            return true;
        }
        if session.rate_limited_until.take().is_some() {
            tracing::info!("Rate-limit cooldown ended");
        }
        false
    }

    /// Accept a user message and append it to the history before any I/O
    pub fn begin_turn(
        &self,
        session: &mut Session,
        input: &str,
    ) -> Result<PendingTurn, SubmitRejected> {
        let message = input.trim();
        if message.is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }
        if !session.is_authenticated() {
            return Err(SubmitRejected::NotAuthenticated);
        }
        if session.is_generating() {
            return Err(SubmitRejected::AlreadySending);
        }
        if self.tick(session) {
            let remaining_secs = self.cooldown_remaining(session).unwrap_or(0);
            return Err(SubmitRejected::CoolingDown { remaining_secs });
        }

        session.is_generating = true;
        session.history.push(Message::user(message));
        Ok(PendingTurn {
            message: message.to_string(),
        })
    }

    /// Send an accepted turn and record its result; always leaves `Sending`
    pub async fn complete_turn(&self, session: &mut Session, turn: PendingTurn) -> TurnOutcome {
        let outcome = self.dispatch(session, &turn).await;
        self.apply(session, &outcome);
        session.is_generating = false;
        outcome
    }

    /// `begin_turn` followed by `complete_turn`
    pub async fn submit(
        &self,
        session: &mut Session,
        input: &str,
    ) -> Result<TurnOutcome, SubmitRejected> {
        let turn = self.begin_turn(session, input)?;
        Ok(self.complete_turn(session, turn).await)
    }

    async fn dispatch(&self, session: &mut Session, turn: &PendingTurn) -> TurnOutcome {
        let threads = ThreadService::new(&self.gateway, self.config.title_words);

        let thread_id = match session.thread_id.clone() {
            Some(id) => id,
            None => match threads.create_thread(session).await {
                Some(id) => {
                    session.thread_id = Some(id.clone());
                    id
                }
                None if !session.is_authenticated() => return TurnOutcome::SessionExpired,
                None => {
                    return TurnOutcome::Server("Could not start a new conversation".to_string())
                }
            },
        };

        if session.threads.title(&thread_id).is_none() {
            threads
                .commit_first_message(session, &thread_id, &turn.message)
                .await;
            if !session.is_authenticated() {
                return TurnOutcome::SessionExpired;
            }
        }

        let call = ApiCall::post("/chat")
            .endpoint(Endpoint::Chat)
            .json(json!({ "message": turn.message, "thread_id": thread_id }));

        match self.gateway.call(session, call).await {
            Outcome::SessionExpired => TurnOutcome::SessionExpired,
            Outcome::Network(_) => TurnOutcome::Network,
            Outcome::Response(resp) => match resp.status {
                StatusCode::OK => match resp.json::<ChatReply>() {
                    Some(reply) => TurnOutcome::Reply(reply.reply),
                    None => TurnOutcome::Server("Malformed chat reply".to_string()),
                },
                StatusCode::TOO_MANY_REQUESTS => TurnOutcome::RateLimited {
                    retry_after_secs: rate_limit::retry_after_secs(
                        resp.header("retry-after"),
                        self.config.default_retry_after_secs,
                    ),
                },
                StatusCode::SERVICE_UNAVAILABLE => TurnOutcome::Quota(
                    resp.detail().unwrap_or_else(|| QUOTA_FALLBACK.to_string()),
                ),
                _ => TurnOutcome::Server(format_api_error(&resp)),
            },
        }
    }

    fn apply(&self, session: &mut Session, outcome: &TurnOutcome) {
        match outcome {
            TurnOutcome::Reply(text) => {
                session.history.push(Message::assistant(text.clone()));
            }
            TurnOutcome::RateLimited { retry_after_secs } => {
                let deadline = rate_limit::cooldown_deadline(self.clock.now(), *retry_after_secs);
                tracing::info!("Rate limited for {}s", retry_after_secs);
                session.rate_limited_until = Some(deadline);
                session.notify(NoticeLevel::Warning, "Rate limit reached");
            }
            TurnOutcome::Quota(message) => {
                session.notify(NoticeLevel::Warning, message.clone());
            }
            TurnOutcome::Network => {
                session.notify(NoticeLevel::Error, "Backend not reachable");
            }
            TurnOutcome::Server(detail) => {
                tracing::warn!("Chat request failed: {}", detail);
                session.notify(NoticeLevel::Error, "Error occurred");
            }
            TurnOutcome::SessionExpired => {}
        }
    }
}

/// Split a complete reply into word chunks for a typewriter-style reveal
///
/// Purely cosmetic; the stored message is always the full text.
pub fn reveal_chunks(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(|word| format!("{} ", word))
}
