//! Terminal front end
//!
//! One cooperative loop owns the [`Session`] and multiplexes three event
//! sources: input lines, the cooldown tick and the upload-poll tick. Each
//! event is applied to completion, network calls included, before the next
//! one is taken.

pub mod commands;
pub mod events;
pub mod renderer;

pub use commands::{Command, CommandError};
pub use events::AppEvent;
pub use renderer::{Renderer, TextRenderer, ThreadEntry};

use crate::auth::{AuthManager, Registration};
use crate::chat::{reveal_chunks, ChatController, TurnOutcome};
use crate::clock::Clock;
use crate::config::Config;
use crate::documents::{DocumentService, UploadError, UploadPoller};
use crate::gateway::{ApiGateway, FilePart, Transport};
use crate::session::{NoticeLevel, Session};
use crate::threads::ThreadService;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;

pub struct App<R: Renderer> {
    config: Config,
    gateway: ApiGateway,
    chat: ChatController,
    session: Session,
    renderer: R,
    should_quit: bool,
}

impl<R: Renderer> App<R> {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        renderer: R,
    ) -> Self {
        let gateway = ApiGateway::new(transport, config.timeouts.clone());
        let chat = ChatController::new(gateway.clone(), clock, config.chat.clone());
        Self {
            config,
            gateway,
            chat,
            session: Session::new(),
            renderer,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Run until `/quit` or end of input
    pub async fn run<I>(&mut self, input: I) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.split(b'\n');
        let mut cooldown = tokio::time::interval(self.config.ui.cooldown_tick());
        cooldown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut upload_poll = tokio::time::interval(self.config.uploads.poll_interval());
        upload_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.renderer.line(&format!(
            "docchat connected to {}. Type /help for commands.",
            self.gateway.base_url()
        ))?;
        self.prompt()?;

        while !self.should_quit {
            let event = tokio::select! {
                line = lines.next_segment() => match line? {
                    Some(bytes) => AppEvent::Input(decode_line(&bytes)),
                    None => AppEvent::InputClosed,
                },
                _ = cooldown.tick() => AppEvent::CooldownTick,
                _ = upload_poll.tick() => AppEvent::UploadPollTick,
            };
            self.handle_event(event).await?;
        }

        tracing::debug!("Front-end loop finished");
        Ok(())
    }

    pub async fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Input(line) => {
                self.handle_line(&line).await?;
                self.flush_notices()?;
                if !self.should_quit {
                    self.prompt()?;
                }
            }
            AppEvent::InputClosed => self.should_quit = true,
            AppEvent::CooldownTick => {
                let was_cooling = self.session.rate_limited_until().is_some();
                if was_cooling && !self.chat.tick(&mut self.session) {
                    self.session
                        .notify(NoticeLevel::Success, "Cooldown finished. You can chat again.");
                }
                if self.flush_notices()? {
                    self.prompt()?;
                }
            }
            AppEvent::UploadPollTick => {
                if self.session.upload_job().is_some() {
                    UploadPoller::new(&self.gateway, &self.config.uploads)
                        .poll(&mut self.session)
                        .await;
                }
                if self.flush_notices()? {
                    self.prompt()?;
                }
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<()> {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.session.notify(NoticeLevel::Error, e.to_string());
                return Ok(());
            }
        };

        if command.requires_auth() && !self.session.is_authenticated() {
            self.session.notify(NoticeLevel::Warning, "Please login first");
            return Ok(());
        }
        if command.touches_knowledge_base() && self.chat.is_cooling_down(&self.session) {
            self.session
                .notify(NoticeLevel::Info, "Knowledge base is locked during cooldown");
            return Ok(());
        }

        match command {
            Command::Chat(text) => self.send_chat(&text).await?,
            Command::Login { username, password } => self.login(&username, &password).await,
            Command::Register {
                username,
                email,
                password,
                confirm_password,
            } => {
                let form = Registration {
                    username,
                    email,
                    password,
                    confirm_password: Some(confirm_password),
                };
                self.register(&form).await;
            }
            Command::Logout => {
                AuthManager::logout(&mut self.session);
                self.session.notify(NoticeLevel::Info, "Logged out");
            }
            Command::NewChat => {
                let threads = ThreadService::new(&self.gateway, self.config.chat.title_words);
                if threads.new_chat(&mut self.session).await.is_some() {
                    self.session.notify(NoticeLevel::Info, "Started a new chat");
                }
            }
            Command::Threads => self.show_threads()?,
            Command::Open(n) => self.open_thread(n).await?,
            Command::Upload(path) => self.upload(&path).await,
            Command::Documents => {
                let names = DocumentService::new(&self.gateway)
                    .list_documents(&mut self.session)
                    .await;
                self.renderer.documents(&names)?;
            }
            Command::RemoveDocument(name) => {
                DocumentService::new(&self.gateway)
                    .delete_document(&mut self.session, &name)
                    .await;
            }
            Command::ClearDocuments => {
                DocumentService::new(&self.gateway)
                    .clear_documents(&mut self.session)
                    .await;
            }
            Command::Help => self.renderer.line(commands::HELP)?,
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }

    async fn send_chat(&mut self, text: &str) -> Result<()> {
        let turn = match self.chat.begin_turn(&mut self.session, text) {
            Ok(turn) => turn,
            Err(rejected) => {
                self.session.notify(NoticeLevel::Warning, rejected.to_string());
                return Ok(());
            }
        };
        if let TurnOutcome::Reply(reply) = self.chat.complete_turn(&mut self.session, turn).await {
            self.reveal(&reply).await?;
        }
        Ok(())
    }

    async fn reveal(&mut self, reply: &str) -> Result<()> {
        let delay = Duration::from_millis(self.config.chat.reveal_delay_ms);
        self.renderer.reply_start()?;
        for chunk in reveal_chunks(reply) {
            self.renderer.reply_chunk(&chunk)?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        self.renderer.reply_end()
    }

    async fn login(&mut self, username: &str, password: &str) {
        if let Some(current) = self.current_user() {
            let message = format!("Already logged in as {}. Use /logout first", current);
            self.session.notify(NoticeLevel::Warning, message);
            return;
        }
        let result = AuthManager::new(&self.gateway)
            .login(&mut self.session, username, password)
            .await;
        self.after_sign_in(result, username).await;
    }

    async fn register(&mut self, form: &Registration) {
        if let Some(current) = self.current_user() {
            let message = format!("Already logged in as {}. Use /logout first", current);
            self.session.notify(NoticeLevel::Warning, message);
            return;
        }
        let result = AuthManager::new(&self.gateway)
            .register(&mut self.session, form)
            .await;
        self.after_sign_in(result, &form.username).await;
    }

    async fn after_sign_in(&mut self, result: Result<(), crate::auth::AuthError>, username: &str) {
        match result {
            Ok(()) if !self.session.is_authenticated() => {
                tracing::debug!("Session ended while signing in");
            }
            Ok(()) => {
                let name = self.current_user().unwrap_or_else(|| username.to_string());
                self.session
                    .notify(NoticeLevel::Success, format!("Logged in as {}", name));
                ThreadService::new(&self.gateway, self.config.chat.title_words)
                    .bootstrap(&mut self.session)
                    .await;
            }
            Err(e) => self.session.notify(NoticeLevel::Error, e.to_string()),
        }
    }

    fn current_user(&self) -> Option<String> {
        if !self.session.is_authenticated() {
            return None;
        }
        Some(
            self.session
                .profile()
                .map(|p| p.username.clone())
                .unwrap_or_else(|| "current user".to_string()),
        )
    }

    fn show_threads(&mut self) -> Result<()> {
        let current = self.session.thread_id();
        let entries: Vec<ThreadEntry> = self
            .session
            .threads()
            .order
            .iter()
            .enumerate()
            .map(|(i, id)| ThreadEntry {
                index: i + 1,
                title: ThreadService::display_title(&self.session, id),
                current: current == Some(id.as_str()),
            })
            .collect();
        self.renderer.threads(&entries)
    }

    async fn open_thread(&mut self, n: usize) -> Result<()> {
        let listed = n.checked_sub(1).and_then(|i| self.session.threads().order.get(i));
        let Some(id) = listed.cloned() else {
            self.session
                .notify(NoticeLevel::Warning, format!("No conversation #{}", n));
            return Ok(());
        };
        ThreadService::new(&self.gateway, self.config.chat.title_words)
            .activate(&mut self.session, &id)
            .await;
        if self.session.thread_id() != Some(id.as_str()) {
            return Ok(());
        }
        self.renderer
            .line(&format!("--- {} ---", ThreadService::display_title(&self.session, &id)))?;
        for message in self.session.history() {
            self.renderer.message(message)?;
        }
        Ok(())
    }

    async fn upload(&mut self, path: &Path) {
        let file = match FilePart::from_path(path) {
            Ok(file) => file,
            Err(e) => {
                let message = format!("Could not read {}: {}", path.display(), e);
                self.session.notify(NoticeLevel::Error, message);
                return;
            }
        };
        let result = UploadPoller::new(&self.gateway, &self.config.uploads)
            .submit(&mut self.session, file)
            .await;
        match result {
            Ok(accepted) => {
                tracing::debug!("Upload accepted as job {}", accepted.job_id);
            }
            Err(UploadError::SessionExpired) => {}
            Err(e) => self.session.notify(NoticeLevel::Error, e.to_string()),
        }
    }

    /// Render queued notices; returns whether there were any
    fn flush_notices(&mut self) -> Result<bool> {
        let notices = self.session.drain_notices();
        for notice in &notices {
            self.renderer.notice(notice)?;
        }
        Ok(!notices.is_empty())
    }

    fn prompt(&mut self) -> Result<()> {
        let user = self.session.profile().map(|p| p.username.clone());
        let cooldown = self.chat.cooldown_remaining(&self.session);
        self.renderer.prompt(user.as_deref(), cooldown)
    }
}

/// Undecodable bytes become U+FFFD rather than ending the session
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
