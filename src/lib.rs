//! docchat: terminal client for a document question-answering backend
//!
//! This library provides:
//! - An API gateway with transparent token refresh on 401
//! - Login, registration and session lifecycle
//! - Chat turns with optimistic history, rate-limit cooldown and thread titling
//! - Document upload with background ingestion-job polling
//! - A line-oriented terminal front end

pub mod app;
pub mod auth;
pub mod chat;
pub mod clock;
pub mod config;
pub mod documents;
pub mod gateway;
pub mod session;
pub mod threads;

pub use app::App;
pub use config::Config;
pub use gateway::{ApiGateway, ReqwestTransport};
pub use session::Session;
