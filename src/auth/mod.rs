//! Authentication against the backend identity endpoints
//!
//! Login and registration bypass the refresh logic of
//! [`ApiGateway::call`](crate::gateway::ApiGateway::call) since there is no
//! session to recover yet. Token state only ever changes as a pair.

use crate::gateway::{ApiCall, ApiGateway, Endpoint, Outcome};
use crate::session::{Credentials, Session, UserProfile};
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;

const MIN_PASSWORD_LEN: usize = 8;

/// Errors surfaced to the user from login and registration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please fill all fields")]
    MissingFields,

    #[error("Passwords don't match")]
    PasswordMismatch,

    #[error("Password must be at least 8 characters")]
    PasswordTooShort,

    /// Any failed login, whatever the backend said
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration refused; carries the backend's own message
    #[error("{0}")]
    Rejected(String),

    #[error("Error: {0}")]
    Network(String),

    #[error("Unexpected response from server")]
    MalformedResponse,
}

/// Registration form as entered by the user
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Repeated password; checked only when present
    pub confirm_password: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> Result<(), AuthError> {
        let confirm_blank = self
            .confirm_password
            .as_deref()
            .is_some_and(|c| c.is_empty());
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || confirm_blank
        {
            return Err(AuthError::MissingFields);
        }
        if let Some(confirm) = &self.confirm_password {
            if confirm != &self.password {
                return Err(AuthError::PasswordMismatch);
            }
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }
        Ok(())
    }
}

pub struct AuthManager<'a> {
    gateway: &'a ApiGateway,
}

impl<'a> AuthManager<'a> {
    pub fn new(gateway: &'a ApiGateway) -> Self {
        Self { gateway }
    }

    /// Create an account; on 201 the session is signed in
    pub async fn register(
        &self,
        session: &mut Session,
        form: &Registration,
    ) -> Result<(), AuthError> {
        form.validate()?;

        let call = ApiCall::post("/auth/register")
            .endpoint(Endpoint::Auth)
            .json(json!({
                "username": form.username.trim(),
                "email": form.email.trim(),
                "password": form.password,
            }));

        match self.gateway.send(&call, None).await {
            Outcome::Response(resp) if resp.status == StatusCode::CREATED => {
                let credentials = resp
                    .json::<Credentials>()
                    .ok_or(AuthError::MalformedResponse)?;
                self.sign_in(session, credentials).await;
                tracing::info!("Registered new account {}", form.username.trim());
                Ok(())
            }
            Outcome::Response(resp) => Err(AuthError::Rejected(
                resp.detail()
                    .unwrap_or_else(|| "Registration failed".to_string()),
            )),
            Outcome::Network(e) => Err(AuthError::Network(e.to_string())),
            Outcome::SessionExpired => Err(AuthError::Rejected("Registration failed".to_string())),
        }
    }

    /// Sign in; failures never reveal why the backend refused
    pub async fn login(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let call = ApiCall::post("/auth/login")
            .endpoint(Endpoint::Auth)
            .json(json!({ "username": username.trim(), "password": password }));

        match self.gateway.send(&call, None).await {
            Outcome::Response(resp) if resp.status == StatusCode::OK => {
                let credentials = resp
                    .json::<Credentials>()
                    .ok_or(AuthError::MalformedResponse)?;
                self.sign_in(session, credentials).await;
                tracing::info!("Logged in as {}", username.trim());
                Ok(())
            }
            Outcome::Response(resp) => {
                tracing::debug!("Login refused with {}", resp.status);
                Err(AuthError::InvalidCredentials)
            }
            Outcome::Network(e) => Err(AuthError::Network(e.to_string())),
            Outcome::SessionExpired => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_in(&self, session: &mut Session, credentials: Credentials) {
        session.credentials = Some(credentials);
        self.fetch_profile(session).await;
    }

    /// Exchange the refresh token for a new token pair
    ///
    /// Returns `false` without touching the stored tokens on any failure.
    pub async fn refresh(&self, session: &mut Session) -> bool {
        let Some(refresh_token) = session.credentials().map(|c| c.refresh_token.clone()) else {
            return false;
        };

        let call = ApiCall::post("/auth/refresh").endpoint(Endpoint::Auth);
        match self.gateway.send(&call, Some(refresh_token)).await {
            Outcome::Response(resp) if resp.status == StatusCode::OK => {
                match resp.json::<Credentials>() {
                    Some(credentials) => {
                        session.credentials = Some(credentials);
                        tracing::debug!("Access token refreshed");
                        true
                    }
                    None => false,
                }
            }
            Outcome::Response(resp) => {
                tracing::warn!("Token refresh refused with {}", resp.status);
                false
            }
            Outcome::Network(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                false
            }
            Outcome::SessionExpired => false,
        }
    }

    /// Load the signed-in user's profile; failures leave it unset
    pub async fn fetch_profile(&self, session: &mut Session) {
        let outcome = self.gateway.call(session, ApiCall::get("/auth/me")).await;
        if let Some(profile) = outcome.ok().and_then(|resp| resp.json::<UserProfile>()) {
            session.profile = Some(profile);
        }
    }

    /// Forget everything about the current user
    pub fn logout(session: &mut Session) {
        if let Some(profile) = session.profile() {
            tracing::info!("Logging out {}", profile.username);
        }
        session.reset();
    }
}
