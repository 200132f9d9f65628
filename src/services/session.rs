// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session controller: login, signup, logout and the password/email flows.
//!
//! Session state machine:
//! `Anonymous --login--> Authenticated --logout | terminal failure--> Anonymous`.
//! A failed login leaves the session anonymous.

use crate::error::ApiError;
use crate::models::user::LoginResponse;
use crate::models::{
    AuthenticatedUser, Credentials, LoginOutcome, LogoutReason, RequestDescriptor, Session,
    SessionEvent, SessionState,
};
use crate::services::{ApiClient, RefreshCoordinator, SessionTeardown};
use crate::store::TokenStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Identity endpoint.
pub const ME_PATH: &str = "/user/me";

/// Orchestrates the auth flows on top of [`ApiClient`] and [`TokenStore`].
#[derive(Clone)]
pub struct SessionController {
    api: ApiClient,
    store: TokenStore,
    refresher: RefreshCoordinator,
    teardown: SessionTeardown,
    /// Identity from the last successful `GET /user/me`.
    user: Arc<Mutex<Option<AuthenticatedUser>>>,
}

impl SessionController {
    pub fn new(
        api: ApiClient,
        store: TokenStore,
        refresher: RefreshCoordinator,
        teardown: SessionTeardown,
    ) -> Self {
        Self {
            api,
            store,
            refresher,
            teardown,
            user: Arc::new(Mutex::new(None)),
        }
    }

    /// Log in and store both tokens, replacing any previous session.
    ///
    /// The backend answers with `{ token, refreshToken, message }`; a user
    /// summary is passed back only if it sends one. Use
    /// [`current_user`](Self::current_user) for the full identity.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, ApiError> {
        let request = RequestDescriptor::post("/auth/login")
            .anonymous()
            .json(credentials)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let response: LoginResponse = self.api.dispatch_as(&request).await?;

        self.store
            .set(Session::new(response.token, response.refresh_token));
        self.user.lock().await.take();
        self.teardown.emit(SessionEvent::LoggedIn);

        tracing::info!(user_id = ?response.user.as_ref().map(|u| &u.id), "Logged in");
        Ok(LoginOutcome {
            message: response.message,
            user: response.user,
        })
    }

    /// Register a new account. The profile is passed through untouched.
    pub async fn signup(&self, profile: &Value) -> Result<Value, ApiError> {
        let request = RequestDescriptor::post("/auth/register")
            .anonymous()
            .json_value(profile.clone());
        let response = self.api.dispatch(&request).await?;
        tracing::info!("Signup submitted");
        Ok(response)
    }

    /// Request a password reset email.
    pub async fn forgot_password(&self, email: &str) -> Result<Value, ApiError> {
        let request = RequestDescriptor::post("/auth/forgot-password")
            .anonymous()
            .json_value(json!({ "email": email }));
        self.api.dispatch(&request).await
    }

    /// Confirm an email address with the token from the verification link.
    ///
    /// The bearer token is attached when a session exists; the link token
    /// alone is enough for an anonymous caller. Fails locally, without a
    /// network call, if the token is absent.
    pub async fn verify_email(&self, token: Option<&str>) -> Result<Value, ApiError> {
        let token = require_token(token)?;
        let request = RequestDescriptor::get("/auth/verify-email").query("token", token);
        let response = self.api.dispatch(&request).await?;

        // The verified flag on the cached identity is now stale.
        self.invalidate_user().await;
        Ok(response)
    }

    /// Set a new password with the token from the reset link.
    ///
    /// Fails locally, without a network call, if the token is absent.
    pub async fn reset_password(
        &self,
        token: Option<&str>,
        new_password: &str,
    ) -> Result<Value, ApiError> {
        let token = require_token(token)?;
        let request = RequestDescriptor::post(format!(
            "/auth/reset-password/{}",
            urlencoding::encode(token)
        ))
        .anonymous()
        .json_value(json!({ "password": new_password }));
        self.api.dispatch(&request).await
    }

    /// End the session. Safe to call when already logged out.
    ///
    /// Returns `true` if a session was actually ended. Subscribers receive
    /// `SessionEvent::LoggedOut` only in that case.
    pub async fn logout(&self) -> bool {
        self.end_session(LogoutReason::UserRequested).await
    }

    /// Force a token refresh, sharing any refresh already in flight.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        self.refresher.refresh().await?;
        Ok(())
    }

    // ─── Identity ────────────────────────────────────────────────────────────

    /// The authenticated user, fetched from `GET /user/me` on first use and
    /// cached until invalidated.
    ///
    /// A terminal failure ends the session.
    pub async fn current_user(&self) -> Result<AuthenticatedUser, ApiError> {
        let mut cached = self.user.lock().await;

        if !self.store.has_session() {
            cached.take();
            return Err(ApiError::Unauthorized);
        }
        if let Some(user) = cached.as_ref() {
            return Ok(user.clone());
        }

        let request = RequestDescriptor::get(ME_PATH);
        let result = self.api.dispatch_as::<AuthenticatedUser>(&request).await;
        let user = match result {
            Ok(user) => user,
            Err(e) => {
                drop(cached);
                return self.end_session_on_terminal(Err(e)).await;
            }
        };

        tracing::debug!(user_id = %user.id, role = ?user.role, "Identity loaded");
        *cached = Some(user.clone());
        Ok(user)
    }

    /// True if the identity endpoint accepts the current session.
    pub async fn is_authenticated(&self) -> bool {
        self.current_user().await.is_ok()
    }

    /// Drop the cached identity so the next `current_user` refetches it.
    pub async fn invalidate_user(&self) {
        self.user.lock().await.take();
    }

    /// Route a terminal failure through logout, passing the result on.
    pub async fn end_session_on_terminal<T>(
        &self,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if e.is_terminal() {
                self.end_session(LogoutReason::Unauthorized).await;
            }
        }
        result
    }

    pub fn state(&self) -> SessionState {
        if self.store.has_session() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// Subscribe to session transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.teardown.subscribe()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    async fn end_session(&self, reason: LogoutReason) -> bool {
        self.user.lock().await.take();
        self.teardown.end_session(reason)
    }
}

fn require_token(token: Option<&str>) -> Result<&str, ApiError> {
    match token.map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::MissingArgument("token")),
    }
}
