// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-flight access token refresh.
//!
//! Any number of requests can hit a 401 at once. The first one to ask for
//! a refresh starts the exchange with `POST /auth/refresh-token`; every
//! other caller attaches to the same pending future and receives the same
//! outcome. When the exchange settles the coordinator goes idle, so a later
//! wave of 401s triggers a fresh attempt.

use crate::error::{NetworkError, RefreshError};
use crate::models::user::{RefreshRequest, RefreshResponse};
use crate::models::{LogoutReason, SessionEvent};
use crate::services::SessionTeardown;
use crate::store::TokenStore;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/auth/refresh-token";

type RefreshOutcome = Result<String, RefreshError>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Collapses concurrent refresh demand into one network call.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    store: TokenStore,
    teardown: SessionTeardown,
    /// The pending refresh, if one is running. Start-or-attach is decided
    /// while holding this lock.
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        store: TokenStore,
        teardown: SessionTeardown,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: format!("{}{}", base_url, REFRESH_PATH),
                store,
                teardown,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Obtain a new access token, joining a refresh already in progress.
    pub async fn refresh(&self) -> RefreshOutcome {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            self.join_or_start(&mut slot)
        };
        flight.await
    }

    /// Obtain a replacement for `rejected`, the token a request was just
    /// refused with.
    ///
    /// If the store already holds a different access token (another caller
    /// finished a refresh after this request was sent) that token is
    /// returned without a network call.
    pub async fn refresh_rejected(&self, rejected: Option<&str>) -> RefreshOutcome {
        let flight = {
            let mut slot = self.inner.in_flight.lock().await;
            if slot.is_none() {
                if let Some(current) = self.inner.store.access_token() {
                    if rejected != Some(current.as_str()) {
                        tracing::debug!("Access token already replaced, skipping refresh");
                        return Ok(current);
                    }
                }
            }
            self.join_or_start(&mut slot)
        };
        flight.await
    }

    /// True while a refresh exchange is pending.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().await.is_some()
    }

    fn join_or_start(&self, slot: &mut Option<InFlight>) -> InFlight {
        if let Some(flight) = slot.as_ref() {
            tracing::debug!("Joining in-flight token refresh");
            return flight.clone();
        }

        tracing::debug!("Starting token refresh");
        let flight = run(self.inner.clone()).boxed().shared();
        *slot = Some(flight.clone());
        flight
    }
}

/// Perform one refresh, settle the session, then go idle.
async fn run(inner: Arc<Inner>) -> RefreshOutcome {
    let outcome = match inner.store.refresh_token() {
        Some(used) => inner.settle(&used, inner.exchange(&used).await),
        // Sessions are stored whole, so there is nothing left to clear.
        None => {
            tracing::warn!("Token refresh needed but no refresh token is stored");
            Err(RefreshError::NoRefreshToken)
        }
    };

    inner.in_flight.lock().await.take();
    outcome
}

impl Inner {
    /// Apply the result of exchanging `used` to the session.
    ///
    /// Failure ends the session only while it still holds `used`; if a new
    /// login replaced it meanwhile, the failure is reported as
    /// `SessionEnded` and the new session is left alone.
    fn settle(&self, used: &str, outcome: RefreshOutcome) -> RefreshOutcome {
        match outcome {
            Ok(token) => {
                tracing::info!("Access token refreshed");
                self.teardown.emit(SessionEvent::TokenRefreshed);
                Ok(token)
            }
            Err(RefreshError::SessionEnded) => {
                tracing::debug!("Session ended during refresh, discarding token");
                Err(RefreshError::SessionEnded)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                // Clear before going idle, so a caller arriving next sees the
                // empty store rather than the stale pair.
                if self.teardown.end_session_for(used, LogoutReason::RefreshFailed) {
                    Err(e)
                } else {
                    Err(RefreshError::SessionEnded)
                }
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> RefreshOutcome {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Network(NetworkError::from(e)))?;

        let rotated = tokens.refresh_token.is_some();
        if !self
            .store
            .install_refreshed(refresh_token, tokens.token.clone(), tokens.refresh_token)
        {
            return Err(RefreshError::SessionEnded);
        }
        tracing::debug!(rotated, "Refreshed tokens stored");

        Ok(tokens.token)
    }
}
