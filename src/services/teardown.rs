// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The single path that ends a session.

use crate::models::{LogoutReason, SessionEvent};
use crate::store::TokenStore;
use tokio::sync::broadcast;

/// Capacity of the session event channel. Slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Clears the token store and announces the transition to subscribers.
///
/// Shared by `SessionController::logout` and the refresh failure branch.
#[derive(Clone)]
pub struct SessionTeardown {
    store: TokenStore,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionTeardown {
    pub fn new(store: TokenStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { store, events }
    }

    /// End the session. Returns `false` if there was no session to end,
    /// in which case no event is emitted.
    pub fn end_session(&self, reason: LogoutReason) -> bool {
        if !self.store.clear() {
            tracing::debug!(?reason, "Teardown requested with no active session");
            return false;
        }
        tracing::info!(?reason, "Session ended");
        self.emit(SessionEvent::LoggedOut { reason });
        true
    }

    /// End the session only if it is still the one that owned
    /// `used_refresh_token`. A session installed by a newer login survives.
    pub(crate) fn end_session_for(&self, used_refresh_token: &str, reason: LogoutReason) -> bool {
        if !self.store.clear_if_refresh(used_refresh_token) {
            tracing::debug!(?reason, "Session replaced or already ended, nothing to tear down");
            return false;
        }
        tracing::info!(?reason, "Session ended");
        self.emit(SessionEvent::LoggedOut { reason });
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
