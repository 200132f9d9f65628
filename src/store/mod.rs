// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token storage.
//!
//! A single [`TokenStore`] is constructed at startup and shared (by clone)
//! with the API client, the refresh coordinator and the session controller.
//! Only the refresh coordinator and the session teardown path write to it.

pub mod file;

use crate::models::Session;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Fixed keys under which the tokens are persisted.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "token";
    pub const REFRESH_TOKEN: &str = "refreshToken";
}

/// Holder of the current [`Session`].
///
/// Every mutation replaces the whole session under one write lock, so
/// readers never observe a half-updated pair.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<RwLock<Session>>,
    path: Option<Arc<PathBuf>>,
}

impl TokenStore {
    /// Memory-only store, starting empty.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Session::default())),
            path: None,
        }
    }

    /// Store persisted to `path`, loading any session already saved there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = file::load(&path);
        tracing::debug!(
            path = %path.display(),
            restored = !session.is_empty(),
            "Token store opened"
        );
        Self {
            inner: Arc::new(RwLock::new(session)),
            path: Some(Arc::new(path)),
        }
    }

    /// Snapshot of the current session.
    pub fn get(&self) -> Session {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn has_session(&self) -> bool {
        !self.read().is_empty()
    }

    /// Atomically replace both tokens.
    ///
    /// A partial session is treated as a clear.
    pub fn set(&self, session: Session) {
        if !session.is_complete() {
            tracing::warn!("Refusing to store partial session, clearing instead");
            self.clear();
            return;
        }
        let mut guard = self.write();
        *guard = session;
        self.persist(&guard);
    }

    /// Atomically remove both tokens. Returns `false` if already empty.
    pub fn clear(&self) -> bool {
        let mut guard = self.write();
        if guard.is_empty() {
            return false;
        }
        *guard = Session::default();
        self.persist(&guard);
        true
    }

    /// Clear the session only if it still holds `used_refresh_token`.
    ///
    /// Returns `false` (and changes nothing) if the session was cleared or
    /// replaced by a new login since that token was read.
    pub(crate) fn clear_if_refresh(&self, used_refresh_token: &str) -> bool {
        let mut guard = self.write();
        if guard.refresh_token.as_deref() != Some(used_refresh_token) {
            return false;
        }
        *guard = Session::default();
        self.persist(&guard);
        true
    }

    /// Install a refreshed access token, provided the session still holds
    /// the refresh token the refresh was performed with.
    ///
    /// `rotated` replaces the refresh token as well when the backend issued
    /// a new one. Returns `false` (and changes nothing) if the session was
    /// cleared or replaced meanwhile.
    pub(crate) fn install_refreshed(
        &self,
        used_refresh_token: &str,
        access_token: String,
        rotated: Option<String>,
    ) -> bool {
        let mut guard = self.write();
        if guard.refresh_token.as_deref() != Some(used_refresh_token) {
            return false;
        }
        let refresh_token = rotated.or_else(|| guard.refresh_token.take());
        *guard = Session {
            access_token: Some(access_token),
            refresh_token,
        };
        self.persist(&guard);
        true
    }

    fn persist(&self, session: &Session) {
        if let Some(path) = &self.path {
            if let Err(e) = file::save(path, session) {
                // In-memory state stays authoritative for this process.
                tracing::warn!(error = %e, path = %path.display(), "Failed to persist session");
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("session", &*self.read())
            .field("path", &self.path)
            .finish()
    }
}
