// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User admin client: authenticated access to the user-management API.
//!
//! This crate provides the bearer-token API client with single-flight
//! token refresh, the session token store and the session controller
//! that drives login, logout and the password/email flows.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use anyhow::Context;
use config::Config;
use services::{ApiClient, RefreshCoordinator, SessionController, SessionTeardown, UsersApi};
use store::TokenStore;

/// Fully wired client, constructed once at startup.
#[derive(Clone)]
pub struct Client {
    pub config: Config,
    pub store: TokenStore,
    pub api: ApiClient,
    pub session: SessionController,
    pub users: UsersApi,
}

impl Client {
    /// Build the client, opening the token store named in `config`.
    pub fn new(config: Config) -> Result<Self, error::ApiError> {
        let store = match &config.token_store_path {
            Some(path) => TokenStore::open(path),
            None => TokenStore::in_memory(),
        };
        Self::with_store(config, store)
    }

    /// Build the client around an existing token store.
    pub fn with_store(config: Config, store: TokenStore) -> Result<Self, error::ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let teardown = SessionTeardown::new(store.clone());
        let refresher = RefreshCoordinator::new(
            http.clone(),
            &config.api_base_url,
            store.clone(),
            teardown.clone(),
        );
        let api = ApiClient::new(http, &config.api_base_url, store.clone(), refresher.clone());
        let session = SessionController::new(api.clone(), store.clone(), refresher, teardown);
        let users = UsersApi::new(api.clone(), session.clone());

        tracing::debug!(
            base_url = %config.api_base_url,
            timeout_secs = config.request_timeout.as_secs(),
            "Client initialized"
        );

        Ok(Self {
            config,
            store,
            api,
            session,
            users,
        })
    }
}
