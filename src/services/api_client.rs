// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated API client.
//!
//! Handles:
//! - Bearer token attachment from the token store
//! - One refresh-and-retry on 401
//! - Error normalization (network / HTTP / unauthorized / refresh failure)
//! - JSON and multipart request bodies

use crate::error::{ApiError, NetworkError, RefreshError};
use crate::models::{AuthMode, RequestBody, RequestDescriptor};
use crate::services::RefreshCoordinator;
use crate::store::TokenStore;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Sends [`RequestDescriptor`]s to the backend on behalf of the session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: TokenStore,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        store: TokenStore,
        refresher: RefreshCoordinator,
    ) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            store,
            refresher,
        }
    }

    /// Send a request and return its parsed JSON body.
    ///
    /// A 401 on a bearer request triggers exactly one refresh and one retry;
    /// whatever the retry returns is final.
    ///
    /// If the refresh is refused (or there is no refresh token) the request
    /// fails with `Unauthorized`. Any other refresh failure is returned as
    /// `RefreshFailed` with its cause, so a refresh timeout still reports
    /// [`ApiError::is_timeout`].
    pub async fn dispatch(&self, request: &RequestDescriptor) -> Result<Value, ApiError> {
        if request.auth == AuthMode::Anonymous {
            let response = self.send(request, None).await?;
            return read_body(response).await;
        }

        let token = self.store.access_token();
        let response = self.send(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_body(response).await;
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            had_token = token.is_some(),
            "Request unauthorized, refreshing access token"
        );

        let fresh = match self.refresher.refresh_rejected(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!(path = %request.path, error = %e, "Refresh failed, request not retried");
                return Err(refresh_failure(e));
            }
        };

        let retried = self.send(request, Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "Request still unauthorized after refresh");
            return Err(ApiError::Unauthorized);
        }
        read_body(retried).await
    }

    /// Like [`dispatch`](Self::dispatch), decoding the body into `T`.
    pub async fn dispatch_as<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
    ) -> Result<T, ApiError> {
        let value = self.dispatch(request).await?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::Network(NetworkError::MalformedBody(e.to_string())))
    }

    /// The store this client reads tokens from.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    async fn send(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(upload) => builder.multipart(
                upload
                    .to_form()
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
            ),
        };

        builder.send().await.map_err(ApiError::from)
    }
}

fn refresh_failure(err: RefreshError) -> ApiError {
    match err {
        RefreshError::NoRefreshToken | RefreshError::Rejected { .. } => ApiError::Unauthorized,
        other => ApiError::RefreshFailed(other),
    }
}

/// Check response status and parse the JSON body.
///
/// Non-2xx responses keep their body text for diagnostics. An empty 2xx
/// body parses as `null`.
async fn read_body(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response.text().await.map_err(NetworkError::from)?;

    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "Request failed");
        return Err(ApiError::Http {
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| ApiError::Network(NetworkError::MalformedBody(e.to_string())))
}
