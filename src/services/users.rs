// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User resource endpoints.
//!
//! Payloads are passed through as JSON; only the identity endpoint is typed.

use crate::error::ApiError;
use crate::models::{AuthenticatedUser, RequestDescriptor, Upload};
use crate::services::{ApiClient, SessionController};
use serde_json::{Map, Value};
use std::fmt::Display;

/// Form field the backend expects the avatar file under.
pub const AVATAR_FIELD: &str = "avatar";

/// Direction for [`UserListQuery::sort_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Paging, sorting and search for `GET /user/all`. Unset fields are left
/// to the backend's defaults.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub search: Option<String>,
}

impl UserListQuery {
    fn apply(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        if let Some(page) = self.page {
            request = request.query("page", page.to_string());
        }
        if let Some(limit) = self.limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(sort_by) = &self.sort_by {
            request = request.query("sortBy", sort_by.as_str());
        }
        if let Some(order) = self.sort_order {
            request = request.query("sortOrder", order.as_str());
        }
        match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => request.query("search", search),
            _ => request,
        }
    }
}

/// Thin wrappers over the `/user` endpoints.
#[derive(Clone)]
pub struct UsersApi {
    api: ApiClient,
    session: SessionController,
}

impl UsersApi {
    pub fn new(api: ApiClient, session: SessionController) -> Self {
        Self { api, session }
    }

    /// `GET /user/me`, bypassing the identity cache.
    pub async fn me(&self) -> Result<AuthenticatedUser, ApiError> {
        self.api
            .dispatch_as(&RequestDescriptor::get(super::session::ME_PATH))
            .await
    }

    /// `GET /user/all`, answering `{ total, users }`.
    pub async fn list(&self, query: &UserListQuery) -> Result<Value, ApiError> {
        let request = query.apply(RequestDescriptor::get("/user/all"));
        self.api.dispatch(&request).await
    }

    /// `POST /user/add`
    pub async fn add(&self, user: &Value) -> Result<Value, ApiError> {
        let request = RequestDescriptor::post("/user/add").json_value(user.clone());
        self.api.dispatch(&request).await
    }

    /// `PUT /user/{id}` with a JSON body.
    pub async fn update(&self, id: impl Display, fields: &Value) -> Result<Value, ApiError> {
        let request = RequestDescriptor::put(user_path(&id)).json_value(fields.clone());
        let response = self.api.dispatch(&request).await?;
        self.session.invalidate_user().await;
        Ok(response)
    }

    /// `PUT /user/{id}` as multipart, with a new avatar image.
    ///
    /// String-valued `fields` are sent as text parts next to the file;
    /// other values are sent as their JSON text.
    pub async fn update_with_avatar(
        &self,
        id: impl Display,
        fields: &Map<String, Value>,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        let upload = fields.iter().fold(
            Upload::new(AVATAR_FIELD, file_name, content_type, bytes),
            |upload, (name, value)| match value {
                Value::String(s) => upload.with_field(name.as_str(), s.as_str()),
                other => upload.with_field(name.as_str(), other.to_string()),
            },
        );

        let request = RequestDescriptor::put(user_path(&id)).multipart(upload);
        let response = self.api.dispatch(&request).await?;
        self.session.invalidate_user().await;
        tracing::info!(user_id = %id, "Avatar uploaded");
        Ok(response)
    }

    /// `DELETE /user/{id}`
    pub async fn delete(&self, id: impl Display) -> Result<Value, ApiError> {
        let response = self
            .api
            .dispatch(&RequestDescriptor::delete(user_path(&id)))
            .await?;
        self.session.invalidate_user().await;
        Ok(response)
    }

    /// `GET /user/stats`
    pub async fn stats(&self) -> Result<Value, ApiError> {
        self.api.dispatch(&RequestDescriptor::get("/user/stats")).await
    }
}

fn user_path(id: &impl Display) -> String {
    format!("/user/{}", urlencoding::encode(&id.to_string()))
}
