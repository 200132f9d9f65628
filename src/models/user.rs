// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User identity and auth endpoint payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Server-assigned role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User identifier. The backend issues numeric ids; string ids are
/// accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(u64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for UserId {
    fn from(n: u64) -> Self {
        UserId::Number(n)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Text(s.to_string())
    }
}

impl PartialEq<u64> for UserId {
    fn eq(&self, other: &u64) -> bool {
        matches!(self, UserId::Number(n) if n == other)
    }
}

impl PartialEq<&str> for UserId {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, UserId::Text(s) if s == other)
    }
}

/// Identity reported by `GET /user/me`.
///
/// `firstName`, `lastName`, `email`, `avatar` and the rest of the profile
/// land in `profile` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub role: Role,
    #[serde(rename = "isVerified", alias = "verified", default)]
    pub verified: bool,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// User summary, when a backend includes one in the login response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

/// What a successful login reports back. Both tokens are already stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoginOutcome {
    /// Server greeting, e.g. `"Login successful"`
    pub message: Option<String>,
    pub user: Option<UserSummary>,
}

/// Login form.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Response from `POST /auth/login`: `{ token, refreshToken, message }`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

/// Body of `POST /auth/refresh-token`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from `POST /auth/refresh-token`: `{ token }`.
///
/// `refresh_token` is only present when the backend rotates it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
