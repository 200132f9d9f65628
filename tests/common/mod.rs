// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process fake of the user-management backend.
//!
//! Serves the auth and user endpoints on `127.0.0.1:<random>` and counts
//! calls so tests can assert on exactly how many refreshes and retries the
//! client performed.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use user_admin_client::{config::Config, store::TokenStore, Client};

/// Password the fake backend accepts for any email.
#[allow(dead_code)]
pub const GOOD_PASSWORD: &str = "correct-horse";

/// Shared state of the fake backend.
#[derive(Default)]
pub struct BackendState {
    valid_access: Mutex<HashSet<String>>,
    valid_refresh: Mutex<HashSet<String>>,
    issued: AtomicUsize,
    pub rotate_refresh: AtomicBool,
    pub refresh_delay: Mutex<Duration>,
    pub stats_delay: Mutex<Duration>,
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    /// Every authenticated resource request, including retries
    pub resource_calls: AtomicUsize,
    /// Bearer tokens seen on resource requests, in arrival order
    pub seen_tokens: Mutex<Vec<Option<String>>>,
    pub last_content_type: Mutex<Option<String>>,
    pub last_body: Mutex<Option<String>>,
    /// Query string of the last `GET /user/all`
    pub last_list_query: Mutex<Option<HashMap<String, String>>>,
}

#[allow(dead_code)]
impl BackendState {
    pub fn allow_access(&self, token: &str) {
        self.valid_access.lock().unwrap().insert(token.to_string());
    }

    pub fn allow_refresh(&self, token: &str) {
        self.valid_refresh.lock().unwrap().insert(token.to_string());
    }

    /// Reject every access token issued so far.
    pub fn expire_all_access(&self) {
        self.valid_access.lock().unwrap().clear();
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn set_stats_delay(&self, delay: Duration) {
        *self.stats_delay.lock().unwrap() = delay;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn resource_calls(&self) -> usize {
        self.resource_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.seen_tokens.lock().unwrap().clone()
    }

    pub fn last_list_query(&self) -> HashMap<String, String> {
        self.last_list_query.lock().unwrap().clone().unwrap_or_default()
    }

    fn issue(&self, prefix: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }

    /// Record a resource request and report whether its bearer is valid.
    fn authorize(&self, headers: &HeaderMap) -> bool {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);
        self.seen_tokens.lock().unwrap().push(token.clone());
        token.is_some_and(|t| self.valid_access.lock().unwrap().contains(&t))
    }
}

/// A running fake backend.
pub struct Backend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

#[allow(dead_code)]
impl Backend {
    /// Client pointing at this backend with an in-memory token store.
    pub fn client(&self) -> Client {
        self.client_with(Config::with_base_url(&self.base_url), TokenStore::in_memory())
    }

    pub fn client_with(&self, config: Config, store: TokenStore) -> Client {
        Client::with_store(config, store).expect("client should build")
    }

    /// Config for this backend with a custom request timeout.
    pub fn config_with_timeout(&self, timeout: Duration) -> Config {
        Config {
            request_timeout: timeout,
            ..Config::with_base_url(&self.base_url)
        }
    }
}

/// Start a fake backend on a random local port.
pub async fn spawn_backend() -> Backend {
    let state = Arc::new(BackendState::default());

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/{token}", post(reset_password))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/user/me", get(me))
        .route("/user/all", get(all_users))
        .route("/user/add", post(add_user))
        .route("/user/stats", get(stats))
        .route("/user/broken", get(broken))
        .route("/user/fail", get(fail))
        .route("/user/locked", get(locked))
        .route("/user/{id}", delete(delete_user).put(update_user))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake backend");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Backend {
        base_url: format!("http://{}", addr),
        state,
    }
}

type Shared = State<Arc<BackendState>>;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthorized" })),
    )
        .into_response()
}

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] != GOOD_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }

    let access = state.issue("access");
    let refresh = state.issue("refresh");
    state.allow_access(&access);
    state.allow_refresh(&refresh);

    Json(json!({
        "message": "Login successful",
        "token": access,
        "refreshToken": refresh
    }))
    .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "message": "Registered", "email": body["email"] })),
    )
        .into_response()
}

async fn forgot_password(Json(body): Json<Value>) -> Response {
    Json(json!({ "message": "Reset email sent", "email": body["email"] })).into_response()
}

async fn reset_password(Path(token): Path<String>, Json(body): Json<Value>) -> Response {
    Json(json!({ "reset": true, "token": token, "password": body["password"] })).into_response()
}

async fn verify_email(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let authenticated = headers.contains_key(header::AUTHORIZATION);
    match params.get("token") {
        Some(token) => Json(json!({
            "message": "Email verified",
            "token": token,
            "authenticated": authenticated
        }))
        .into_response(),
        None => (StatusCode::BAD_REQUEST, "missing token").into_response(),
    }
}

async fn refresh_token(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    if !state.valid_refresh.lock().unwrap().contains(&presented) {
        return unauthorized();
    }

    let access = state.issue("access");
    state.allow_access(&access);

    if state.rotate_refresh.load(Ordering::SeqCst) {
        let refresh = state.issue("refresh");
        state.valid_refresh.lock().unwrap().remove(&presented);
        state.allow_refresh(&refresh);
        return Json(json!({ "token": access, "refreshToken": refresh })).into_response();
    }

    Json(json!({ "token": access })).into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({
        "id": 1,
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "role": "admin",
        "isVerified": true,
        "avatar": null,
        "createdAt": "2024-01-01T00:00:00.000Z"
    }))
    .into_response()
}

async fn all_users(
    State(state): Shared,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    *state.last_list_query.lock().unwrap() = Some(params);
    Json(json!({
        "total": 2,
        "users": [
            { "id": 1, "firstName": "Ada", "role": "admin", "isVerified": true },
            { "id": 2, "firstName": "Grace", "role": "user", "isVerified": false }
        ]
    }))
    .into_response()
}

async fn add_user(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    let mut created = body;
    created["id"] = json!(3);
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update_user(
    State(state): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));
    *state.last_content_type.lock().unwrap() = content_type;
    *state.last_body.lock().unwrap() = Some(String::from_utf8_lossy(&body).into_owned());

    let id = id.parse::<u64>().map(Value::from).unwrap_or(Value::from(id));
    let avatar = multipart.then(|| format!("/uploads/avatar-{}.png", id));
    Json(json!({
        "message": "User updated",
        "id": id,
        "avatar": avatar
    }))
    .into_response()
}

async fn delete_user(State(state): Shared, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn stats(State(state): Shared, headers: HeaderMap) -> Response {
    let delay = *state.stats_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if !state.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({ "total": 2, "admins": 1, "verified": 2 })).into_response()
}

async fn broken(State(state): Shared, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        "{not json",
    )
        .into_response()
}

async fn fail(State(state): Shared, headers: HeaderMap) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    (StatusCode::INTERNAL_SERVER_ERROR, "database exploded").into_response()
}

/// Rejects every token, including freshly refreshed ones.
async fn locked(State(state): Shared, headers: HeaderMap) -> Response {
    state.authorize(&headers);
    unauthorized()
}
