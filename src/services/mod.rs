// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - request, refresh and session logic.

pub mod api_client;
pub mod refresh;
pub mod session;
pub mod teardown;
pub mod users;

pub use api_client::ApiClient;
pub use refresh::RefreshCoordinator;
pub use session::SessionController;
pub use teardown::SessionTeardown;
pub use users::{SortOrder, UserListQuery, UsersApi};
