// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the client.

pub mod request;
pub mod session;
pub mod user;

pub use request::{AuthMode, RequestBody, RequestDescriptor, Upload};
pub use session::{LogoutReason, Session, SessionEvent, SessionState};
pub use user::{AuthenticatedUser, Credentials, LoginOutcome, Role, UserId, UserSummary};
