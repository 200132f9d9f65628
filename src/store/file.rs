// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-disk session persistence.
//!
//! The file is a JSON object holding the two tokens under [`keys`]. It is
//! replaced via write-to-temp + rename so a crash mid-write leaves either
//! the old or the new pair, never a mix.

use super::keys;
use crate::models::Session;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Load the session saved at `path`.
///
/// A missing, unreadable or partial file yields an empty session.
pub fn load(path: &Path) -> Session {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Session::default(),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Failed to read session file");
            return Session::default();
        }
    };

    let object: Map<String, Value> = match serde_json::from_str(&raw) {
        Ok(object) => object,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Ignoring malformed session file");
            return Session::default();
        }
    };

    let field = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
    let session = Session {
        access_token: field(keys::ACCESS_TOKEN),
        refresh_token: field(keys::REFRESH_TOKEN),
    };

    if !session.is_empty() && !session.is_complete() {
        tracing::warn!(path = %path.display(), "Ignoring partial session file");
        return Session::default();
    }
    session
}

/// Persist `session`; an empty session removes the file.
pub fn save(path: &Path, session: &Session) -> io::Result<()> {
    if session.is_empty() {
        return match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
    }

    let mut object = Map::new();
    if let Some(token) = &session.access_token {
        object.insert(keys::ACCESS_TOKEN.to_string(), Value::from(token.as_str()));
    }
    if let Some(token) = &session.refresh_token {
        object.insert(keys::REFRESH_TOKEN.to_string(), Value::from(token.as_str()));
    }
    let contents = serde_json::to_vec(&Value::Object(object))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
