// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User admin command-line client.
//!
//! Usage: `user-admin <login|me|users [page]|stats|logout>`
//!
//! `login` reads `API_EMAIL` and `API_PASSWORD`. Set `TOKEN_STORE_PATH` to
//! keep the session between invocations.

use anyhow::{bail, Context};
use serde_json::Value;
use user_admin_client::{
    config::Config,
    models::{Credentials, SessionEvent},
    services::UserListQuery,
    Client,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(base_url = %config.api_base_url, "Starting user admin client");

    let client = Client::new(config)?;

    // Navigation belongs to the UI; here a logout just gets reported.
    let mut events = client.session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::LoggedOut { reason } = event {
                tracing::info!(?reason, "Signed out, login required");
            }
        }
    });

    let command = std::env::args().nth(1).unwrap_or_else(|| "me".to_string());
    match command.as_str() {
        "login" => {
            let email = std::env::var("API_EMAIL").context("API_EMAIL is not set")?;
            let password = std::env::var("API_PASSWORD").context("API_PASSWORD is not set")?;
            let outcome = client
                .session
                .login(&Credentials::new(email, password))
                .await?;
            print_json(&serde_json::to_value(&outcome)?)?;
        }
        "me" => {
            let user = client.session.current_user().await?;
            print_json(&serde_json::to_value(&user)?)?;
        }
        "users" => {
            let page = std::env::args()
                .nth(2)
                .map(|p| p.parse::<u32>())
                .transpose()
                .context("page must be a number")?;
            let query = UserListQuery {
                page,
                ..Default::default()
            };
            let result = client.users.list(&query).await;
            print_json(&client.session.end_session_on_terminal(result).await?)?;
        }
        "stats" => {
            let result = client.users.stats().await;
            print_json(&client.session.end_session_on_terminal(result).await?)?;
        }
        "logout" => {
            if !client.session.logout().await {
                tracing::info!("Already logged out");
            }
        }
        other => bail!("Unknown command: {}", other),
    }

    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("user_admin_client=debug,info")),
        )
        .with(format)
        .init();
}
