//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `money-tracker auth` - Initial OAuth consent flow
//! - `money-tracker auth --verify` - Verify and refresh authentication

use crate::api::{self, run_consent_flow, Mode, SharedTokenProvider, TokenProvider, ENTRIES};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// What `auth --verify` found.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub spreadsheet_id: String,
    pub sheet_names: Vec<String>,
    /// Whether the `Entries` tab exists yet. It is created by `serve` when missing.
    pub has_entries: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Handles the `money-tracker auth` command - runs the OAuth consent flow.
///
/// This is the only command that asks the user to open a browser:
/// 1. Loads client_secret.json
/// 2. Prints the consent URL and waits for Google's redirect
/// 3. Saves tokens to token.json with the required scopes
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let token_path = run_consent_flow(&config.client_secret_path(), &config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok(format!(
        "Authorization complete, tokens saved to {}",
        token_path.display()
    )
    .into())
}

/// Handles the `money-tracker auth --verify` command - verifies authentication.
///
/// This command never starts the consent flow. It refreshes the access token and reads the tab
/// names of the spreadsheet, which proves both that the token works and that the sheet is
/// reachable. If the token is missing or invalid it fails and suggests running `auth`.
pub async fn auth_verify(config: &Config, mode: Mode) -> Result<Out<AuthStatus>> {
    let (backends, token_expires_at) = match mode {
        Mode::Google => {
            let mut token_provider =
                TokenProvider::load(config.client_secret_path(), config.token_path())
                    .await
                    .context(
                        "Unable to use the existing tokens found in the token JSON file.\n\n\
                        You should run 'money-tracker auth' (without the --verify flag).",
                    )
                    .pub_result(ErrorType::Auth)?;
            token_provider
                .refresh()
                .await
                .context("Unable to refresh the token")
                .pub_result(ErrorType::Auth)?;
            let expires_at = token_provider.expires_at();
            let backends =
                api::google_backends(config, SharedTokenProvider::new(token_provider)).await;
            (backends, Some(expires_at))
        }
        Mode::Test => (api::backends(config, mode).await, None),
    };

    let mut sheet = backends.pub_result(ErrorType::Auth)?.sheet;
    let sheet_names = sheet
        .sheet_names()
        .await
        .context("Unable to read the spreadsheet")
        .pub_result(ErrorType::Auth)?;
    let has_entries = sheet_names.iter().any(|n| n == ENTRIES);
    info!("Found tabs: {}", sheet_names.join(", "));

    Ok(Out::with_detail(
        "Your OAuth token is valid!",
        AuthStatus {
            spreadsheet_id: config.spreadsheet_id().to_string(),
            sheet_names,
            has_entries,
            token_expires_at,
        },
    ))
}
