//! Serialization and deserialization structures for Google OAuth credential files.
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - `token.json`: the access and refresh tokens obtained through the consent flow

use crate::api::OAUTH_SCOPES;
use crate::error::Res;
use crate::utils;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
const REDIRECT: &str = "http://localhost";

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console.
///
/// This file contains OAuth 2.0 Desktop Application credentials. The standard format from Google
/// has an "installed" wrapper around the actual credentials.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct SecretFile {
    installed: InstalledCredentials,
}

impl SecretFile {
    pub(crate) async fn load(path: &Path) -> Res<SecretFile> {
        utils::deserialize(path)
            .await
            .context("Unable to read the OAuth client secret file")
    }

    /// The redirect URI without a port. The consent flow appends the callback port to it.
    pub(crate) fn redirect_uri(&self) -> &str {
        REDIRECT
    }

    pub(crate) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(crate) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(crate) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,

    /// For this application, should contain "http://localhost" (without a port number)
    redirect_uris: RedirectUris,

    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| is_valid_redirect(s)) {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the OAuth client for your Google project, you must include \
                '{REDIRECT}'"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

fn is_valid_redirect(s: &str) -> bool {
    s == REDIRECT || s == "http://127.0.0.1"
}

/// This is how we save the token information that we receive from Google OAuth. We keep our own
/// structure rather than Google's so that the expiry is an absolute time.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct TokenFile {
    #[serde(skip)]
    path: PathBuf,
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
    id_token: Option<String>,
}

impl TokenFile {
    pub(crate) async fn load(p: impl AsRef<Path>) -> Res<Self> {
        let path = p.as_ref();
        let mut token_file: Self = utils::deserialize(path)
            .await
            .context("Unable to deserialize the token JSON file")?;
        token_file.validate_scopes()?;
        token_file.path = path.to_path_buf();
        Ok(token_file)
    }

    fn validate_scopes(&self) -> Res<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for &required_scope in OAUTH_SCOPES {
            if !found_scopes.contains(required_scope) {
                bail!("OAuth scope '{required_scope}' is missing. Run the auth command again.");
            }
        }
        Ok(())
    }

    pub(crate) fn new(
        path: impl Into<PathBuf>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            scopes: OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
            access_token,
            refresh_token,
            expires_at,
            id_token: None,
        }
    }

    /// Saves the token to the path it was loaded from, readable only by the current user.
    pub(crate) async fn save(&self) -> Res<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize token to JSON")?;
        utils::write(&self.path, json).await?;
        utils::restrict_permissions(&self.path)
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(crate) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(crate) fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= now + buffer
    }

    /// Update the token with new values
    pub(crate) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_secret(redirects: &str) -> (TempDir, PathBuf) {
        let json_data = format!(
            r#"
{{
    "installed": {{
        "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
        "client_secret": "YOUR_CLIENT_SECRET",
        "redirect_uris": {redirects},
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token"
    }}
}}
"#
        );
        let temp_dir = TempDir::new().unwrap();
        let p = temp_dir.path().join("client_secret.json");
        utils::write(&p, json_data).await.unwrap();
        (temp_dir, p)
    }

    #[tokio::test]
    async fn test_client_secret_good_redirect() {
        let (_t, p) =
            write_secret(r#"["http://localhost", "https://example.com:4040/whatever"]"#).await;
        let secret_file = SecretFile::load(&p).await.unwrap();
        assert_eq!("http://localhost", secret_file.redirect_uri());
        assert_eq!(
            "YOUR_CLIENT_ID.apps.googleusercontent.com",
            secret_file.client_id()
        );
        assert_eq!("https://oauth2.googleapis.com/token", secret_file.token_uri());
    }

    #[tokio::test]
    async fn test_client_secret_loopback_ip_redirect() {
        let (_t, p) = write_secret(r#"["http://127.0.0.1"]"#).await;
        let secret_file = SecretFile::load(&p).await.unwrap();
        assert_eq!("http://localhost", secret_file.redirect_uri());
    }

    #[tokio::test]
    async fn test_client_secret_bad_redirect() {
        let (_t, p) = write_secret(r#"["http://localhost:9900"]"#).await;
        let parse_error = SecretFile::load(&p).await.unwrap_err();
        let parse_error_message = format!("{parse_error:?}");
        assert!(
            parse_error_message.contains("At least one of the redirects needs to be http://localhost")
        );
    }

    #[tokio::test]
    async fn test_token_file_missing_drive_scope() {
        let json = r##"
        {
            "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
            "access_token": "abc12",
            "refresh_token": "xyz89",
            "expires_at": "2025-01-01T00:00:00Z",
            "id_token": null
        }
        "##;
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        utils::write(&json_path, json).await.unwrap();

        let error_message = TokenFile::load(&json_path).await.unwrap_err().to_string();
        assert!(error_message.contains("https://www.googleapis.com/auth/drive"));
    }

    #[tokio::test]
    async fn test_token_file_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let json_path = tmp.path().join("token.json");
        let expires_at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let token = TokenFile::new(&json_path, "abc".into(), "refresh".into(), expires_at);
        token.save().await.unwrap();

        let loaded = TokenFile::load(&json_path).await.unwrap();
        assert_eq!(loaded.access_token(), "abc");
        assert_eq!(loaded.refresh_token(), "refresh");
        assert_eq!(loaded.expires_at(), expires_at);
    }

    #[test]
    fn test_token_expiry_buffer() {
        let expires_at = DateTime::parse_from_rfc3339("2026-01-01T00:10:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut token = TokenFile::new("token.json", "a".into(), "r".into(), expires_at);
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + chrono::Duration::minutes(6)));

        token.update("b".into(), expires_at + chrono::Duration::hours(1), None);
        assert_eq!(token.access_token(), "b");
        assert_eq!(token.refresh_token(), "r");
        assert!(!token.is_expired(now + chrono::Duration::minutes(6)));
    }
}
