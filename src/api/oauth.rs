//! OAuth 2.0 for Google APIs.
//!
//! - `run_consent_flow` walks the user through Google's consent page once, catching the redirect
//!   on a short-lived local listener, and saves `token.json`.
//! - `TokenProvider` hands out access tokens afterwards, refreshing and re-saving them when they
//!   are about to expire. `SharedTokenProvider` lets the spreadsheet and file backends of one
//!   process use the same one, so that `token.json` has a single writer.

use crate::api::{SecretFile, TokenFile, OAUTH_SCOPES};
use crate::error::Res;
use anyhow::{bail, Context};
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};

/// The port of the local listener that receives the consent redirect.
const OAUTH_CALLBACK_PORT: u16 = 3030;

/// How long to wait for the user to finish the consent page.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// An `oauth2` client with the authorization and token endpoints set.
type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

fn oauth_client(secret: &SecretFile, redirect: Option<String>) -> Res<OAuthClient> {
    let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(
            TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?,
        );
    Ok(match redirect {
        Some(redirect) => {
            client.set_redirect_uri(RedirectUrl::new(redirect).context("Invalid redirect URI")?)
        }
        None => client,
    })
}

fn http_client() -> Res<reqwest::Client> {
    // Following redirects on the token endpoint would open us up to SSRF.
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the HTTP client for OAuth")
}

fn expiry(now: DateTime<Utc>, expires_in: Option<Duration>) -> DateTime<Utc> {
    let secs = expires_in.map(|d| d.as_secs()).unwrap_or(3600);
    now + chrono::Duration::seconds(i64::try_from(secs).unwrap_or(3600))
}

/// Provides valid access tokens for Google API calls.
#[derive(Debug, Clone)]
pub(crate) struct TokenProvider {
    secret: SecretFile,
    token: TokenFile,
}

impl TokenProvider {
    pub(crate) async fn load(
        client_secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        let secret = SecretFile::load(client_secret_path.as_ref()).await?;
        let token = TokenFile::load(token_path.as_ref())
            .await
            .context("Unable to load the OAuth token, have you run the auth command?")?;
        Ok(Self { secret, token })
    }

    /// When the current access token expires.
    pub(crate) fn expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at()
    }

    /// Returns an access token that is good for at least five minutes, refreshing it first if
    /// needed.
    pub(crate) async fn token_with_refresh(&mut self) -> Res<&str> {
        let now = Utc::now();
        if self.token.is_expired(now) {
            self.refresh_at(now).await?;
        }
        Ok(self.token.access_token())
    }

    /// Exchanges the refresh token for a new access token whether or not the current one expired.
    pub(crate) async fn refresh(&mut self) -> Res<()> {
        self.refresh_at(Utc::now()).await
    }

    async fn refresh_at(&mut self, now: DateTime<Utc>) -> Res<()> {
        debug!("Refreshing the OAuth access token");
        let client = oauth_client(&self.secret, None)?;
        let response = client
            .exchange_refresh_token(&RefreshToken::new(self.token.refresh_token().to_string()))
            .request_async(&http_client()?)
            .await
            .context("Failed to refresh the OAuth access token")?;

        self.token.update(
            response.access_token().secret().to_string(),
            expiry(now, response.expires_in()),
            response.refresh_token().map(|rt| rt.secret().to_string()),
        );
        self.token.save().await?;
        debug!("Token valid until {}", self.token.expires_at());
        Ok(())
    }
}

/// A `TokenProvider` behind a lock. Clones share it.
#[derive(Debug, Clone)]
pub(crate) struct SharedTokenProvider(Arc<Mutex<TokenProvider>>);

impl SharedTokenProvider {
    pub(crate) fn new(token_provider: TokenProvider) -> Self {
        Self(Arc::new(Mutex::new(token_provider)))
    }

    pub(crate) async fn load(
        client_secret_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
    ) -> Res<Self> {
        Ok(Self::new(
            TokenProvider::load(client_secret_path, token_path).await?,
        ))
    }

    /// A current access token, see `TokenProvider::token_with_refresh`.
    pub(crate) async fn access_token(&self) -> Res<String> {
        let mut token_provider = self.0.lock().await;
        Ok(token_provider.token_with_refresh().await?.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Runs the complete OAuth consent flow:
/// 1. Loads OAuth credentials from `client_secret.json`
/// 2. Starts a local HTTP listener on localhost
/// 3. Logs the Google consent URL for the user to open
/// 4. Waits for the callback with the authorization code
/// 5. Exchanges the code for access and refresh tokens
/// 6. Saves tokens to `token_path`
pub(crate) async fn run_consent_flow(client_secret_path: &Path, token_path: &Path) -> Res<PathBuf> {
    let secret = SecretFile::load(client_secret_path).await?;
    let redirect = format!("{}:{OAUTH_CALLBACK_PORT}", secret.redirect_uri());
    let client = oauth_client(&secret, Some(redirect.clone()))?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(OAUTH_SCOPES.iter().map(|s| Scope::new(s.to_string())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    let params = wait_for_callback(auth_url.as_str(), &redirect).await?;
    if let Some(error) = params.error {
        bail!("Google returned an error from the consent page: {error}");
    }
    if params.state.as_deref() != Some(csrf_token.secret().as_str()) {
        bail!("The OAuth state parameter did not match, aborting");
    }
    let code = params
        .code
        .context("The OAuth callback did not include an authorization code")?;

    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(&http_client()?)
        .await
        .context("Failed to exchange the authorization code for tokens")?;

    let refresh_token = response
        .refresh_token()
        .context("Google did not return a refresh token")?
        .secret()
        .to_string();
    let token = TokenFile::new(
        token_path,
        response.access_token().secret().to_string(),
        refresh_token,
        expiry(Utc::now(), response.expires_in()),
    );
    token.save().await?;
    info!("Tokens saved to {}", token_path.display());
    Ok(token_path.to_path_buf())
}

/// Serves a single OAuth redirect on the callback port and returns its query parameters.
async fn wait_for_callback(auth_url: &str, redirect: &str) -> Res<CallbackParams> {
    let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);
    let app = Router::new().route(
        "/",
        get(move |Query(params): Query<CallbackParams>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(params).await;
                Html("Authorization complete. You can close this window.")
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", OAUTH_CALLBACK_PORT))
        .await
        .with_context(|| format!("Unable to listen on port {OAUTH_CALLBACK_PORT}"))?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    info!("Open this URL in your browser to authorize access:\n\n{auth_url}\n");
    info!("Waiting for the redirect to {redirect} ...");

    let params = tokio::time::timeout(CONSENT_TIMEOUT, rx.recv())
        .await
        .context("Timed out waiting for the OAuth redirect")?
        .context("The OAuth callback listener stopped unexpectedly")?;

    let _ = shutdown_tx.send(());
    server
        .await
        .context("The OAuth callback listener panicked")?
        .context("The OAuth callback listener failed")?;
    Ok(params)
}
