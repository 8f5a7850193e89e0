//! Access-token acquisition from a stored OAuth2 token file.
//!
//! The interactive consent flow is not handled here. The token file is the
//! "authorized user" JSON written by Google's client libraries:
//!
//! ```json
//! {"token": "...", "refresh_token": "...", "client_id": "...",
//!  "client_secret": "...", "token_uri": "...", "expiry": "2024-05-01T10:00:00Z"}
//! ```
//!
//! Missing client fields are taken from the `credentials.json` client secrets
//! file downloaded from the Google Cloud console.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DownloadError, Result};

/// Google OAuth2 token endpoint.
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Read-only Gmail scope.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Seconds before expiry at which a token is already treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Stored credentials for one Google account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    /// Current access token.
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Load a token file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DownloadError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the token file back, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| DownloadError::io(path, e))?;
        Ok(())
    }

    /// An access token is present and not within the expiry margin.
    /// Tokens without a recorded expiry are trusted.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let has_token = self.token.as_deref().is_some_and(|t| !t.is_empty());
        let fresh = self
            .expiry
            .is_none_or(|exp| now + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) < exp);
        has_token && fresh
    }

    /// Fill client id/secret/token uri from the console client secrets when absent.
    pub fn merge_client(&mut self, client: &ClientSecrets) {
        if self.client_id.is_none() {
            self.client_id = Some(client.client_id.clone());
        }
        if self.client_secret.is_none() {
            self.client_secret = client.client_secret.clone();
        }
        if self.token_uri.is_none() {
            self.token_uri = client.token_uri.clone();
        }
    }
}

/// The `installed` (or `web`) section of a Google client secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DownloadError::io(path, e))?;
        let file: ClientSecretsFile = serde_json::from_str(&contents)?;
        file.installed.or(file.web).ok_or_else(|| {
            DownloadError::Auth(format!(
                "'{}' has neither an 'installed' nor a 'web' client section",
                path.display()
            ))
        })
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchange the refresh token for a new access token, updating `token` in place.
pub fn refresh(token: &mut StoredToken, timeout: Duration) -> Result<()> {
    let refresh_token = token
        .refresh_token
        .clone()
        .ok_or_else(|| DownloadError::Auth("token has no refresh_token".into()))?;
    let client_id = token
        .client_id
        .clone()
        .ok_or_else(|| DownloadError::Auth("token has no client_id".into()))?;
    let endpoint = token
        .token_uri
        .clone()
        .unwrap_or_else(|| TOKEN_ENDPOINT.to_string());

    let mut form = vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];
    if let Some(secret) = &token.client_secret {
        form.push(("client_secret", secret.clone()));
    }

    tracing::info!("Refreshing expired credentials");
    let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    let response = http.post(&endpoint).form(&form).send()?;
    let status = response.status();
    let text = response.text()?;
    if !status.is_success() {
        return Err(DownloadError::Auth(format!(
            "token refresh failed with HTTP {}: {text}",
            status.as_u16()
        )));
    }

    let refreshed: RefreshResponse = serde_json::from_str(&text)?;
    token.token = Some(refreshed.access_token);
    token.expiry = refreshed
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
    if let Some(new_refresh) = refreshed.refresh_token {
        token.refresh_token = Some(new_refresh);
    }
    Ok(())
}

/// Where to look for credentials.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Access token supplied directly; skips the token file entirely.
    pub access_token: Option<String>,
    pub token_file: PathBuf,
    pub credentials_file: PathBuf,
    pub timeout: Duration,
}

/// Produce a usable bearer token, refreshing and persisting it when needed.
pub fn access_token(settings: &AuthSettings) -> Result<String> {
    if let Some(token) = settings.access_token.as_deref().filter(|t| !t.is_empty()) {
        tracing::debug!("Using access token from the environment");
        return Ok(token.to_string());
    }

    if !settings.token_file.exists() {
        return Err(DownloadError::Auth(format!(
            "token file '{}' not found; authorize the application for scope {} with the client secrets in '{}' first",
            settings.token_file.display(),
            GMAIL_READONLY_SCOPE,
            settings.credentials_file.display()
        )));
    }

    let mut token = StoredToken::load(&settings.token_file)?;
    if token.is_valid_at(Utc::now()) {
        if let Some(access) = token.token.take() {
            return Ok(access);
        }
    }

    if token.client_id.is_none() || token.client_secret.is_none() {
        match ClientSecrets::load(&settings.credentials_file) {
            Ok(client) => token.merge_client(&client),
            Err(e) => tracing::debug!(error = %e, "No usable client secrets file"),
        }
    }

    refresh(&mut token, settings.timeout)?;
    token.save(&settings.token_file)?;
    tracing::info!(path = %settings.token_file.display(), "Saved refreshed token");

    token
        .token
        .ok_or_else(|| DownloadError::Auth("refresh returned no access token".into()))
}
