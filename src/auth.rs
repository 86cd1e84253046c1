use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rspotify::Token;

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8898/login";
pub const SCOPES: &str = "user-library-read user-read-playback-position playlist-read-private playlist-read-collaborative playlist-modify-private playlist-modify-public";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Authentication Successful!</h1><script>window.close();</script></body>
</html>
"#;
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Supplies the credential a run is made with
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn credential(&self) -> Result<Token>;
}

fn bearer_token(access_token: String) -> Token {
    Token {
        access_token,
        expires_in: chrono::Duration::seconds(TOKEN_LIFETIME_SECS),
        expires_at: Some(Utc::now() + chrono::Duration::seconds(TOKEN_LIFETIME_SECS)),
        scopes: SCOPES
            .split_whitespace()
            .map(|s| s.to_string())
            .collect::<HashSet<String>>(),
        refresh_token: None,
    }
}

/// An access token obtained elsewhere and handed in as-is
pub struct StaticTokenProvider {
    access_token: String,
}

impl StaticTokenProvider {
    pub fn new(access_token: String) -> Self {
        Self { access_token }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn credential(&self) -> Result<Token> {
        if self.access_token.trim().is_empty() {
            anyhow::bail!("Access token is empty");
        }
        tracing::debug!("Using supplied access token");
        Ok(bearer_token(self.access_token.clone()))
    }
}

/// PKCE browser login with a cached refresh token per user
pub struct OAuthProvider {
    client_id: String,
    redirect_uri: String,
    refresh_token_file: PathBuf,
}

impl OAuthProvider {
    pub fn new(client_id: String, redirect_uri: String, cache_dir: &Path, username: &str) -> Self {
        let file_stem: String = username
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Self {
            client_id,
            redirect_uri,
            refresh_token_file: cache_dir.join(format!("{}.refresh_token", file_stem)),
        }
    }

    fn builder(&self) -> librespot_oauth::OAuthClientBuilder {
        librespot_oauth::OAuthClientBuilder::new(
            &self.client_id,
            &self.redirect_uri,
            SCOPES.split_whitespace().collect(),
        )
    }

    fn store_refresh_token(&self, refresh_token: &str) {
        let stored = self
            .refresh_token_file
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&self.refresh_token_file, refresh_token));
        match stored {
            Ok(()) => tracing::debug!(path = %self.refresh_token_file.display(), "Saved refresh token"),
            Err(e) => tracing::warn!(error = %e, "Could not save refresh token"),
        }
    }

    async fn browser_auth(&self) -> Result<String> {
        tracing::info!("Starting browser-based OAuth flow");
        let client = self
            .builder()
            .open_in_browser()
            .with_custom_message(RESPONSE)
            .build()
            .context("Failed to build OAuth client")?;

        let token = client
            .get_access_token_async()
            .await
            .context("Failed to get access token")?;

        self.store_refresh_token(&token.refresh_token);
        tracing::info!("Browser authentication completed successfully");
        Ok(token.access_token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let client = self.builder().build().context("Failed to build OAuth client")?;
        let token = client
            .refresh_token_async(refresh_token)
            .await
            .context("Failed to refresh access token")?;

        self.store_refresh_token(&token.refresh_token);
        tracing::debug!("Token refreshed successfully");
        Ok(token.access_token)
    }
}

#[async_trait]
impl AuthProvider for OAuthProvider {
    async fn credential(&self) -> Result<Token> {
        let stored_refresh_token = fs::read_to_string(&self.refresh_token_file).ok();

        let access_token = match stored_refresh_token {
            Some(refresh_token) => {
                tracing::info!("Found cached refresh token");
                match self.refresh(refresh_token.trim()).await {
                    Ok(access_token) => access_token,
                    Err(e) => {
                        tracing::warn!(error = %e, "Cached refresh token failed, re-authenticating");
                        self.browser_auth().await?
                    }
                }
            }
            None => {
                tracing::info!("No cached credentials found, starting browser authentication");
                self.browser_auth().await?
            }
        };

        Ok(bearer_token(access_token))
    }
}
