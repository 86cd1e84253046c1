mod auth;
mod cli;
mod logging;
mod model;
mod sync;
#[cfg(test)]
mod test_utils;

use std::process::ExitCode;

use clap::Parser;
use rspotify::{AuthCodeSpotify, Config, Token};

use auth::{AuthProvider, OAuthProvider, StaticTokenProvider};
use cli::Cli;
use model::{SpotifyClient, SyncResult};
use sync::{EngineOptions, NewEpisodePolicy, ReconciliationEngine, Stage, SyncError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed
    let _log_guard = match logging::init_logging(&cli.log_dir, cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!(
        username = %cli.username,
        playlist = %cli.playlist,
        mode = ?cli.mode,
        dry_run = cli.dry_run,
        "=== spotify-inbox starting ==="
    );

    match run(&cli).await {
        Ok(result) => {
            tracing::info!(
                added = result.added_count,
                removed = result.removed_count,
                "Playlist '{}' is up to date",
                cli.playlist
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(
                kind = e.kind(),
                chunks_applied = e.chunks_applied(),
                error = %e,
                "Sync failed"
            );
            if let SyncError::Transport { source, .. } = &e {
                tracing::error!(cause = ?source, "Remote call failure");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<SyncResult, SyncError> {
    let provider = auth_provider(cli).ok_or_else(|| {
        tracing::error!("No access token given and no client id for the browser login");
        SyncError::Unauthorized { chunks_applied: 0 }
    })?;

    let token = provider.credential().await.map_err(|e| {
        tracing::error!(error = ?e, "Authentication failed");
        SyncError::Unauthorized { chunks_applied: 0 }
    })?;

    let spotify = setup_rspotify(token).await.map_err(|e| {
        tracing::error!(error = ?e, "Could not install the credential");
        SyncError::Unauthorized { chunks_applied: 0 }
    })?;
    let client = SpotifyClient::new(spotify);

    let user_id = client
        .current_user_id()
        .await
        .map_err(|e| SyncError::from_api(Stage::Init, 0, e))?;
    if user_id != cli.username {
        tracing::warn!(
            expected = %cli.username,
            actual = %user_id,
            "Credential belongs to a different user"
        );
    } else {
        tracing::info!(user_id = %user_id, "Authorized successfully");
    }

    let options = EngineOptions {
        policy: cli
            .since
            .map(NewEpisodePolicy::ReleasedSince)
            .unwrap_or_default(),
        dry_run: cli.dry_run,
        ..EngineOptions::default()
    };

    ReconciliationEngine::new(&client, options)
        .sync(&cli.playlist, cli.mode.into())
        .await
}

fn auth_provider(cli: &Cli) -> Option<Box<dyn AuthProvider>> {
    if let Some(access_token) = &cli.access_token {
        return Some(Box::new(StaticTokenProvider::new(access_token.clone())));
    }
    let client_id = cli.client_id.clone()?;
    Some(Box::new(OAuthProvider::new(
        client_id,
        cli.redirect_uri.clone(),
        &cli.cache_dir,
        &cli.username,
    )))
}

async fn setup_rspotify(access_token: Token) -> anyhow::Result<AuthCodeSpotify> {
    let spotify = AuthCodeSpotify::with_config(
        Default::default(),
        Default::default(),
        Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        },
    );

    tracing::debug!("rspotify client initialized");

    *spotify
        .token
        .lock()
        .await
        .map_err(|_| anyhow::anyhow!("rspotify token lock is poisoned"))? = Some(access_token);
    tracing::debug!("rspotify token set");
    Ok(spotify)
}
