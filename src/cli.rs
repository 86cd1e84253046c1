use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

use crate::auth::DEFAULT_REDIRECT_URI;
use crate::model::SyncMode;

pub const DEFAULT_PLAYLIST: &str = "Inbox";

#[derive(Debug, Parser)]
#[command(
    name = "spotify-inbox",
    version,
    about = "Keep a Spotify playlist filled with your unplayed podcast episodes"
)]
pub struct Cli {
    /// Spotify username the run is for
    pub username: String,

    /// Name or id of the playlist to keep in sync
    #[arg(default_value = DEFAULT_PLAYLIST, env = "SPOTIFY_INBOX_PLAYLIST")]
    pub playlist: String,

    #[arg(short, long, value_enum, default_value_t = Mode::Refresh)]
    pub mode: Mode,

    /// Treat everything released on or after this date (YYYY-MM-DD) as new,
    /// instead of everything newer than the last finished episode
    #[arg(long, value_name = "DATE")]
    pub since: Option<NaiveDate>,

    /// Show what would change without touching the playlist
    #[arg(long)]
    pub dry_run: bool,

    /// Use this access token instead of the browser login
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Client id of the Spotify application used for the browser login
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// Where refresh tokens are kept between runs
    #[arg(long, default_value = ".cache")]
    pub cache_dir: PathBuf,

    #[arg(long, default_value = ".logs")]
    pub log_dir: PathBuf,

    /// More console output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Command-line spelling of [`SyncMode`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Drop finished episodes and append new ones
    Refresh,
    /// Remove every track and episode
    Empty,
}

impl From<Mode> for SyncMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Refresh => SyncMode::Refresh,
            Mode::Empty => SyncMode::Empty,
        }
    }
}
