//! Model module - entities and the remote API they come from
//!
//! - `types`: Core entity definitions (shows, episodes, playlists, results)
//! - `api`: The `MediaApi` port the sync core is written against
//! - `spotify_client`: Spotify implementation of that port

mod api;
mod spotify_client;
mod types;

pub use api::{ApiError, ApiResult, MediaApi, EPISODE_LOOKUP_LIMIT, MUTATION_LIMIT};

#[cfg(test)]
pub use api::MockMediaApi;

pub use types::{
    Episode, ItemKind, ItemRef, Page, Playlist, PlaylistItem, PlaylistSummary, Show, SyncMode,
    SyncResult, Track,
};

pub use spotify_client::SpotifyClient;
