//! The remote media API capability the sync core depends on

use async_trait::async_trait;

use super::types::{Episode, ItemKind, ItemRef, Page, PlaylistItem, PlaylistSummary, Show};

/// Largest id list accepted by the episode metadata lookup
pub const EPISODE_LOOKUP_LIMIT: usize = 50;
/// Largest operand list accepted by a playlist mutation
pub const MUTATION_LIMIT: usize = 100;
/// Page size used when listing playlist items
pub const PLAYLIST_PAGE_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("the service rejected the credential")]
    Unauthorized,
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Port trait over the media service.
///
/// `SpotifyClient` is the production implementation; tests use the generated
/// `MockMediaApi` or the in-memory `FakeLibrary`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaApi: Send + Sync {
    async fn saved_shows(&self, offset: u32) -> ApiResult<Page<Show>>;

    async fn show_episodes(&self, show_id: &str, offset: u32) -> ApiResult<Page<Episode>>;

    /// Full episode records, at most [`EPISODE_LOOKUP_LIMIT`] ids per call
    async fn episodes(&self, ids: &[String]) -> ApiResult<Vec<Episode>>;

    async fn user_playlists(&self, offset: u32) -> ApiResult<Page<PlaylistSummary>>;

    async fn playlist_items(
        &self,
        playlist_id: &str,
        offset: u32,
        types: &[ItemKind],
    ) -> ApiResult<Page<PlaylistItem>>;

    async fn add_items(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        position: Option<u32>,
    ) -> ApiResult<()>;

    async fn remove_items(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        snapshot_id: Option<String>,
    ) -> ApiResult<()>;
}
