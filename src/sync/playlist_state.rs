//! Resolving the target playlist and reading what is in it

use crate::model::{
    ApiResult, Episode, ItemKind, MediaApi, Playlist, PlaylistItem, PlaylistSummary,
    EPISODE_LOOKUP_LIMIT,
};

use super::error::{SyncError, Stage};
use super::paginator::drain;

const LISTED_TYPES: [ItemKind; 2] = [ItemKind::Track, ItemKind::Episode];

/// Current playlist contents split by item type, in playlist order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistContents {
    pub tracks: Vec<String>,
    pub episodes: Vec<String>,
}

impl PlaylistContents {
    pub fn partition(items: &[PlaylistItem]) -> Self {
        let mut contents = Self::default();
        for item in items {
            match item.kind() {
                ItemKind::Track => contents.tracks.push(item.id().to_string()),
                ItemKind::Episode => contents.episodes.push(item.id().to_string()),
            }
        }
        contents
    }
}

pub struct PlaylistState<'a, A: MediaApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: MediaApi + ?Sized> PlaylistState<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// First of the user's playlists whose name or id equals `identifier`
    pub async fn resolve(&self, identifier: &str) -> Result<PlaylistSummary, SyncError> {
        let playlists = drain(|offset| self.api.user_playlists(offset))
            .await
            .map_err(|err| SyncError::from_api(Stage::ResolvePlaylist, 0, err))?;

        tracing::debug!(count = playlists.len(), "Fetched user playlists");

        playlists
            .into_iter()
            .find(|playlist| playlist.name == identifier || playlist.id == identifier)
            .ok_or_else(|| SyncError::NotFound(identifier.to_string()))
    }

    /// Every item currently in the playlist
    pub async fn current_contents(&self, summary: PlaylistSummary) -> ApiResult<Playlist> {
        let items = drain(|offset| self.api.playlist_items(&summary.id, offset, &LISTED_TYPES))
            .await?;

        Ok(Playlist {
            id: summary.id,
            name: summary.name,
            items,
            snapshot_id: summary.snapshot_id,
        })
    }

    /// Full records for `episode_ids`, which carry the play state that the
    /// playlist listing lacks. Ids the service no longer knows are dropped.
    pub async fn enrich_episodes(&self, episode_ids: &[String]) -> ApiResult<Vec<Episode>> {
        let mut episodes = Vec::with_capacity(episode_ids.len());
        for chunk in episode_ids.chunks(EPISODE_LOOKUP_LIMIT) {
            episodes.extend(self.api.episodes(chunk).await?);
        }
        Ok(episodes)
    }
}
