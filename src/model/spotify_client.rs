//! Spotify implementation of [`MediaApi`] on top of rspotify
//!
//! Every response is converted to the crate's own entities right here, so the
//! sync core never sees rspotify models or raw JSON.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rspotify::{
    http::HttpError,
    model::{EpisodeId, Market, PlayableId, PlaylistId, ShowId, TrackId},
    prelude::*,
    AuthCodeSpotify, ClientError,
};
use serde::Deserialize;

use super::api::{ApiError, ApiResult, MediaApi, PLAYLIST_PAGE_SIZE};
use super::types::{Episode, ItemKind, ItemRef, Page, PlaylistItem, PlaylistSummary, Show, Track};

const SHOW_PAGE_SIZE: u32 = 50;
const EPISODE_PAGE_SIZE: u32 = 50;
const PLAYLIST_LIST_PAGE_SIZE: u32 = 50;

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        if let ClientError::Http(http) = &err {
            if let HttpError::StatusCode(response) = http.as_ref() {
                if response.status() == 401 {
                    return ApiError::Unauthorized;
                }
            }
        }
        ApiError::Transport(anyhow::anyhow!("{}", err))
    }
}

/// Spotify API client scoped to the calls the sync needs
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
}

impl SpotifyClient {
    pub fn new(client: AuthCodeSpotify) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Id of the user the credential belongs to
    pub async fn current_user_id(&self) -> ApiResult<String> {
        crate::log_api_request!("me");
        let result = self.client.me().await.map_err(ApiError::from);
        crate::log_api_result!("me", result);
        Ok(result?.id.id().to_string())
    }
}

#[async_trait]
impl MediaApi for SpotifyClient {
    async fn saved_shows(&self, offset: u32) -> ApiResult<Page<Show>> {
        crate::log_api_request!("saved_shows", offset);
        let result = self
            .client
            .get_saved_show_manual(Some(SHOW_PAGE_SIZE), Some(offset))
            .await
            .map_err(ApiError::from);
        crate::log_api_result!("saved_shows", result);

        let page = result?;
        let shows = page
            .items
            .into_iter()
            .map(|saved| Show {
                id: saved.show.id.id().to_string(),
                name: saved.show.name,
            })
            .collect();
        Ok(Page::new(shows, page.total))
    }

    async fn show_episodes(&self, show_id: &str, offset: u32) -> ApiResult<Page<Episode>> {
        crate::log_api_request!("show_episodes", show_id, offset);
        let id = ShowId::from_id(show_id).context("Invalid show id")?;
        let result = self
            .client
            .get_shows_episodes_manual(
                id,
                Some(Market::FromToken),
                Some(EPISODE_PAGE_SIZE),
                Some(offset),
            )
            .await
            .map_err(ApiError::from);
        crate::log_api_result!("show_episodes", result);

        let page = result?;
        let episodes = page
            .items
            .into_iter()
            .map(|episode| {
                let id = episode.id.id().to_string();
                Episode {
                    release_date: release_date_or_min(&episode.release_date, &id),
                    id,
                    show_id: show_id.to_string(),
                    // The listing is per show; callers attach the name
                    show_name: String::new(),
                    name: episode.name,
                    fully_played: episode
                        .resume_point
                        .map(|point| point.fully_played)
                        .unwrap_or(false),
                }
            })
            .collect();
        Ok(Page::new(episodes, page.total))
    }

    async fn episodes(&self, ids: &[String]) -> ApiResult<Vec<Episode>> {
        crate::log_api_request!("episodes", count = ids.len());
        for id in ids {
            EpisodeId::from_id(id.as_str()).context("Invalid episode id")?;
        }

        // The lookup answers unknown ids with `null`, which rspotify's typed
        // payload refuses, so the body is parsed here.
        let joined = ids.join(",");
        let params: HashMap<&str, &str> =
            HashMap::from([("ids", joined.as_str()), ("market", "from_token")]);
        let result = self
            .client
            .api_get("episodes", &params)
            .await
            .map_err(ApiError::from);
        crate::log_api_result!("episodes", result);

        Ok(parse_episode_lookup(&result?, ids)?)
    }

    async fn user_playlists(&self, offset: u32) -> ApiResult<Page<PlaylistSummary>> {
        crate::log_api_request!("user_playlists", offset);
        let result = self
            .client
            .current_user_playlists_manual(Some(PLAYLIST_LIST_PAGE_SIZE), Some(offset))
            .await
            .map_err(ApiError::from);
        crate::log_api_result!("user_playlists", result);

        let page = result?;
        let playlists = page
            .items
            .into_iter()
            .map(|playlist| PlaylistSummary {
                id: playlist.id.id().to_string(),
                name: playlist.name,
                snapshot_id: playlist.snapshot_id,
            })
            .collect();
        Ok(Page::new(playlists, page.total))
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        offset: u32,
        types: &[ItemKind],
    ) -> ApiResult<Page<PlaylistItem>> {
        crate::log_api_request!("playlist_items", playlist_id, offset);
        // rspotify's typed listing cannot ask for episodes, so this one call
        // goes through the raw endpoint and is parsed here.
        let url = format!("playlists/{}/tracks", playlist_id);
        let limit = PLAYLIST_PAGE_SIZE.to_string();
        let offset = offset.to_string();
        let additional_types = types
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let params: HashMap<&str, &str> = HashMap::from([
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
            ("additional_types", additional_types.as_str()),
        ]);

        let result = self
            .client
            .api_get(&url, &params)
            .await
            .map_err(ApiError::from);
        crate::log_api_result!("playlist_items", result);

        Ok(parse_playlist_items(&result?)?)
    }

    async fn add_items(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        position: Option<u32>,
    ) -> ApiResult<()> {
        crate::log_api_request!("add_items", playlist_id, count = items.len());
        let id = PlaylistId::from_id(playlist_id).context("Invalid playlist id")?;
        let playables = playable_ids(items)?;

        let result = self
            .client
            .playlist_add_items(id, playables, position)
            .await
            .map(|_| ())
            .map_err(ApiError::from);
        crate::log_api_result!("add_items", result);
        result
    }

    async fn remove_items(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        snapshot_id: Option<String>,
    ) -> ApiResult<()> {
        crate::log_api_request!("remove_items", playlist_id, count = items.len());
        let id = PlaylistId::from_id(playlist_id).context("Invalid playlist id")?;
        let playables = playable_ids(items)?;

        let result = self
            .client
            .playlist_remove_all_occurrences_of_items(id, playables, snapshot_id.as_deref())
            .await
            .map(|_| ())
            .map_err(ApiError::from);
        crate::log_api_result!("remove_items", result);
        result
    }
}

fn playable_ids(items: &[ItemRef]) -> Result<Vec<PlayableId<'_>>> {
    items
        .iter()
        .map(|item| match item {
            ItemRef::Track(id) => TrackId::from_id(id.as_str())
                .map(PlayableId::Track)
                .context("Invalid track id"),
            ItemRef::Episode(id) => EpisodeId::from_id(id.as_str())
                .map(PlayableId::Episode)
                .context("Invalid episode id"),
        })
        .collect()
}

#[derive(Deserialize)]
struct PlaylistItemsPage {
    items: Vec<PlaylistEntry>,
    total: u32,
}

#[derive(Deserialize)]
struct PlaylistEntry {
    track: Option<PlayableObject>,
}

#[derive(Deserialize)]
struct PlayableObject {
    id: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
}

fn parse_playlist_items(body: &str) -> Result<Page<PlaylistItem>> {
    let page: PlaylistItemsPage =
        serde_json::from_str(body).context("Failed to parse playlist items")?;

    // Skipped entries still occupy a position, so paging goes by the raw count
    let fetched = page.items.len() as u32;
    let mut items = Vec::with_capacity(page.items.len());
    for entry in page.items {
        // Local files and removed content come back without an id
        let Some(PlayableObject { id: Some(id), kind }) = entry.track else {
            tracing::debug!("Skipping playlist entry without a playable id");
            continue;
        };
        match kind.as_str() {
            "track" => items.push(PlaylistItem::Track(Track { id })),
            "episode" => items.push(PlaylistItem::Episode { id }),
            other => tracing::warn!(kind = other, id = %id, "Skipping playlist entry of unknown type"),
        }
    }

    Ok(Page::filtered(items, fetched, page.total))
}

#[derive(Deserialize)]
struct EpisodeLookup {
    episodes: Vec<Option<EpisodeObject>>,
}

#[derive(Deserialize)]
struct EpisodeObject {
    id: String,
    name: String,
    release_date: String,
    show: ShowObject,
    #[serde(default)]
    resume_point: Option<ResumePointObject>,
}

#[derive(Deserialize)]
struct ShowObject {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ResumePointObject {
    fully_played: bool,
}

/// Episodes in request order, leaving out ids the service no longer knows
fn parse_episode_lookup(body: &str, requested: &[String]) -> Result<Vec<Episode>> {
    let lookup: EpisodeLookup =
        serde_json::from_str(body).context("Failed to parse episode lookup")?;

    let mut episodes = Vec::with_capacity(lookup.episodes.len());
    for (position, entry) in lookup.episodes.into_iter().enumerate() {
        let Some(episode) = entry else {
            let id = requested.get(position).map(String::as_str).unwrap_or("?");
            tracing::warn!(episode_id = id, "Episode is no longer available, skipping");
            continue;
        };
        episodes.push(Episode {
            release_date: release_date_or_min(&episode.release_date, &episode.id),
            id: episode.id,
            show_id: episode.show.id,
            show_name: episode.show.name,
            name: episode.name,
            fully_played: episode
                .resume_point
                .map(|point| point.fully_played)
                .unwrap_or(false),
        });
    }
    Ok(episodes)
}

/// Parse a `YYYY`, `YYYY-MM` or `YYYY-MM-DD` release date
pub(crate) fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u32>().ok()?,
        None => 1,
    };
    let day = match parts.next() {
        Some(day) => day.parse::<u32>().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn release_date_or_min(raw: &str, episode_id: &str) -> NaiveDate {
    parse_release_date(raw).unwrap_or_else(|| {
        tracing::warn!(episode_id, release_date = raw, "Unparseable release date");
        NaiveDate::MIN
    })
}
