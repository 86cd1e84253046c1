//! In-memory media library for whole-run tests

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{
    ApiError, ApiResult, Episode, ItemKind, ItemRef, MediaApi, Page, PlaylistItem,
    PlaylistSummary, Show, Track, EPISODE_LOOKUP_LIMIT, MUTATION_LIMIT,
};

/// Small pages so every listing exercises pagination
const PAGE_SIZE: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Add(Vec<String>),
    Remove(Vec<String>),
}

struct FakePlaylist {
    summary: PlaylistSummary,
    items: Vec<ItemRef>,
}

#[derive(Default)]
struct State {
    shows: Vec<Show>,
    episodes: Vec<Episode>,
    playlists: Vec<FakePlaylist>,
    mutations: Vec<Mutation>,
    remove_snapshots: Vec<Option<String>>,
    mutation_calls: usize,
    failing_mutation: Option<usize>,
}

/// A `MediaApi` backed by plain vectors, with real add/remove semantics
#[derive(Default)]
pub struct FakeLibrary {
    state: Mutex<State>,
}

fn page_of<T: Clone>(all: &[T], offset: u32) -> Page<T> {
    let start = (offset as usize).min(all.len());
    let end = (start + PAGE_SIZE).min(all.len());
    Page::new(all[start..end].to_vec(), all.len() as u32)
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a saved show; episodes are `(id, day of January 2024, fully played)`
    pub fn with_show(self, id: &str, name: &str, episodes: &[(&str, u32, bool)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.shows.push(Show {
                id: id.into(),
                name: name.into(),
            });
            for &(episode_id, day, fully_played) in episodes {
                state.episodes.push(Episode {
                    id: episode_id.into(),
                    show_id: id.into(),
                    show_name: name.into(),
                    name: format!("{} {}", name, episode_id),
                    release_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                    fully_played,
                });
            }
        }
        self
    }

    pub fn with_playlist(self, id: &str, name: &str, items: &[ItemRef]) -> Self {
        self.state.lock().unwrap().playlists.push(FakePlaylist {
            summary: PlaylistSummary {
                id: id.into(),
                name: name.into(),
                snapshot_id: format!("snapshot-{}", id),
            },
            items: items.to_vec(),
        });
        self
    }

    /// Make the `nth` mutation call (1-based, adds and removes alike) fail
    pub fn failing_mutation(self, nth: usize) -> Self {
        self.state.lock().unwrap().failing_mutation = Some(nth);
        self
    }

    pub fn playlist_ids(&self, playlist_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|p| p.summary.id == playlist_id)
            .map(|p| p.items.iter().map(|item| item.id().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn remove_snapshots(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().remove_snapshots.clone()
    }
}

impl State {
    fn playlist_mut(&mut self, playlist_id: &str) -> ApiResult<&mut FakePlaylist> {
        self.playlists
            .iter_mut()
            .find(|p| p.summary.id == playlist_id)
            .ok_or_else(|| ApiError::Transport(anyhow::anyhow!("404 playlist {}", playlist_id)))
    }

    fn begin_mutation(&mut self) -> ApiResult<()> {
        self.mutation_calls += 1;
        if self.failing_mutation == Some(self.mutation_calls) {
            return Err(ApiError::Transport(anyhow::anyhow!("503 Service Unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaApi for FakeLibrary {
    async fn saved_shows(&self, offset: u32) -> ApiResult<Page<Show>> {
        Ok(page_of(&self.state.lock().unwrap().shows, offset))
    }

    async fn show_episodes(&self, show_id: &str, offset: u32) -> ApiResult<Page<Episode>> {
        let state = self.state.lock().unwrap();
        let episodes: Vec<Episode> = state
            .episodes
            .iter()
            .filter(|e| e.show_id == show_id)
            .map(|e| Episode {
                show_name: String::new(),
                ..e.clone()
            })
            .collect();
        Ok(page_of(&episodes, offset))
    }

    async fn episodes(&self, ids: &[String]) -> ApiResult<Vec<Episode>> {
        assert!(ids.len() <= EPISODE_LOOKUP_LIMIT, "episode lookup over limit");
        let state = self.state.lock().unwrap();
        Ok(state
            .episodes
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn user_playlists(&self, offset: u32) -> ApiResult<Page<PlaylistSummary>> {
        let state = self.state.lock().unwrap();
        let summaries: Vec<PlaylistSummary> =
            state.playlists.iter().map(|p| p.summary.clone()).collect();
        Ok(page_of(&summaries, offset))
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        offset: u32,
        types: &[ItemKind],
    ) -> ApiResult<Page<PlaylistItem>> {
        let mut state = self.state.lock().unwrap();
        let playlist = state.playlist_mut(playlist_id)?;
        let items: Vec<PlaylistItem> = playlist
            .items
            .iter()
            .map(|item| match item {
                ItemRef::Track(id) => PlaylistItem::Track(Track { id: id.clone() }),
                ItemRef::Episode(id) => PlaylistItem::Episode { id: id.clone() },
            })
            .filter(|item| types.contains(&item.kind()))
            .collect();
        Ok(page_of(&items, offset))
    }

    async fn add_items(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        _position: Option<u32>,
    ) -> ApiResult<()> {
        assert!(items.len() <= MUTATION_LIMIT, "add over limit");
        let mut state = self.state.lock().unwrap();
        state.begin_mutation()?;
        state.playlist_mut(playlist_id)?.items.extend_from_slice(items);
        state
            .mutations
            .push(Mutation::Add(items.iter().map(|i| i.id().to_string()).collect()));
        Ok(())
    }

    async fn remove_items(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        snapshot_id: Option<String>,
    ) -> ApiResult<()> {
        assert!(items.len() <= MUTATION_LIMIT, "remove over limit");
        let mut state = self.state.lock().unwrap();
        state.begin_mutation()?;
        state
            .playlist_mut(playlist_id)?
            .items
            .retain(|existing| !items.contains(existing));
        state
            .mutations
            .push(Mutation::Remove(items.iter().map(|i| i.id().to_string()).collect()));
        state.remove_snapshots.push(snapshot_id);
        Ok(())
    }
}
