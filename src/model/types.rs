//! Core entity definitions, rebuilt from the service on every run

use chrono::NaiveDate;

/// A subscribed show from the user's library
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Show {
    pub id: String,
    pub name: String,
}

/// A playable episode of a show
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub show_id: String,
    pub show_name: String,
    pub name: String,
    pub release_date: NaiveDate,
    /// Only as reported by the service at fetch time
    pub fully_played: bool,
}

/// A music track, opaque beyond its id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: String,
}

/// Item types a playlist listing can carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Track,
    Episode,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Track => "track",
            ItemKind::Episode => "episode",
        }
    }
}

/// An entry as it appears inside a playlist listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaylistItem {
    Track(Track),
    /// Listings do not carry play progress, so only the id is known here
    Episode { id: String },
}

impl PlaylistItem {
    pub fn id(&self) -> &str {
        match self {
            PlaylistItem::Track(track) => &track.id,
            PlaylistItem::Episode { id } => id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            PlaylistItem::Track(_) => ItemKind::Track,
            PlaylistItem::Episode { .. } => ItemKind::Episode,
        }
    }
}

/// Operand of a playlist mutation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Track(String),
    Episode(String),
}

impl ItemRef {
    pub fn id(&self) -> &str {
        match self {
            ItemRef::Track(id) | ItemRef::Episode(id) => id,
        }
    }

    pub fn uri(&self) -> String {
        match self {
            ItemRef::Track(id) => format!("spotify:track:{}", id),
            ItemRef::Episode(id) => format!("spotify:episode:{}", id),
        }
    }
}

/// A playlist as returned by the user's playlist listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub snapshot_id: String,
}

/// A resolved playlist together with its current contents
#[derive(Clone, Debug)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub items: Vec<PlaylistItem>,
    pub snapshot_id: String,
}

/// One page of an offset-paged collection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Entries the service returned for this page, counting any the adapter
    /// skipped. The next page starts this many entries further on.
    pub fetched: u32,
    pub total: u32,
}

impl<T> Page<T> {
    /// A page where every returned entry was kept
    pub fn new(items: Vec<T>, total: u32) -> Self {
        Self {
            fetched: items.len() as u32,
            items,
            total,
        }
    }

    /// A page built from `fetched` raw entries, some of which were dropped
    pub fn filtered(items: Vec<T>, fetched: u32, total: u32) -> Self {
        Self {
            items,
            fetched,
            total,
        }
    }
}

/// Outcome of a completed run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub added_count: usize,
    pub removed_count: usize,
}

/// What a run does to the target playlist
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Drop finished episodes and append new ones
    #[default]
    Refresh,
    /// Remove every track and episode
    Empty,
}
