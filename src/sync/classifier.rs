//! Deciding which episodes are finished and which are new

use chrono::NaiveDate;

use crate::model::Episode;

pub fn is_finished(episode: &Episode) -> bool {
    episode.fully_played
}

/// New episodes of a single show under the finished-boundary rule.
///
/// Episodes are scanned newest first; the first finished one is the boundary
/// and everything strictly newer than it is new. A show with nothing finished
/// is new in full. The result is newest first.
pub fn new_episodes_of(mut episodes: Vec<Episode>) -> Vec<Episode> {
    episodes.sort_by(|a, b| b.release_date.cmp(&a.release_date));
    episodes.into_iter().take_while(|episode| !is_finished(episode)).collect()
}

/// How a refresh decides that an episode is new
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NewEpisodePolicy {
    /// Everything newer than the latest finished episode of each show
    #[default]
    FinishedBoundary,
    /// Everything released on or after the cutoff, played or not.
    /// Kept for the older date-driven workflow.
    ReleasedSince(NaiveDate),
}

impl NewEpisodePolicy {
    /// Apply the policy to all episodes of one show
    pub fn select(&self, episodes: Vec<Episode>) -> Vec<Episode> {
        match self {
            NewEpisodePolicy::FinishedBoundary => new_episodes_of(episodes),
            NewEpisodePolicy::ReleasedSince(cutoff) => episodes
                .into_iter()
                .filter(|episode| episode.release_date >= *cutoff)
                .collect(),
        }
    }
}
