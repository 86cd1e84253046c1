//! The reconciliation run: resolve, collect, diff, apply

use std::collections::HashSet;

use tracing::Instrument;

use crate::model::{
    ApiError, ApiResult, Episode, ItemRef, MediaApi, SyncMode, SyncResult, MUTATION_LIMIT,
};

use super::batch::{BatchError, BatchMutator};
use super::classifier::{is_finished, NewEpisodePolicy};
use super::error::{Stage, SyncError};
use super::paginator::drain;
use super::playlist_state::{PlaylistContents, PlaylistState};

#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    pub policy: NewEpisodePolicy,
    /// Compute and report the changes without applying them
    pub dry_run: bool,
    pub add_limit: usize,
    pub remove_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            policy: NewEpisodePolicy::default(),
            dry_run: false,
            add_limit: MUTATION_LIMIT,
            remove_limit: MUTATION_LIMIT,
        }
    }
}

/// Changes a run intends to make, computed against one content snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub remove: Vec<ItemRef>,
    /// Sorted by release date, oldest first
    pub add: Vec<Episode>,
}

impl SyncPlan {
    /// Remove finished episodes; add new candidates not already present
    pub fn refresh(
        contents: &PlaylistContents,
        present: &[Episode],
        candidates: Vec<Episode>,
    ) -> Self {
        let finished: HashSet<&str> = present
            .iter()
            .filter(|episode| is_finished(episode))
            .map(|episode| episode.id.as_str())
            .collect();

        let mut seen = HashSet::new();
        let remove = contents
            .episodes
            .iter()
            .filter(|id| finished.contains(id.as_str()) && seen.insert(id.as_str()))
            .map(|id| ItemRef::Episode(id.clone()))
            .collect();

        let current: HashSet<&str> = contents.episodes.iter().map(String::as_str).collect();
        let mut queued = HashSet::new();
        let mut add: Vec<Episode> = candidates
            .into_iter()
            .filter(|episode| !current.contains(episode.id.as_str()))
            .filter(|episode| queued.insert(episode.id.clone()))
            .collect();
        add.sort_by_key(|episode| episode.release_date);

        Self { remove, add }
    }

    /// Remove everything, add nothing
    pub fn empty(contents: &PlaylistContents) -> Self {
        let mut seen = HashSet::new();
        let tracks = contents.tracks.iter().map(|id| ItemRef::Track(id.clone()));
        let episodes = contents.episodes.iter().map(|id| ItemRef::Episode(id.clone()));
        let remove = tracks
            .chain(episodes)
            .filter(|item| seen.insert(item.clone()))
            .collect();

        Self {
            remove,
            add: Vec::new(),
        }
    }

    fn additions(&self) -> Vec<ItemRef> {
        self.add
            .iter()
            .map(|episode| ItemRef::Episode(episode.id.clone()))
            .collect()
    }
}

/// Bookkeeping for one run, so a failure can say where it happened and how
/// much had already been applied
struct Progress {
    stage: Stage,
    chunks_applied: usize,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "Sync stage");
        self.stage = stage;
    }

    fn fail(&self, err: ApiError) -> SyncError {
        SyncError::from_api(self.stage, self.chunks_applied, err)
    }

    fn fail_batch(&self, err: BatchError) -> SyncError {
        SyncError::from_api(self.stage, self.chunks_applied + err.applied, err.source)
    }
}

pub struct ReconciliationEngine<'a, A: MediaApi + ?Sized> {
    api: &'a A,
    options: EngineOptions,
}

impl<'a, A: MediaApi + ?Sized> ReconciliationEngine<'a, A> {
    pub fn new(api: &'a A, options: EngineOptions) -> Self {
        Self { api, options }
    }

    /// Bring the playlist named or identified by `identifier` in line with
    /// `mode`. Nothing is mutated until the playlist has been resolved, and
    /// removals always go out before additions.
    pub async fn sync(&self, identifier: &str, mode: SyncMode) -> Result<SyncResult, SyncError> {
        let span = tracing::info_span!("sync", playlist = identifier, mode = ?mode);
        self.run(identifier, mode).instrument(span).await
    }

    async fn run(&self, identifier: &str, mode: SyncMode) -> Result<SyncResult, SyncError> {
        let mut progress = Progress {
            stage: Stage::Init,
            chunks_applied: 0,
        };
        let state = PlaylistState::new(self.api);

        progress.enter(Stage::ResolvePlaylist);
        let summary = state.resolve(identifier).await?;
        tracing::info!(id = %summary.id, name = %summary.name, "Resolved playlist");

        progress.enter(Stage::CollectCurrent);
        let playlist = state
            .current_contents(summary)
            .await
            .map_err(|err| progress.fail(err))?;
        let contents = PlaylistContents::partition(&playlist.items);
        tracing::info!(
            tracks = contents.tracks.len(),
            episodes = contents.episodes.len(),
            "Playlist contents fetched"
        );

        let plan = match mode {
            SyncMode::Refresh => {
                let present = state
                    .enrich_episodes(&contents.episodes)
                    .await
                    .map_err(|err| progress.fail(err))?;

                progress.enter(Stage::CollectCandidates);
                let candidates = self
                    .collect_candidates()
                    .await
                    .map_err(|err| progress.fail(err))?;

                progress.enter(Stage::ComputeDiff);
                SyncPlan::refresh(&contents, &present, candidates)
            }
            SyncMode::Empty => {
                progress.enter(Stage::ComputeDiff);
                SyncPlan::empty(&contents)
            }
        };

        report_plan(&plan);
        let result = SyncResult {
            added_count: plan.add.len(),
            removed_count: plan.remove.len(),
        };

        if self.options.dry_run {
            tracing::info!(
                added = result.added_count,
                removed = result.removed_count,
                "Dry run, playlist left unchanged"
            );
            return Ok(result);
        }

        progress.enter(Stage::ApplyRemovals);
        let applied = BatchMutator::new(self.api)
            .with_limit(self.options.remove_limit)
            .remove(&playlist.id, &plan.remove, Some(playlist.snapshot_id.as_str()))
            .await
            .map_err(|err| progress.fail_batch(err))?;
        progress.chunks_applied += applied;

        progress.enter(Stage::ApplyAdditions);
        let applied = BatchMutator::new(self.api)
            .with_limit(self.options.add_limit)
            .add(&playlist.id, &plan.additions())
            .await
            .map_err(|err| progress.fail_batch(err))?;
        progress.chunks_applied += applied;

        progress.enter(Stage::Done);
        tracing::info!(
            playlist = %playlist.name,
            added = result.added_count,
            removed = result.removed_count,
            chunks = progress.chunks_applied,
            "Sync complete"
        );
        Ok(result)
    }

    /// Episodes of every subscribed show that the policy counts as new
    async fn collect_candidates(&self) -> ApiResult<Vec<Episode>> {
        let shows = drain(|offset| self.api.saved_shows(offset)).await?;
        tracing::info!(count = shows.len(), "Fetched saved shows");

        let mut candidates = Vec::new();
        for show in &shows {
            let episodes = drain(|offset| self.api.show_episodes(&show.id, offset)).await?;
            let mut selected = self.options.policy.select(episodes);
            for episode in &mut selected {
                episode.show_name = show.name.clone();
            }
            tracing::debug!(show = %show.name, id = %show.id, new = selected.len(), "Classified show");
            candidates.extend(selected);
        }
        Ok(candidates)
    }
}

fn report_plan(plan: &SyncPlan) {
    for item in &plan.remove {
        tracing::info!(uri = %item.uri(), "Removing {}", item.id());
    }
    for episode in &plan.add {
        tracing::info!("Adding {} - {}: {}", episode.release_date, episode.show_name, episode.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockMediaApi;
    use crate::test_utils::{FakeLibrary, Mutation};
    use chrono::NaiveDate;

    fn refresh_scenario() -> FakeLibrary {
        FakeLibrary::new()
            .with_show(
                "showA",
                "Show A",
                &[("e1", 1, true), ("e2", 2, true), ("e3", 3, false)],
            )
            .with_show("showB", "Show B", &[("f1", 2, false)])
            .with_playlist("pl1", "Inbox", &[])
    }

    #[tokio::test]
    async fn test_refresh_adds_new_episodes_in_release_order() {
        let library = refresh_scenario();
        let engine = ReconciliationEngine::new(&library, EngineOptions::default());

        let result = engine.sync("Inbox", SyncMode::Refresh).await.unwrap();

        assert_eq!(
            result,
            SyncResult {
                added_count: 2,
                removed_count: 0
            }
        );
        assert_eq!(library.playlist_ids("pl1"), vec!["f1", "e3"]);
        assert_eq!(
            library.mutations(),
            vec![Mutation::Add(vec!["f1".into(), "e3".into()])]
        );
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let library = refresh_scenario();
        let engine = ReconciliationEngine::new(&library, EngineOptions::default());

        engine.sync("Inbox", SyncMode::Refresh).await.unwrap();
        let second = engine.sync("Inbox", SyncMode::Refresh).await.unwrap();

        assert_eq!(second, SyncResult::default());
        assert_eq!(library.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_going_past_unavailable_episode() {
        let library = FakeLibrary::new()
            .with_show("showA", "Show A", &[("a1", 1, true), ("a2", 2, false)])
            .with_playlist(
                "pl1",
                "Inbox",
                &[ItemRef::Episode("gone".into()), ItemRef::Episode("a1".into())],
            );
        let engine = ReconciliationEngine::new(&library, EngineOptions::default());

        let result = engine.sync("Inbox", SyncMode::Refresh).await.unwrap();

        assert_eq!(
            result,
            SyncResult {
                added_count: 1,
                removed_count: 1
            }
        );
        assert_eq!(library.playlist_ids("pl1"), vec!["gone", "a2"]);
    }

    #[tokio::test]
    async fn test_refresh_removes_finished_and_never_readds_them() {
        let library = FakeLibrary::new()
            .with_show(
                "showA",
                "Show A",
                &[("a1", 1, true), ("a2", 2, true), ("a3", 3, false), ("a4", 4, false)],
            )
            .with_playlist(
                "pl1",
                "Inbox",
                &[ItemRef::Track("t1".into()), ItemRef::Episode("a2".into()), ItemRef::Episode("a3".into())],
            );
        let engine = ReconciliationEngine::new(&library, EngineOptions::default());

        let result = engine.sync("pl1", SyncMode::Refresh).await.unwrap();

        assert_eq!(result.removed_count, 1);
        assert_eq!(result.added_count, 1);
        assert_eq!(library.playlist_ids("pl1"), vec!["t1", "a3", "a4"]);
        assert_eq!(
            library.mutations(),
            vec![
                Mutation::Remove(vec!["a2".into()]),
                Mutation::Add(vec!["a4".into()]),
            ]
        );
        assert_eq!(library.remove_snapshots(), vec![Some("snapshot-pl1".to_string())]);
    }

    #[tokio::test]
    async fn test_interleaved_shows_land_in_release_order_across_chunks() {
        let library = FakeLibrary::new()
            .with_show("s1", "One", &[("x5", 5, false), ("x1", 1, false), ("x3", 3, false)])
            .with_show("s2", "Two", &[("y4", 4, false), ("y2", 2, false)])
            .with_show("s3", "Three", &[("z6", 6, false), ("z1", 1, true)])
            .with_playlist("pl1", "Inbox", &[]);
        let options = EngineOptions {
            add_limit: 2,
            ..EngineOptions::default()
        };

        let result = ReconciliationEngine::new(&library, options)
            .sync("Inbox", SyncMode::Refresh)
            .await
            .unwrap();

        assert_eq!(result.added_count, 6);
        assert_eq!(
            library.playlist_ids("pl1"),
            vec!["x1", "y2", "x3", "y4", "x5", "z6"]
        );
        assert_eq!(library.mutations().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_removes_everything_regardless_of_play_state() {
        let library = FakeLibrary::new()
            .with_show("showA", "Show A", &[("e5", 5, false)])
            .with_playlist(
                "pl1",
                "Inbox",
                &[
                    ItemRef::Track("t1".into()),
                    ItemRef::Track("t2".into()),
                    ItemRef::Episode("e5".into()),
                    ItemRef::Episode("e5".into()),
                ],
            );
        let engine = ReconciliationEngine::new(&library, EngineOptions::default());

        let result = engine.sync("Inbox", SyncMode::Empty).await.unwrap();

        assert_eq!(
            result,
            SyncResult {
                added_count: 0,
                removed_count: 3
            }
        );
        assert!(library.playlist_ids("pl1").is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_mutating() {
        let library = refresh_scenario();
        let options = EngineOptions {
            dry_run: true,
            ..EngineOptions::default()
        };

        let result = ReconciliationEngine::new(&library, options)
            .sync("Inbox", SyncMode::Refresh)
            .await
            .unwrap();

        assert_eq!(result.added_count, 2);
        assert!(library.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_release_cutoff_policy() {
        let library = refresh_scenario();
        let options = EngineOptions {
            policy: NewEpisodePolicy::ReleasedSince(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            ..EngineOptions::default()
        };

        ReconciliationEngine::new(&library, options)
            .sync("Inbox", SyncMode::Refresh)
            .await
            .unwrap();

        // e2 is finished but still inside the cutoff
        assert_eq!(library.playlist_ids("pl1"), vec!["e2", "f1", "e3"]);
    }

    #[tokio::test]
    async fn test_unknown_playlist_mutates_nothing() {
        let library = refresh_scenario();
        let engine = ReconciliationEngine::new(&library, EngineOptions::default());

        let err = engine.sync("Nope", SyncMode::Empty).await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(err.chunks_applied(), 0);
        assert!(library.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_failed_addition_reports_applied_chunks() {
        let library = FakeLibrary::new()
            .with_show(
                "showA",
                "Show A",
                &[("a1", 1, true), ("a2", 2, false), ("a3", 3, false), ("a4", 4, false)],
            )
            .with_playlist("pl1", "Inbox", &[ItemRef::Episode("a1".into())])
            .failing_mutation(3);
        let options = EngineOptions {
            add_limit: 1,
            ..EngineOptions::default()
        };

        let err = ReconciliationEngine::new(&library, options)
            .sync("Inbox", SyncMode::Refresh)
            .await
            .unwrap_err();

        // One removal chunk and one addition chunk landed before the failure
        assert!(matches!(
            err,
            SyncError::Transport {
                stage: Stage::ApplyAdditions,
                chunks_applied: 2,
                ..
            }
        ));
        assert_eq!(library.playlist_ids("pl1"), vec!["a2"]);
    }

    #[tokio::test]
    async fn test_collection_failure_happens_before_any_mutation() {
        let mut api = MockMediaApi::new();
        api.expect_user_playlists().returning(|_| {
            Ok(crate::model::Page::new(
                vec![crate::model::PlaylistSummary {
                    id: "pl1".into(),
                    name: "Inbox".into(),
                    snapshot_id: "snap".into(),
                }],
                1,
            ))
        });
        api.expect_playlist_items()
            .returning(|_, _, _| Ok(crate::model::Page::new(vec![], 0)));
        api.expect_episodes().never();
        api.expect_saved_shows()
            .returning(|_| Err(ApiError::Transport(anyhow::anyhow!("connection reset"))));
        api.expect_add_items().never();
        api.expect_remove_items().never();

        let err = ReconciliationEngine::new(&api, EngineOptions::default())
            .sync("Inbox", SyncMode::Refresh)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Transport {
                stage: Stage::CollectCandidates,
                chunks_applied: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rejected_credential_is_unauthorized() {
        let mut api = MockMediaApi::new();
        api.expect_user_playlists()
            .returning(|_| Err(ApiError::Unauthorized));

        let err = ReconciliationEngine::new(&api, EngineOptions::default())
            .sync("Inbox", SyncMode::Refresh)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Unauthorized { chunks_applied: 0 }));
        assert_eq!(err.kind(), "unauthorized");
    }

    #[test]
    fn test_plan_deduplicates_operands() {
        let contents = PlaylistContents {
            tracks: vec!["t1".into(), "t1".into()],
            episodes: vec!["e1".into(), "e1".into()],
        };
        let finished = Episode {
            id: "e1".into(),
            show_id: "s".into(),
            show_name: "S".into(),
            name: "E1".into(),
            release_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            fully_played: true,
        };
        let fresh = Episode {
            id: "e2".into(),
            fully_played: false,
            ..finished.clone()
        };

        let plan = SyncPlan::refresh(&contents, &[finished], vec![fresh.clone(), fresh]);

        assert_eq!(plan.remove, vec![ItemRef::Episode("e1".into())]);
        assert_eq!(plan.add.len(), 1);
        assert_eq!(SyncPlan::empty(&contents).remove.len(), 2);
    }
}
