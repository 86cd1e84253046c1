//! Chunked, strictly sequential playlist mutations

use crate::model::{ApiError, ItemRef, MediaApi, MUTATION_LIMIT};

/// A chunk call failed after `applied` earlier chunks had already landed
#[derive(Debug, thiserror::Error)]
#[error("mutation chunk {} failed", .applied + 1)]
pub struct BatchError {
    pub applied: usize,
    #[source]
    pub source: ApiError,
}

/// Applies add/remove operand lists in service-sized chunks.
///
/// Chunks are sent one after another in input order, so additions land in
/// the playlist in the order they were given. A failed chunk stops the batch;
/// chunks already applied stay applied.
pub struct BatchMutator<'a, A: MediaApi + ?Sized> {
    api: &'a A,
    limit: usize,
}

impl<'a, A: MediaApi + ?Sized> BatchMutator<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            limit: MUTATION_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MUTATION_LIMIT);
        self
    }

    /// Append `items` to the end of the playlist, returning the chunk count
    pub async fn add(&self, playlist_id: &str, items: &[ItemRef]) -> Result<usize, BatchError> {
        let mut applied = 0;
        for chunk in items.chunks(self.limit) {
            tracing::debug!(playlist_id, chunk = applied + 1, size = chunk.len(), "Adding chunk");
            self.api
                .add_items(playlist_id, chunk, None)
                .await
                .map_err(|source| BatchError { applied, source })?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Remove every occurrence of `items`, returning the chunk count.
    ///
    /// `snapshot_id` pins each call to that playlist version; without it the
    /// service's current state is targeted.
    pub async fn remove(
        &self,
        playlist_id: &str,
        items: &[ItemRef],
        snapshot_id: Option<&str>,
    ) -> Result<usize, BatchError> {
        let mut applied = 0;
        for chunk in items.chunks(self.limit) {
            tracing::debug!(playlist_id, chunk = applied + 1, size = chunk.len(), "Removing chunk");
            self.api
                .remove_items(playlist_id, chunk, snapshot_id.map(str::to_string))
                .await
                .map_err(|source| BatchError { applied, source })?;
            applied += 1;
        }
        Ok(applied)
    }
}
