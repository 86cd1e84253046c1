use std::fmt;

use crate::model::ApiError;

/// Stages of a reconciliation run, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    ResolvePlaylist,
    CollectCurrent,
    CollectCandidates,
    ComputeDiff,
    ApplyRemovals,
    ApplyAdditions,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::ResolvePlaylist => "resolve playlist",
            Stage::CollectCurrent => "collect current contents",
            Stage::CollectCandidates => "collect candidate episodes",
            Stage::ComputeDiff => "compute diff",
            Stage::ApplyRemovals => "apply removals",
            Stage::ApplyAdditions => "apply additions",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not authorized ({chunks_applied} mutation chunk(s) applied)")]
    Unauthorized { chunks_applied: usize },
    #[error("no playlist is named or identified by '{0}'")]
    NotFound(String),
    #[error("{stage} failed after {chunks_applied} mutation chunk(s) were applied")]
    Transport {
        stage: Stage,
        chunks_applied: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub(crate) fn from_api(stage: Stage, chunks_applied: usize, err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => SyncError::Unauthorized { chunks_applied },
            ApiError::Transport(source) => SyncError::Transport {
                stage,
                chunks_applied,
                source,
            },
        }
    }

    /// Mutation chunks that landed before the failure
    pub fn chunks_applied(&self) -> usize {
        match self {
            SyncError::Unauthorized { chunks_applied }
            | SyncError::Transport { chunks_applied, .. } => *chunks_applied,
            SyncError::NotFound(_) => 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Unauthorized { .. } => "unauthorized",
            SyncError::NotFound(_) => "not_found",
            SyncError::Transport { .. } => "transport",
        }
    }
}
