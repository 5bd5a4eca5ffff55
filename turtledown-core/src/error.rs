use thiserror::Error;

use crate::identity::NodeId;

/// Errors originating from the tile tree and the viewport navigator.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid tile size: {0} (must be >= 1)")]
    InvalidTileSize(u32),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("tile {0} is not ready; await it before querying pixels")]
    NotReady(NodeId),

    #[error("tile {node} (`{source_id}`) is unavailable: {reason}")]
    TileUnavailable {
        node: NodeId,
        source_id: String,
        reason: String,
    },

    #[error("metadata for `{0}` has an empty candidate list")]
    EmptyCandidates(String),

    #[error("malformed metadata for `{id}`: {reason}")]
    MalformedSpec { id: String, reason: String },

    #[error("viewport did not settle within {steps} steps")]
    Unsettled { steps: usize },
}
