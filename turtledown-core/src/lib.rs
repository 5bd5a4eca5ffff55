pub mod cache;
pub mod endpoints;
pub mod error;
pub mod grid;
pub mod identity;
pub mod metadata;
pub mod motion;
pub mod navigator;
pub mod tree;

// Re-export primary types for convenience.
pub use cache::{FetchError, Lookup, ResourceCache};
pub use endpoints::Endpoints;
pub use error::CoreError;
pub use grid::DenseGrid;
pub use identity::{Cell, NodeId, SourceId, SourceTable};
pub use metadata::{Shade, TileSpec};
pub use motion::Inertia;
pub use navigator::{Frame, GridPos, Navigator, Offset, Plan, Region, ViewSnapshot};
pub use tree::{
    Completion, DrawToken, FetchRequest, ImageWaiter, Resume, TileImage, TileNode, TileTree,
    WaitKey, DEFAULT_TILE_SIZE, ROOT_ID,
};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
