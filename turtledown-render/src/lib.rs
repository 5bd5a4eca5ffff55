pub mod error;
pub mod export;
pub mod scheduler;
pub mod sprite;
pub mod surface;
pub mod view;

pub use error::RenderError;
pub use export::{export_png, ExportMetadata};
pub use scheduler::{
    DrawCommand, DrawMode, DrawScheduler, FrameStats, DEFAULT_PIXEL_THRESHOLD, MAX_PIXEL_THRESHOLD,
};
pub use sprite::{mip_sizes, SpriteSheet, MIP_STEP};
pub use surface::Surface;
pub use view::{RenderOutcome, TurtleView, ViewConfig};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
