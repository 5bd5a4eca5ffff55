use thiserror::Error;

/// Errors originating from the drawing pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("failed to decode tile image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode PNG: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("failed to serialize view metadata: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] turtledown_core::CoreError),
}
