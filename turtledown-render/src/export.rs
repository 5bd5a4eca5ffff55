//! PNG export with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use turtledown_core::ViewSnapshot;

use crate::error::RenderError;

/// Metadata to embed in an exported PNG as tEXt chunks.
pub struct ExportMetadata {
    pub root_id: String,
    pub seed: u64,
    pub view: ViewSnapshot,
    pub width: u32,
    pub height: u32,
}

/// Write an RGBA pixel buffer as a PNG file with embedded view metadata.
///
/// Uses the `png` crate directly (rather than `image`) to inject custom tEXt
/// chunks readable by exiftool, IrfanView, XnView, etc.
pub fn export_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    path: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<()> {
    if pixels.len() != width as usize * height as usize * 4 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder.add_text_chunk("Software".to_string(), "Turtledown".to_string())?;
    encoder.add_text_chunk("Description".to_string(), build_description(metadata))?;
    for (key, value) in build_metadata_pairs(metadata)? {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(pixels)?;

    debug!("Exported PNG {}x{} to {}", width, height, path.display());
    Ok(())
}

fn build_description(meta: &ExportMetadata) -> String {
    format!(
        "{} - Depth: {}, Scale: {}, Offset: {} {}",
        meta.root_id, meta.view.depth, meta.view.scale, meta.view.offset.x, meta.view.offset.y,
    )
}

fn build_metadata_pairs(meta: &ExportMetadata) -> crate::Result<Vec<(String, String)>> {
    let stack = meta
        .view
        .stack
        .iter()
        .map(|pos| format!("{},{}", pos.x, pos.y))
        .collect::<Vec<_>>()
        .join(";");
    Ok(vec![
        ("Turtledown.RootId".into(), meta.root_id.clone()),
        ("Turtledown.Seed".into(), meta.seed.to_string()),
        ("Turtledown.Depth".into(), meta.view.depth.to_string()),
        ("Turtledown.Stack".into(), stack),
        ("Turtledown.OffsetX".into(), meta.view.offset.x.to_string()),
        ("Turtledown.OffsetY".into(), meta.view.offset.y.to_string()),
        ("Turtledown.Scale".into(), meta.view.scale.to_string()),
        ("Turtledown.View".into(), serde_json::to_string(&meta.view)?),
        ("Turtledown.Resolution".into(), format!("{}x{}", meta.width, meta.height)),
    ])
}
