use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, info, trace, warn};

use turtledown_core::{CoreError, DrawToken, Frame, ImageWaiter, Lookup, Region, TileTree, WaitKey};

use crate::sprite::SpriteSheet;
use crate::surface::Surface;

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Scale above which individual pixels are drawn as child tiles.
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 5.0;

/// The threshold stops growing once it reaches this value.
pub const MAX_PIXEL_THRESHOLD: f64 = 30.0;

const THRESHOLD_GROWTH: f64 = 1.25;

/// Average per-pixel batch duration that counts as too slow.
const SLOW_BATCH: Duration = Duration::from_millis(200);

/// Number of recent batches averaged when adapting the threshold.
const BATCH_WINDOW: usize = 3;

/// The whole-tile overlay fades out over `scale / ALPHA_DIVISOR` scale units
/// past the pixel threshold.
const ALPHA_DIVISOR: f64 = 1.65;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawMode {
    /// The tile's own image, nearest-neighbour scaled, with an opacity.
    Tile { alpha: f32 },
    /// A pre-scaled child image for one tile pixel.
    Pixel,
}

/// One image placed on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub path: Arc<str>,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub mode: DrawMode,
}

/// What a frame issued and what became of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    /// Whole-tile draws issued this frame: `(path, alpha)`.
    pub tile_draws: Vec<(Arc<str>, f32)>,
    /// Per-pixel draws issued this frame.
    pub pixel_draws: usize,
    /// Draws that reached the surface (immediately or on completion).
    pub executed: usize,
    /// Draws waiting on an image.
    pub deferred: usize,
    /// Completions that arrived for an earlier frame.
    pub dropped_stale: usize,
    /// Draws skipped because their image failed to load.
    pub failed: usize,
    /// Time spent issuing per-pixel batches.
    pub batch_time: Duration,
}

struct PendingDraw {
    frame: u64,
    command: DrawCommand,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Issues draws for a planned frame and cancels them once they go stale.
///
/// Every draw is stamped with the frame counter. A draw whose image is not
/// cached yet is parked until [`DrawScheduler::complete`]; if a newer frame
/// has started by then it is discarded.
pub struct DrawScheduler {
    frame: u64,
    next_token: u64,
    pending: HashMap<DrawToken, PendingDraw>,
    /// Pre-scaled child images for the current frame, by path and size.
    memo: HashMap<(Arc<str>, u32), Arc<RgbaImage>>,
    pixel_threshold: f64,
    batch_times: VecDeque<Duration>,
    stats: FrameStats,
}

impl DrawScheduler {
    pub fn new(pixel_threshold: f64) -> Self {
        let pixel_threshold = if pixel_threshold.is_finite() && pixel_threshold > 0.0 {
            pixel_threshold
        } else {
            DEFAULT_PIXEL_THRESHOLD
        };
        Self {
            frame: 0,
            next_token: 0,
            pending: HashMap::new(),
            memo: HashMap::new(),
            pixel_threshold,
            batch_times: VecDeque::from(vec![Duration::ZERO; BATCH_WINDOW]),
            stats: FrameStats::default(),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pixel_threshold(&self) -> f64 {
        self.pixel_threshold
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Draws still waiting on an image.
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Start a new frame: everything still pending becomes stale.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        self.memo.clear();
        let purged = self.pending.len();
        self.pending.clear();
        self.stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };
        trace!(frame = self.frame, purged, "frame started");
        self.frame
    }

    /// Opacity of the whole-tile overlay at `scale`, or `None` if it is not
    /// drawn.
    pub fn tile_alpha(&self, scale: f64) -> Option<f32> {
        let fade = scale / ALPHA_DIVISOR;
        let limit = self.pixel_threshold + fade;
        (scale < limit).then(|| ((limit - scale) / fade).min(1.0) as f32)
    }

    /// Record how long a per-pixel batch took and grow the threshold when
    /// recent batches have been slow.
    pub fn record_batch(&mut self, elapsed: Duration) {
        self.batch_times.pop_front();
        self.batch_times.push_back(elapsed);
        let average = self.batch_times.iter().sum::<Duration>() / BATCH_WINDOW as u32;
        if average > SLOW_BATCH && self.pixel_threshold < MAX_PIXEL_THRESHOLD {
            let previous = self.pixel_threshold;
            self.pixel_threshold = (self.pixel_threshold * THRESHOLD_GROWTH).min(MAX_PIXEL_THRESHOLD);
            info!(
                average_ms = average.as_millis(),
                previous,
                threshold = self.pixel_threshold,
                "per-pixel drawing is slow, raising the pixel threshold"
            );
        }
    }

    /// Issue every draw for `frame`.
    ///
    /// Per-pixel batches come first so the fading whole-tile overlay lands on
    /// top of them.
    pub fn draw_frame(
        &mut self,
        frame: &Frame,
        tree: &mut TileTree<SpriteSheet>,
        surface: &mut Surface,
    ) -> turtledown_core::Result<()> {
        for region in &frame.regions {
            self.draw_region(region, tree, surface)?;
        }
        debug!(
            frame = self.frame,
            regions = frame.regions.len(),
            tiles = self.stats.tile_draws.len(),
            pixels = self.stats.pixel_draws,
            deferred = self.stats.deferred,
            "frame drawn"
        );
        Ok(())
    }

    fn draw_region(
        &mut self,
        region: &Region,
        tree: &mut TileTree<SpriteSheet>,
        surface: &mut Surface,
    ) -> turtledown_core::Result<()> {
        let scale = region.scale;
        if scale > self.pixel_threshold
            && !tree.await_ready(region.node, WaitKey::RENDER)
            && !tree.is_failed(region.node)
        {
            let start = Instant::now();
            match self.draw_pixels(region, tree, surface) {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    self.stats.batch_time += elapsed;
                    self.record_batch(elapsed);
                }
                Err(err @ CoreError::TileUnavailable { .. }) => {
                    warn!(node = %region.node, error = %err, "skipping per-pixel batch");
                    self.stats.failed += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(alpha) = self.tile_alpha(scale) {
            let path = tree.source_path(region.node);
            self.stats.tile_draws.push((Arc::clone(&path), alpha));
            self.submit(
                DrawCommand {
                    path,
                    x: region.x,
                    y: region.y,
                    size: region.size,
                    mode: DrawMode::Tile { alpha },
                },
                tree,
                surface,
            );
        }
        Ok(())
    }

    fn draw_pixels(
        &mut self,
        region: &Region,
        tree: &mut TileTree<SpriteSheet>,
        surface: &mut Surface,
    ) -> turtledown_core::Result<()> {
        let scale = region.scale;
        let size = scale.round() + 2.0;
        let (columns, rows) = region.pixel_window();
        for x in columns {
            for y in rows.clone() {
                let path = tree.pixel_source_path(region.node, x, y)?;
                let px = region.x + x as f64 * scale;
                let py = region.y + y as f64 * scale;
                self.stats.pixel_draws += 1;
                self.submit(
                    DrawCommand {
                        path,
                        x: px.round() - 1.0,
                        y: py.round() - 1.0,
                        size,
                        mode: DrawMode::Pixel,
                    },
                    tree,
                    surface,
                );
            }
        }
        Ok(())
    }

    /// Draw now if the image is cached, otherwise park the command until its
    /// image arrives. Each parked draw also leaves a waiter on the image, and
    /// that list keeps growing across frames until the image completes.
    pub fn submit(&mut self, command: DrawCommand, tree: &mut TileTree<SpriteSheet>, surface: &mut Surface) {
        let token = DrawToken(self.next_token);
        self.next_token += 1;
        match tree.image(&command.path, Some(ImageWaiter::Draw(token))) {
            Lookup::Ready(sheet) => self.execute(&command, &sheet, surface),
            Lookup::Pending => {
                self.stats.deferred += 1;
                self.pending.insert(
                    token,
                    PendingDraw {
                        frame: self.frame,
                        command,
                    },
                );
            }
            Lookup::Failed(_) => self.stats.failed += 1,
        }
    }

    /// Run the parked draws for `tokens` whose image has just been reported.
    /// Returns how many reached the surface.
    pub fn complete(&mut self, tokens: &[DrawToken], tree: &TileTree<SpriteSheet>, surface: &mut Surface) -> usize {
        let mut executed = 0;
        for token in tokens {
            let Some(draw) = self.pending.remove(token) else {
                self.stats.dropped_stale += 1;
                continue;
            };
            if draw.frame != self.frame {
                self.stats.dropped_stale += 1;
                continue;
            }
            match tree.peek_image(&draw.command.path) {
                Some(Lookup::Ready(sheet)) => {
                    self.execute(&draw.command, &sheet, surface);
                    executed += 1;
                }
                _ => self.stats.failed += 1,
            }
        }
        if self.stats.dropped_stale > 0 {
            trace!(frame = self.frame, dropped = self.stats.dropped_stale, "stale draws dropped");
        }
        executed
    }

    fn execute(&mut self, command: &DrawCommand, sheet: &SpriteSheet, surface: &mut Surface) {
        match command.mode {
            DrawMode::Tile { alpha } => {
                surface.blit_scaled(sheet.strip(), sheet.base_size(), command.x, command.y, command.size, alpha)
            }
            DrawMode::Pixel => {
                let size = command.size.max(1.0) as u32;
                let scaled = self
                    .memo
                    .entry((Arc::clone(&command.path), size))
                    .or_insert_with(|| Arc::new(sheet.scaled(size)));
                surface.put_image(scaled, command.x as i64, command.y as i64);
            }
        }
        self.stats.executed += 1;
    }
}

impl Default for DrawScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_fades_out_past_the_threshold() {
        let scheduler = DrawScheduler::default();
        assert_eq!(scheduler.tile_alpha(1.0), Some(1.0));
        assert!((scheduler.tile_alpha(5.0).unwrap() - 1.0).abs() < 1e-6);

        // At scale 8.25 the fade spans 5 units and ends at 10.
        let alpha = scheduler.tile_alpha(8.25).unwrap();
        assert!((alpha - 0.35).abs() < 1e-6);
        // Gone once scale >= threshold * 1.65 / 0.65.
        assert!(scheduler.tile_alpha(12.5).is_some());
        assert_eq!(scheduler.tile_alpha(13.0), None);
    }

    #[test]
    fn slow_batches_raise_the_threshold() {
        let mut scheduler = DrawScheduler::default();
        scheduler.record_batch(Duration::from_millis(500));
        assert_eq!(scheduler.pixel_threshold(), 5.0, "one slow batch averages 167 ms");
        scheduler.record_batch(Duration::from_millis(500));
        assert_eq!(scheduler.pixel_threshold(), 6.25);
        scheduler.record_batch(Duration::from_millis(10));
        assert_eq!(scheduler.pixel_threshold(), 7.8125);
    }

    #[test]
    fn threshold_growth_is_capped() {
        let mut scheduler = DrawScheduler::new(28.0);
        for _ in 0..10 {
            scheduler.record_batch(Duration::from_secs(1));
        }
        assert_eq!(scheduler.pixel_threshold(), MAX_PIXEL_THRESHOLD);
    }

    #[test]
    fn fast_batches_leave_the_threshold_alone() {
        let mut scheduler = DrawScheduler::default();
        for _ in 0..10 {
            scheduler.record_batch(Duration::from_millis(150));
        }
        assert_eq!(scheduler.pixel_threshold(), DEFAULT_PIXEL_THRESHOLD);
    }

    #[test]
    fn invalid_threshold_falls_back_to_default() {
        assert_eq!(DrawScheduler::new(f64::NAN).pixel_threshold(), DEFAULT_PIXEL_THRESHOLD);
        assert_eq!(DrawScheduler::new(-1.0).pixel_threshold(), DEFAULT_PIXEL_THRESHOLD);
    }

    #[test]
    fn each_frame_gets_a_fresh_counter() {
        let mut scheduler = DrawScheduler::default();
        assert_eq!(scheduler.begin_frame(), 1);
        assert_eq!(scheduler.begin_frame(), 2);
        assert_eq!(scheduler.stats().frame, 2);
    }
}
