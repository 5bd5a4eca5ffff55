//! The single-threaded coordinator a host drives.
//!
//! [`TurtleView`] owns the tile tree, the navigator, inertia, the draw
//! scheduler and the surface. The host forwards input, drains
//! [`FetchRequest`]s, performs them off-thread, reports the results back and
//! calls [`TurtleView::render`] whenever [`TurtleView::wants_render`] says so.

use std::path::Path;

use tracing::{debug, info};

use turtledown_core::{
    Endpoints, FetchError, FetchRequest, Frame, Inertia, Navigator, NodeId, Plan, Resume, TileSpec,
    TileTree, ViewSnapshot, WaitKey, DEFAULT_TILE_SIZE, ROOT_ID,
};

use crate::export::{export_png, ExportMetadata};
use crate::scheduler::{DrawScheduler, FrameStats, DEFAULT_PIXEL_THRESHOLD};
use crate::sprite::SpriteSheet;
use crate::surface::Surface;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub root_id: String,
    pub tile_size: u32,
    pub endpoints: Endpoints,
    /// Seed of the root tile; children derive theirs from it.
    pub seed: u64,
    pub pixel_threshold: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            root_id: ROOT_ID.to_string(),
            tile_size: DEFAULT_TILE_SIZE,
            endpoints: Endpoints::default(),
            seed: 0,
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Drawn(Frame),
    /// Nothing was drawn; the view asks for a render once `node` is ready.
    Blocked { node: NodeId },
}

pub struct TurtleView {
    config: ViewConfig,
    tree: TileTree<SpriteSheet>,
    nav: Navigator,
    inertia: Inertia,
    scheduler: DrawScheduler,
    surface: Surface,
    dirty: bool,
}

impl TurtleView {
    pub fn new(config: ViewConfig) -> crate::Result<Self> {
        let size = config.tile_size;
        let tree = TileTree::new(&config.root_id, size, config.endpoints.clone(), config.seed)?;
        let nav = Navigator::new(size)?;
        let centre = size as f64 / 2.0;
        info!(root = %config.root_id, tile_size = size, seed = config.seed, "view created");
        Ok(Self {
            tree,
            nav,
            inertia: Inertia::new(centre, centre),
            scheduler: DrawScheduler::new(config.pixel_threshold),
            surface: Surface::new(size, size),
            dirty: true,
            config,
        })
    }

    // -- Rendering ---------------------------------------------------------

    /// Plan and draw one frame. Draws whose images are still loading are
    /// finished by later [`image_loaded`](Self::image_loaded) calls unless a
    /// newer frame starts first.
    pub fn render(&mut self) -> crate::Result<RenderOutcome> {
        self.dirty = false;
        self.scheduler.begin_frame();
        match self.nav.plan(&mut self.tree)? {
            Plan::Blocked { node } => {
                debug!(node = %node, depth = self.nav.depth(), "render blocked on an unready tile");
                Ok(RenderOutcome::Blocked { node })
            }
            Plan::Ready(frame) => {
                self.surface.clear();
                self.scheduler
                    .draw_frame(&frame, &mut self.tree, &mut self.surface)?;
                Ok(RenderOutcome::Drawn(frame))
            }
        }
    }

    /// Whether input or a resumed tile invalidated the last frame.
    pub fn wants_render(&self) -> bool {
        self.dirty
    }

    pub fn request_render(&mut self) {
        self.dirty = true;
    }

    // -- Fetch plumbing ----------------------------------------------------

    pub fn drain_requests(&mut self) -> Vec<FetchRequest> {
        self.tree.drain_requests()
    }

    /// Report an image fetch. Returns how many parked draws reached the
    /// surface.
    pub fn image_loaded(&mut self, path: &str, result: Result<SpriteSheet, FetchError>) -> usize {
        let completion = self.tree.image_loaded(path, result);
        let executed = self
            .scheduler
            .complete(&completion.draws, &self.tree, &mut self.surface);
        self.note_resumes(&completion.resumes);
        executed
    }

    pub fn spec_loaded(&mut self, id: &str, result: Result<TileSpec, FetchError>) {
        let resumes = self.tree.spec_loaded(id, result);
        self.note_resumes(&resumes);
    }

    fn note_resumes(&mut self, resumes: &[Resume]) {
        if resumes.iter().any(|resume| resume.key == WaitKey::RENDER) {
            self.dirty = true;
        }
    }

    // -- Input -------------------------------------------------------------

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.nav.pan(dx, dy);
        self.dirty = true;
    }

    pub fn zoom_at(&mut self, x: f64, y: f64, factor: f64) {
        self.inertia.set_focus(x, y);
        self.nav.zoom_at(x, y, factor);
        self.dirty = true;
    }

    /// Scroll notches at a screen position; positive zooms in.
    pub fn scroll(&mut self, x: f64, y: f64, notches: f64) {
        self.inertia.set_focus(x, y);
        self.inertia.scroll(notches);
    }

    pub fn double_activate(&mut self, x: f64, y: f64) {
        self.inertia.set_focus(x, y);
        self.inertia.double_activate();
    }

    /// A new drag cancels any glide in progress.
    pub fn begin_drag(&mut self) {
        self.inertia.vx = 0.0;
        self.inertia.vy = 0.0;
    }

    pub fn release_drag(&mut self, dx: f64, dy: f64, dt_ms: f64) {
        self.inertia.release_drag(dx, dy, dt_ms);
    }

    /// Advance inertia by `dt` seconds. Returns whether it is still moving.
    pub fn tick(&mut self, dt: f64) -> bool {
        if !self.inertia.is_moving() {
            return false;
        }
        let moving = self.inertia.tick(dt, &mut self.nav);
        self.dirty = true;
        moving
    }

    pub fn is_animating(&self) -> bool {
        self.inertia.is_moving()
    }

    /// Back to the whole root image.
    pub fn reset(&mut self) {
        self.inertia.stop();
        self.nav.reset();
        self.dirty = true;
    }

    // -- Accessors ---------------------------------------------------------

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn stats(&self) -> &FrameStats {
        self.scheduler.stats()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.nav.snapshot()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn tree(&self) -> &TileTree<SpriteSheet> {
        &self.tree
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn pixel_threshold(&self) -> f64 {
        self.scheduler.pixel_threshold()
    }

    /// Draws parked until their image arrives.
    pub fn pending_draws(&self) -> usize {
        self.scheduler.pending_draws()
    }

    pub fn pending_fetches(&self) -> usize {
        self.tree.pending_fetches()
    }

    /// Write the current surface to `path` as PNG, tagged with the view.
    pub fn export_png(&self, path: &Path) -> crate::Result<()> {
        let metadata = ExportMetadata {
            root_id: self.config.root_id.clone(),
            seed: self.config.seed,
            view: self.snapshot(),
            width: self.surface.width,
            height: self.surface.height,
        };
        export_png(self.surface.pixels(), self.surface.width, self.surface.height, path, &metadata)
    }
}
