use std::sync::mpsc;
use std::time::Instant;

use eframe::egui;
use tracing::{debug, error, info, warn};

use turtledown_core::FetchRequest;
use turtledown_render::{RenderOutcome, TurtleView};

use crate::fetch_worker::{spawn_fetch_workers, FetchResponse};
use crate::preferences::AppPreferences;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fraction of the tile to pan per arrow-key press.
pub(crate) const PAN_FRACTION: f64 = 0.1;
/// Zoom factor per `+` key press; `-` uses its inverse.
pub(crate) const KEY_ZOOM: f64 = 1.25;
pub(crate) const HUD_MARGIN: f32 = 8.0;
pub(crate) const HUD_CORNER_RADIUS: f32 = 6.0;
/// Longest frame step fed to inertia, so a stalled frame does not fling the view.
const MAX_TICK_SECONDS: f64 = 0.1;

// ---------------------------------------------------------------------------
// Render status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderStatus {
    Idle,
    /// Waiting on the tile that must be loaded before anything can be drawn.
    Blocked,
    Drawn,
    Failed,
}

impl RenderStatus {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Blocked => "Loading\u{2026}",
            Self::Drawn => "Drawn",
            Self::Failed => "Render failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Application struct
// ---------------------------------------------------------------------------

pub(crate) struct TurtledownApp {
    pub(crate) view: TurtleView,
    pub(crate) preferences: AppPreferences,

    // Fetch workers
    pub(crate) tx_fetch: mpsc::Sender<FetchRequest>,
    pub(crate) rx_fetch: mpsc::Receiver<FetchResponse>,
    pub(crate) in_flight: usize,

    // Surface texture
    pub(crate) texture: Option<egui::TextureHandle>,
    pub(crate) texture_revision: Option<u64>,

    // Render stats
    pub(crate) status: RenderStatus,
    pub(crate) render_time: std::time::Duration,
    pub(crate) last_error: Option<String>,

    // UI state
    pub(crate) show_hud: bool,
    pub(crate) show_help: bool,
    pub(crate) last_tick: Instant,
    /// Most recent drag step and its duration in milliseconds.
    pub(crate) last_drag: Option<(egui::Vec2, f64)>,
    pub(crate) last_drag_at: Option<Instant>,
    pub(crate) notification: Option<(String, Instant)>,
}

// ---------------------------------------------------------------------------
// Constructor
// ---------------------------------------------------------------------------

impl TurtledownApp {
    pub(crate) fn new(
        egui_ctx: &egui::Context,
        prefs: AppPreferences,
    ) -> turtledown_render::Result<Self> {
        let config = prefs.view_config();
        info!(
            seed = config.seed,
            images = %config.endpoints.images,
            metadata = %config.endpoints.metadata,
            "starting view"
        );
        let view = TurtleView::new(config)?;
        let (tx_fetch, rx_fetch) = spawn_fetch_workers(prefs.fetch_workers, egui_ctx.clone());

        let mut app = Self {
            view,
            show_hud: prefs.show_hud,
            preferences: prefs,
            tx_fetch,
            rx_fetch,
            in_flight: 0,
            texture: None,
            texture_revision: None,
            status: RenderStatus::Idle,
            render_time: std::time::Duration::ZERO,
            last_error: None,
            show_help: false,
            last_tick: Instant::now(),
            last_drag: None,
            last_drag_at: None,
            notification: None,
        };
        app.dispatch_fetches();
        Ok(app)
    }

    // -- Fetch plumbing ----------------------------------------------------

    /// Hand every queued fetch to the workers.
    pub(crate) fn dispatch_fetches(&mut self) {
        for request in self.view.drain_requests() {
            if let Err(e) = self.tx_fetch.send(request) {
                error!("Fetch workers are gone, dropping request: {e}");
                continue;
            }
            self.in_flight += 1;
        }
    }

    /// Feed finished fetches back into the view.
    fn poll_fetch_responses(&mut self) {
        while let Ok(response) = self.rx_fetch.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            match response {
                FetchResponse::Image { path, result } => {
                    let executed = self.view.image_loaded(&path, result);
                    if executed > 0 {
                        debug!(%path, executed, "parked draws completed");
                    }
                }
                FetchResponse::Spec { id, result } => self.view.spec_loaded(&id, result),
            }
        }
    }

    // -- Frame -------------------------------------------------------------

    fn advance_inertia(&mut self) {
        let now = Instant::now();
        let dt = now
            .duration_since(self.last_tick)
            .as_secs_f64()
            .min(MAX_TICK_SECONDS);
        self.last_tick = now;
        self.view.tick(dt);
    }

    fn render_if_needed(&mut self) {
        if !self.view.wants_render() {
            return;
        }
        let start = Instant::now();
        match self.view.render() {
            Ok(RenderOutcome::Drawn(frame)) => {
                self.status = RenderStatus::Drawn;
                self.last_error = None;
                if frame.outside_root > 0 || frame.unavailable > 0 {
                    debug!(
                        outside_root = frame.outside_root,
                        unavailable = frame.unavailable,
                        "frame skipped neighbours"
                    );
                }
            }
            Ok(RenderOutcome::Blocked { .. }) => self.status = RenderStatus::Blocked,
            Err(e) => {
                warn!("Render failed: {e}");
                self.status = RenderStatus::Failed;
                self.last_error = Some(e.to_string());
            }
        }
        self.render_time = start.elapsed();
    }

    /// Re-upload the surface when it changed since the last upload.
    fn sync_texture(&mut self, ctx: &egui::Context) {
        let surface = self.view.surface();
        if self.texture_revision == Some(surface.revision()) {
            return;
        }
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [surface.width as usize, surface.height as usize],
            surface.pixels(),
        );
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("turtledown_surface", image, egui::TextureOptions::LINEAR));
            }
        }
        self.texture_revision = Some(surface.revision());
    }

    /// Largest centred square that fits `available`.
    pub(crate) fn canvas_rect(available: egui::Rect) -> egui::Rect {
        let side = available.width().min(available.height()).max(1.0);
        egui::Rect::from_center_size(available.center(), egui::vec2(side, side))
    }

    /// Surface pixels per screen point on the canvas.
    pub(crate) fn surface_per_point(&self, canvas: egui::Rect) -> f64 {
        self.view.surface().width as f64 / canvas.width().max(1.0) as f64
    }

    /// Screen position to surface coordinates.
    pub(crate) fn to_surface(&self, canvas: egui::Rect, pos: egui::Pos2) -> (f64, f64) {
        let k = self.surface_per_point(canvas);
        (
            (pos.x - canvas.min.x) as f64 * k,
            (pos.y - canvas.min.y) as f64 * k,
        )
    }

    pub(crate) fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some((message.into(), Instant::now()));
    }

    fn update_canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let available = ui.available_rect_before_wrap();
                let canvas = Self::canvas_rect(available);
                let response = ui.allocate_rect(canvas, egui::Sense::click_and_drag());
                let painter = ui.painter_at(canvas);

                if let Some(ref tex) = self.texture {
                    let uv =
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    painter.image(tex.id(), canvas, uv, egui::Color32::WHITE);
                }

                if self.in_flight > 0 {
                    let bar_h = 3.0;
                    let bar = egui::Rect::from_min_size(
                        egui::pos2(canvas.min.x, canvas.max.y - bar_h),
                        egui::vec2(canvas.width(), bar_h),
                    );
                    painter.rect_filled(bar, 0.0, egui::Color32::from_rgb(80, 200, 255));
                }

                self.handle_canvas_input(ctx, &response, canvas);
            });
    }
}

// ---------------------------------------------------------------------------
// eframe::App
// ---------------------------------------------------------------------------

impl eframe::App for TurtledownApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());
        self.poll_fetch_responses();
        self.advance_inertia();

        self.update_canvas(ctx);
        self.handle_keyboard(ctx);

        self.render_if_needed();
        self.dispatch_fetches();
        self.sync_texture(ctx);

        self.show_hud(ctx);
        self.show_help_window(ctx);

        // Fetch completions wake the UI themselves.
        if self.view.is_animating() || self.view.wants_render() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.preferences.show_hud = self.show_hud;
        self.preferences.save();
        info!("Saved preferences on exit");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn run() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Turtledown");

    let prefs = AppPreferences::load();

    let viewport = egui::ViewportBuilder::default()
        .with_title("Turtledown")
        .with_inner_size([prefs.window_width, prefs.window_height]);

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "Turtledown",
        options,
        Box::new(move |cc| Ok(Box::new(TurtledownApp::new(&cc.egui_ctx, prefs)?))),
    )
}
