use std::time::Instant;

use eframe::egui;
use tracing::{error, info};

use crate::app::{TurtledownApp, KEY_ZOOM, PAN_FRACTION};
use crate::app_dir;

impl TurtledownApp {
    pub(crate) fn handle_canvas_input(
        &mut self,
        ctx: &egui::Context,
        response: &egui::Response,
        canvas: egui::Rect,
    ) {
        let k = self.surface_per_point(canvas);

        let scroll_y = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll_y.abs() > 0.0 && response.hovered() {
            if let Some(pos) = response.hover_pos() {
                let (x, y) = self.to_surface(canvas, pos);
                self.view.scroll(x, y, scroll_y as f64);
            }
        }

        let pinch = ctx.input(|i| i.zoom_delta());
        if pinch != 1.0 && response.hovered() {
            if let Some(pos) = response.hover_pos() {
                let (x, y) = self.to_surface(canvas, pos);
                self.view.zoom_at(x, y, pinch as f64);
            }
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = self.to_surface(canvas, pos);
                self.view.double_activate(x, y);
            }
        }

        if response.drag_started_by(egui::PointerButton::Primary) {
            self.view.begin_drag();
            self.last_drag = None;
            self.last_drag_at = Some(Instant::now());
        }
        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_delta();
            if delta != egui::Vec2::ZERO {
                let now = Instant::now();
                let dt_ms = self
                    .last_drag_at
                    .map(|at| now.duration_since(at).as_secs_f64() * 1000.0)
                    .unwrap_or(0.0);
                self.last_drag_at = Some(now);
                self.last_drag = Some((delta, dt_ms));
                self.view.pan(delta.x as f64 * k, delta.y as f64 * k);
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            // A pointer held still before release does not fling.
            let idle_ms = self
                .last_drag_at
                .map(|at| at.elapsed().as_secs_f64() * 1000.0)
                .unwrap_or(f64::INFINITY);
            if let Some((delta, dt_ms)) = self.last_drag.take() {
                if idle_ms < 100.0 && dt_ms > 0.0 {
                    self.view
                        .release_drag(delta.x as f64 * k, delta.y as f64 * k, dt_ms);
                }
            }
            self.last_drag_at = None;
        }
    }

    pub(crate) fn handle_keyboard(&mut self, ctx: &egui::Context) {
        let text_editing = ctx.memory(|m| m.focused().is_some());
        if text_editing {
            return;
        }

        let side = self.view.surface().width as f64;
        let centre = side / 2.0;
        let step = side * PAN_FRACTION;
        let mut export = false;

        ctx.input(|input| {
            if input.key_pressed(egui::Key::ArrowLeft) {
                self.view.pan(step, 0.0);
            }
            if input.key_pressed(egui::Key::ArrowRight) {
                self.view.pan(-step, 0.0);
            }
            if input.key_pressed(egui::Key::ArrowUp) {
                self.view.pan(0.0, step);
            }
            if input.key_pressed(egui::Key::ArrowDown) {
                self.view.pan(0.0, -step);
            }

            if input.key_pressed(egui::Key::Plus) || input.key_pressed(egui::Key::Equals) {
                self.view.zoom_at(centre, centre, KEY_ZOOM);
            }
            if input.key_pressed(egui::Key::Minus) {
                self.view.zoom_at(centre, centre, 1.0 / KEY_ZOOM);
            }

            if input.key_pressed(egui::Key::R) && !input.modifiers.ctrl {
                self.view.reset();
            }
            if input.key_pressed(egui::Key::H) {
                self.show_hud = !self.show_hud;
            }
            if input.key_pressed(egui::Key::F1) {
                self.show_help = !self.show_help;
            }
            if input.key_pressed(egui::Key::Escape) {
                self.show_help = false;
            }
            if input.key_pressed(egui::Key::S) && !input.modifiers.ctrl {
                export = true;
            }
        });

        if export {
            self.export_snapshot();
        }
    }

    /// Write the current surface under `snapshots/` next to the executable.
    pub(crate) fn export_snapshot(&mut self) {
        let dir = app_dir::snapshots_directory();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            error!("Failed to create snapshot directory: {e}");
            self.notify(format!("Export failed: {e}"));
            return;
        }
        let snapshot = self.view.snapshot();
        let name = format!("turtledown_depth{}", snapshot.depth);
        let path = unique_path(&dir, &name, "png");
        match self.view.export_png(&path) {
            Ok(()) => {
                info!("Exported snapshot to {}", path.display());
                let short = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.notify(format!("Saved {short}"));
            }
            Err(e) => {
                error!("Failed to export snapshot: {e}");
                self.notify(format!("Export failed: {e}"));
            }
        }
    }
}

fn unique_path(dir: &std::path::Path, name: &str, ext: &str) -> std::path::PathBuf {
    let base = dir.join(format!("{name}.{ext}"));
    if !base.exists() {
        return base;
    }
    for i in 1..10000 {
        let candidate = dir.join(format!("{name}_{i:03}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    dir.join(format!("{name}_export.{ext}"))
}
