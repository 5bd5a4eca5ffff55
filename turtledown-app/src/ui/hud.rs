use std::time::Duration;

use eframe::egui;

use crate::app::{RenderStatus, TurtledownApp, HUD_CORNER_RADIUS, HUD_MARGIN};

/// How long an export notification stays on screen.
const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(4);

impl TurtledownApp {
    pub(crate) fn show_hud(&mut self, ctx: &egui::Context) {
        if self
            .notification
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() > NOTIFICATION_TIMEOUT)
        {
            self.notification = None;
        }
        if !self.show_hud {
            return;
        }

        let hud_alpha =
            (self.preferences.hud_panel_opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        let snapshot = self.view.snapshot();

        // -- Top-left: view info --
        egui::Area::new(egui::Id::new("hud_view"))
            .anchor(egui::Align2::LEFT_TOP, [HUD_MARGIN, HUD_MARGIN])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(egui::Color32::from_black_alpha(hud_alpha))
                    .inner_margin(egui::Margin::same(8))
                    .corner_radius(HUD_CORNER_RADIUS)
                    .show(ui, |ui| {
                        ui.style_mut().visuals.override_text_color =
                            Some(egui::Color32::from_rgb(220, 220, 220));

                        ui.label(format!("Depth: {}", snapshot.depth));
                        ui.label(format!("Scale: {:.3}", snapshot.scale));
                        ui.label(format!(
                            "Offset: {:.2} {:.2}",
                            snapshot.offset.x, snapshot.offset.y
                        ));
                        if let Some(last) = snapshot.stack.last() {
                            ui.label(format!("Pixel: {}, {}", last.x, last.y));
                        }
                        ui.label(format!("Seed: {}", self.view.config().seed));
                    });
            });

        // -- Bottom-centre: render stats --
        let stats = self.view.stats();
        egui::Area::new(egui::Id::new("hud_render"))
            .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -HUD_MARGIN])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(egui::Color32::from_black_alpha(hud_alpha))
                    .inner_margin(egui::Margin::same(8))
                    .corner_radius(HUD_CORNER_RADIUS)
                    .show(ui, |ui| {
                        ui.set_min_width(180.0);
                        ui.style_mut().visuals.override_text_color =
                            Some(egui::Color32::from_rgb(200, 200, 200));
                        ui.style_mut().spacing.item_spacing.y = 2.0;

                        let status_color = match self.status {
                            RenderStatus::Idle => egui::Color32::GRAY,
                            RenderStatus::Blocked => egui::Color32::YELLOW,
                            RenderStatus::Drawn => egui::Color32::from_rgb(100, 255, 100),
                            RenderStatus::Failed => egui::Color32::from_rgb(255, 100, 100),
                        };
                        ui.colored_label(status_color, self.status.label());

                        ui.label(format!(
                            "{:.1} ms",
                            self.render_time.as_secs_f64() * 1000.0,
                        ));
                        ui.label(format!(
                            "{} tile, {} pixel draws, {} waiting",
                            stats.tile_draws.len(),
                            stats.pixel_draws,
                            self.view.pending_draws(),
                        ));
                        ui.label(format!(
                            "Pixel threshold {:.2}, {} nodes",
                            self.view.pixel_threshold(),
                            self.view.tree().node_count(),
                        ));
                        if self.in_flight > 0 {
                            ui.label(format!("{} fetches in flight", self.in_flight));
                        }
                        if let Some(ref err) = self.last_error {
                            ui.colored_label(egui::Color32::from_rgb(255, 180, 50), err);
                        }
                    });
            });

        // -- Top-right: notification --
        if let Some((ref message, _)) = self.notification {
            egui::Area::new(egui::Id::new("hud_notification"))
                .anchor(egui::Align2::RIGHT_TOP, [-HUD_MARGIN, HUD_MARGIN])
                .show(ctx, |ui| {
                    egui::Frame::NONE
                        .fill(egui::Color32::from_black_alpha(hud_alpha))
                        .inner_margin(egui::Margin::same(8))
                        .corner_radius(HUD_CORNER_RADIUS)
                        .show(ui, |ui| {
                            ui.colored_label(egui::Color32::from_rgb(220, 220, 220), message);
                        });
                });
        }
    }
}
