use eframe::egui;

use crate::app::TurtledownApp;

impl TurtledownApp {
    pub(crate) fn show_help_window(&mut self, ctx: &egui::Context) {
        if !self.show_help {
            return;
        }

        let mut open = true;
        egui::Window::new("Controls & Shortcuts")
            .open(&mut open)
            .resizable(false)
            .default_width(300.0)
            .frame(
                egui::Frame::window(&ctx.style())
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 10, 10, 210)),
            )
            .show(ctx, |ui| {
                ui.style_mut().visuals.override_text_color =
                    Some(egui::Color32::from_rgb(220, 220, 220));

                ui.heading("Keyboard");
                ui.add_space(2.0);
                key_grid(
                    ui,
                    "help_kb",
                    &[
                        ("H", "Toggle HUD"),
                        ("S", "Save snapshot PNG"),
                        ("R", "Reset to the whole image"),
                        ("F1", "This help window"),
                        ("Arrow keys", "Pan"),
                        ("+ / -", "Zoom in / out"),
                        ("Esc", "Close help"),
                    ],
                );

                ui.add_space(8.0);
                ui.heading("Mouse");
                ui.add_space(2.0);
                key_grid(
                    ui,
                    "help_mouse",
                    &[
                        ("Left drag", "Pan (release to glide)"),
                        ("Scroll wheel", "Zoom at cursor"),
                        ("Pinch", "Zoom at cursor"),
                        ("Double-click", "Zoom in smoothly"),
                    ],
                );
            });

        if !open {
            self.show_help = false;
        }
    }
}

fn key_grid(ui: &mut egui::Ui, id: &str, rows: &[(&str, &str)]) {
    egui::Grid::new(id)
        .num_columns(2)
        .spacing([12.0, 2.0])
        .show(ui, |ui| {
            for &(k, d) in rows {
                ui.label(egui::RichText::new(k).strong().color(egui::Color32::WHITE));
                ui.label(d);
                ui.end_row();
            }
        });
}
