mod app;
mod app_dir;
mod fetch_worker;
mod input;
mod preferences;
mod ui;

fn main() -> eframe::Result {
    app::run()
}
