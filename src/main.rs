mod app;
mod color;
mod state;
mod ui;

use app::SynphotApp;
use eframe::egui;
use rusty_synphot::Settings;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = Settings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([700.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Synphot – Synthetic Photometry Workbench",
        options,
        Box::new(|_cc| Ok(Box::new(SynphotApp::new(settings)))),
    )
}
