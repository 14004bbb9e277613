#![windows_subsystem = "windows"]

mod bootstrap;
mod clicker;
mod config;
mod exit;
mod gui;
mod provision;
mod store;
mod updates;

use eframe::egui;
use gui::ClickerApp;
use log::{info, LevelFilter};
use store::{AppPaths, Store};

fn main() -> eframe::Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let paths = AppPaths::from_data_dir();
    info!("Game data lives in '{}'.", paths.root.display());
    let store = Store::new(paths);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config::WINDOW_TITLE)
            .with_inner_size([config::WINDOW_WIDTH, config::WINDOW_HEIGHT])
            .with_min_inner_size([config::WINDOW_WIDTH, config::WINDOW_HEIGHT]),
        centered: true,
        ..Default::default()
    };

    let result = eframe::run_native(
        config::WINDOW_TITLE,
        options,
        Box::new(move |cc| Box::new(ClickerApp::new(cc, store))),
    );
    info!("Game closed.");
    result
}
