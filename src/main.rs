//! Suicide Atlas - interactive dashboard of suicide statistics
//!
//! Loads the suicide records and country coordinates, derives one table per
//! chart for the chosen grouping dimension and country, and exports them.
//!
//! Usage: `suicide_atlas [config.json]`

mod charts;
mod config;
mod data;
mod export;
mod gui;
mod stats;

use anyhow::Context;
use config::AppConfig;
use eframe::egui;
use gui::DashboardApp;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(Path::new(&path))
            .with_context(|| format!("loading config {path}"))?,
        None => AppConfig::default(),
    };
    info!(?config, "starting dashboard");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1000.0, 700.0])
            .with_title("Suicide Atlas"),
        ..Default::default()
    };

    eframe::run_native(
        "Suicide Atlas",
        options,
        Box::new(move |cc| Ok(Box::new(DashboardApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("running the window failed: {e}"))
}
