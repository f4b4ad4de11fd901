mod app;
mod gui;

use std::path::PathBuf;

use clap::Parser;

use app::EcgApp;
use ecg_digitizer::data::settings::Settings;

/// Interactive ECG strip digitizer
#[derive(Parser, Debug)]
#[command(name = "ecg_digitizer", version, about)]
struct Args {
    /// Strip images to open
    images: Vec<PathBuf>,

    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let args = Args::parse();

    log::info!("Starting ECG Strip Digitizer v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &args.config {
        Some(path) => Settings::load_json(path).unwrap_or_else(|e| {
            log::error!("Ignoring settings file {}: {}", path.display(), e);
            Settings::default()
        }),
        None => Settings::default(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("ECG Strip Digitizer")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "ECG Strip Digitizer",
        options,
        Box::new(move |cc| Ok(Box::new(EcgApp::new(cc, settings, args.images)))),
    )
}
