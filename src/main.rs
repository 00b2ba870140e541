mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::PhonePriceApp;
use clap::Parser;
use eframe::egui;
use phone_price_explorer::experiment::ExperimentConfig;
use state::AppState;

/// Explore the phone price dataset and compare classifiers.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Folder holding train.csv and test.csv; the analysis starts right away
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result {
    env_logger::init();
    let args = Args::parse();

    let config = match args.config.as_deref().map(ExperimentConfig::from_json_file) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            log::error!("Ignoring config: {e:#}");
            ExperimentConfig::default()
        }
        None => ExperimentConfig::default(),
    };
    let mut state = AppState::new(config);
    if let Some(dir) = args.data_dir {
        state.set_data_dir(dir);
        state.start_run();
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Phone Price Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(PhonePriceApp::new(state)))),
    )
}
