use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use phone_price_explorer::experiment::{self, ExperimentConfig};

/// Run the price-range analysis without the GUI and print the report.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Folder holding train.csv and test.csv
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON settings file; missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the test table with predicted price ranges here
    #[arg(short, long)]
    predictions: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.predictions.is_some() {
        config.predictions_path = args.predictions;
    }

    let report = experiment::run(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}
