use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use phone_price_explorer::data::loader::write_csv;
use phone_price_explorer::experiment::{self, ExperimentConfig, Report};

use crate::color::ClassPalette;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Which chart or table the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Overview,
    Distribution,
    Correlation,
    Knn,
    Forest,
    Boosting,
    Comparison,
    Predictions,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Overview,
        View::Distribution,
        View::Correlation,
        View::Knn,
        View::Forest,
        View::Boosting,
        View::Comparison,
        View::Predictions,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Overview => "Overview",
            View::Distribution => "Price ranges",
            View::Correlation => "Correlation",
            View::Knn => "KNN sweep",
            View::Forest => "Forest sweep",
            View::Boosting => "Boosting grid",
            View::Comparison => "Comparison",
            View::Predictions => "Predictions",
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Settings for the next run; edited from the side panel.
    pub config: ExperimentConfig,

    /// Result of the last successful run.
    pub report: Option<Report>,

    pub view: View,

    pub palette: ClassPalette,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Receives the result of a run executing on a worker thread.
    pending: Option<Receiver<anyhow::Result<Report>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ExperimentConfig::default())
    }
}

impl AppState {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            config,
            report: None,
            view: View::Overview,
            palette: ClassPalette::default(),
            status_message: None,
            pending: None,
        }
    }

    /// Whether an analysis run is in progress.
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        log::info!("Data directory set to {}", dir.display());
        self.config.data_dir = dir;
        self.status_message = None;
    }

    /// Run the analysis on a worker thread so the UI stays responsive.
    pub fn start_run(&mut self) {
        if self.is_running() {
            return;
        }
        if let Err(e) = self.config.validate() {
            self.status_message = Some(format!("Error: {e:#}"));
            return;
        }
        let config = self.config.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            // The receiver may be gone if the window closed mid-run.
            let _ = tx.send(experiment::run(&config));
        });
        self.pending = Some(rx);
        self.status_message = Some(format!("Running on {} …", self.config.data_dir.display()));
    }

    /// Collect a finished run, if any. Returns true when state changed.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = &self.pending else {
            return false;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(anyhow::anyhow!("analysis thread panicked")),
        };
        self.pending = None;
        match outcome {
            Ok(report) => {
                log::info!(
                    "Analysis finished: {} training rows, final model {}",
                    report.summary.train_rows,
                    report.final_model
                );
                self.status_message = None;
                self.report = Some(report);
            }
            Err(e) => {
                log::error!("Analysis failed: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
        true
    }

    pub fn export_predictions(&mut self, path: PathBuf) {
        let Some(report) = &self.report else {
            self.status_message = Some("Run the analysis before exporting".to_string());
            return;
        };
        match write_csv(&report.predictions, &path) {
            Ok(()) => {
                log::info!("Wrote {} predictions to {}", report.predictions.len(), path.display());
                self.status_message = Some(format!("Saved {}", path.display()));
            }
            Err(e) => {
                log::error!("Failed to write predictions: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Replace the settings with a JSON config file.
    pub fn load_config(&mut self, path: PathBuf) {
        match ExperimentConfig::from_json_file(&path) {
            Ok(config) => {
                log::info!("Loaded config {}", path.display());
                self.config = config;
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to load config: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
