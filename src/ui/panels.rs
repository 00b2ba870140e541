use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};

use phone_price_explorer::experiment::ModelKind;
use phone_price_explorer::model::{BoostingAlgorithm, BoostingParams, ScalerKind};

use crate::state::{AppState, View};

const DEFAULT_SENTINELS: [&str; 2] = ["px_height", "sc_w"];

// ---------------------------------------------------------------------------
// Left side panel – views and settings
// ---------------------------------------------------------------------------

/// Render the left panel: view selector, then the run settings.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Views");
    ui.separator();
    let has_report = state.report.is_some();
    for view in View::ALL {
        let enabled = has_report || view == View::Overview;
        if ui
            .add_enabled(enabled, egui::SelectableLabel::new(state.view == view, view.title()))
            .clicked()
        {
            state.view = view;
        }
    }

    ui.add_space(8.0);
    ui.heading("Settings");
    ui.separator();

    let running = state.is_running();
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.add_enabled_ui(!running, |ui: &mut Ui| settings(ui, state));
        });
}

fn settings(ui: &mut Ui, state: &mut AppState) {
    let config = &mut state.config;

    egui::CollapsingHeader::new(RichText::new("Cleaning").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let mut drop_zeros = !config.sentinel_columns.is_empty();
            if ui
                .checkbox(&mut drop_zeros, "Drop rows with zero px_height / sc_w")
                .changed()
            {
                config.sentinel_columns = if drop_zeros {
                    DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect()
                } else {
                    Vec::new()
                };
            }
            ui.checkbox(&mut config.drop_test_index, "Drop test id column");

            egui::ComboBox::from_id_salt("scaling")
                .selected_text(format!("{:?}", config.scaling))
                .show_ui(ui, |ui: &mut Ui| {
                    for kind in [ScalerKind::None, ScalerKind::MinMax, ScalerKind::Standard] {
                        ui.selectable_value(&mut config.scaling, kind, format!("{kind:?}"));
                    }
                });
        });

    egui::CollapsingHeader::new(RichText::new("Split").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Validation share");
                ui.add(DragValue::new(&mut config.test_size).range(0.05..=0.95).speed(0.01));
            });
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Seed");
                ui.add(DragValue::new(&mut config.split_seed));
            });
        });

    egui::CollapsingHeader::new(RichText::new("Models").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            optional_count(ui, "KNN k", &mut config.knn_k, 21, 1..=200);
            optional_count(ui, "Forest size", &mut config.forest_size, 100, 1..=2000);
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Forest depth");
                ui.add(DragValue::new(&mut config.forest_max_depth).range(1..=32));
            });

            ui.horizontal(|ui: &mut Ui| {
                ui.label("Boosting");
                egui::ComboBox::from_id_salt("boosting_algorithm")
                    .selected_text(config.boosting_algorithm.to_string())
                    .show_ui(ui, |ui: &mut Ui| {
                        for algorithm in BoostingAlgorithm::ALL {
                            ui.selectable_value(
                                &mut config.boosting_algorithm,
                                algorithm,
                                algorithm.to_string(),
                            );
                        }
                    });
            });

            let mut fixed = config.boosting.is_some();
            ui.checkbox(&mut fixed, "Fixed boosting setting");
            if !fixed {
                config.boosting = None;
            } else if config.boosting.is_none() {
                config.boosting = Some(BoostingParams {
                    n_estimators: 7,
                    learning_rate: 0.05,
                });
            }
            if let Some(params) = &mut config.boosting {
                ui.horizontal(|ui: &mut Ui| {
                    ui.label("n");
                    ui.add(DragValue::new(&mut params.n_estimators).range(1..=500));
                    ui.label("lr");
                    ui.add(
                        DragValue::new(&mut params.learning_rate)
                            .range(0.001..=2.0)
                            .speed(0.005),
                    );
                });
            } else {
                ui.label("Best grid-search cell is used.");
            }
            ui.horizontal(|ui: &mut Ui| {
                ui.label("CV folds");
                ui.add(DragValue::new(&mut config.cv_folds).range(2..=10));
            });
        });

    egui::CollapsingHeader::new(RichText::new("Predictions").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let selected = config
                .final_model
                .map_or("Most accurate".to_string(), |m| m.to_string());
            egui::ComboBox::from_id_salt("final_model")
                .selected_text(selected)
                .show_ui(ui, |ui: &mut Ui| {
                    ui.selectable_value(&mut config.final_model, None, "Most accurate");
                    for kind in ModelKind::ALL {
                        ui.selectable_value(&mut config.final_model, Some(kind), kind.to_string());
                    }
                });
        });
}

/// A count that is either fixed or picked from its sweep.
fn optional_count(
    ui: &mut Ui,
    label: &str,
    value: &mut Option<usize>,
    fallback: usize,
    range: std::ops::RangeInclusive<usize>,
) {
    ui.horizontal(|ui: &mut Ui| {
        let mut fixed = value.is_some();
        ui.checkbox(&mut fixed, label);
        if !fixed {
            *value = None;
        } else if value.is_none() {
            *value = Some(fallback);
        }
        match value {
            Some(v) => {
                ui.add(DragValue::new(v).range(range));
            }
            None => {
                ui.label("best of sweep");
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open data folder…").clicked() {
                open_folder_dialog(state);
                ui.close_menu();
            }
            if ui.button("Load config…").clicked() {
                open_config_dialog(state);
                ui.close_menu();
            }
            let can_export = state.report.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export predictions…"))
                .clicked()
            {
                save_predictions_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(state.config.data_dir.display().to_string());

        let running = state.is_running();
        if ui.add_enabled(!running, egui::Button::new("▶ Run")).clicked() {
            state.start_run();
        }
        if running {
            ui.spinner();
        }

        if let Some(report) = &state.report {
            ui.separator();
            ui.label(format!(
                "{} train / {} test rows, final model {}",
                report.summary.train_rows, report.summary.test_rows, report.final_model
            ));
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                ui.visuals().text_color()
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Folder with train and test tables")
        .set_directory(&state.config.data_dir)
        .pick_folder();
    if let Some(dir) = folder {
        state.set_data_dir(dir);
    }
}

pub fn open_config_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Load analysis settings")
        .add_filter("JSON", &["json"])
        .pick_file();
    if let Some(path) = file {
        state.load_config(path);
    }
}

pub fn save_predictions_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save test predictions")
        .add_filter("CSV", &["csv"])
        .set_file_name("predictions.csv")
        .save_file();
    if let Some(path) = file {
        state.export_predictions(path);
    }
}
