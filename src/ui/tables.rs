use eframe::egui::{RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use phone_price_explorer::analysis::ColumnSummary;
use phone_price_explorer::data::model::PriceRange;
use phone_price_explorer::experiment::Report;

use crate::color::ClassPalette;

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Overview: row counts and per-column statistics
// ---------------------------------------------------------------------------

pub fn overview(ui: &mut Ui, report: &Report) {
    let s = &report.summary;
    ui.label(format!(
        "Training rows: {} ({} removed for zero px_height / sc_w, {} with missing values)",
        s.train_rows,
        s.sentinel_train(),
        s.train_missing_rows
    ));
    ui.label(format!(
        "Test rows: {} ({} removed, {} with missing values)",
        s.test_rows,
        s.sentinel_test(),
        s.test_missing_rows
    ));
    ui.add_space(6.0);

    ui.strong("Training table");
    describe_table(ui, "describe_train", &report.describe_train);
    ui.add_space(6.0);
    ui.strong("Test table");
    describe_table(ui, "describe_test", &report.describe_test);
}

fn describe_table(ui: &mut Ui, id: &str, rows: &[ColumnSummary]) {
    let headers = ["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"];
    ui.push_id(id, |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(260.0)
            .column(Column::auto().at_least(100.0))
            .columns(Column::auto().at_least(60.0), headers.len() - 1)
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for h in headers {
                    header.col(|ui| {
                        ui.strong(h);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                    let c = &rows[row.index()];
                    row.col(|ui| {
                        ui.label(&c.name);
                    });
                    row.col(|ui| {
                        ui.label(c.count.to_string());
                    });
                    for v in [c.mean, c.std, c.min, c.q25, c.median, c.q75, c.max] {
                        row.col(|ui| {
                            ui.monospace(format!("{v:.2}"));
                        });
                    }
                });
            });
    });
}

// ---------------------------------------------------------------------------
// Model comparison
// ---------------------------------------------------------------------------

pub fn comparison(ui: &mut Ui, report: &Report) {
    ui.label(format!(
        "Single stump accuracy: train {:.4}, validation {:.4}",
        report.stump.train_accuracy, report.stump.validation_accuracy
    ));
    ui.push_id("comparison", |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().at_least(110.0))
            .column(Column::auto().at_least(180.0))
            .columns(Column::auto().at_least(70.0), 3)
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for h in ["model", "setting", "mse", "accuracy", "f1 (macro)"] {
                    header.col(|ui| {
                        ui.strong(h);
                    });
                }
            })
            .body(|mut body| {
                for score in &report.comparison {
                    body.row(ROW_HEIGHT, |mut row| {
                        let chosen = score.model == report.final_model;
                        row.col(|ui| {
                            let text = RichText::new(score.model.to_string());
                            ui.label(if chosen { text.strong() } else { text });
                        });
                        row.col(|ui| {
                            ui.label(&score.setting);
                        });
                        for v in [score.mse, score.accuracy, score.f1_macro] {
                            row.col(|ui| {
                                ui.monospace(format!("{v:.4}"));
                            });
                        }
                    });
                }
            });
    });
    ui.label(format!("Test predictions use {}.", report.final_model));
}

// ---------------------------------------------------------------------------
// Test predictions
// ---------------------------------------------------------------------------

pub fn predictions(ui: &mut Ui, report: &Report, palette: &ClassPalette) {
    ui.horizontal_wrapped(|ui| {
        for share in &report.predicted_distribution {
            ui.label(
                RichText::new(format!(
                    "{}: {} ({:.1}%)",
                    share.class.label(),
                    share.count,
                    share.percent
                ))
                .color(palette.color_for(share.class)),
            );
        }
    });
    ui.separator();

    let frame = &report.predictions;
    let Some(label_idx) = frame.column_index(&report.summary.label) else {
        ui.label("No prediction column.");
        return;
    };

    ScrollArea::horizontal().show(ui, |ui| {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().at_least(40.0))
            .columns(Column::auto().at_least(56.0), frame.n_columns())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                for name in &frame.columns {
                    header.col(|ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, frame.len(), |mut row| {
                    let i = row.index();
                    row.col(|ui| {
                        ui.label(i.to_string());
                    });
                    for (j, &v) in frame.row(i).iter().enumerate() {
                        row.col(|ui| {
                            if j == label_idx {
                                if let Some(class) = PriceRange::from_value(v) {
                                    ui.label(
                                        RichText::new(class.label())
                                            .color(palette.color_for(class)),
                                    );
                                    return;
                                }
                            }
                            ui.monospace(format_cell(v));
                        });
                    }
                });
            });
    });
}

fn format_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}
