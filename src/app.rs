use std::time::Duration;

use eframe::egui;

use crate::state::{AppState, View};
use crate::ui::{panels, plot, tables};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PhonePriceApp {
    pub state: AppState,
}

impl PhonePriceApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for PhonePriceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.poll();
        if self.state.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: views and settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: active view ----
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(report) = &self.state.report else {
                ui.centered_and_justified(|ui| {
                    if self.state.is_running() {
                        ui.spinner();
                    } else {
                        ui.heading("Pick a data folder and press Run  (File → Open data folder…)");
                    }
                });
                return;
            };
            ui.heading(self.state.view.title());
            ui.separator();
            match self.state.view {
                View::Overview => tables::overview(ui, report),
                View::Distribution => plot::distribution_pie(ui, report, &self.state.palette),
                View::Correlation => plot::correlation_heatmap(ui, &report.correlation),
                View::Knn => plot::sweep_plot(ui, &report.knn_sweep),
                View::Forest => plot::sweep_plot(ui, &report.forest_sweep),
                View::Boosting => plot::boosting_grid(ui, report),
                View::Comparison => {
                    tables::comparison(ui, report);
                    ui.add_space(8.0);
                    ui.columns(2, |cols| {
                        plot::importance_bars(
                            &mut cols[0],
                            "forest_importances",
                            "Random forest feature importances",
                            &report.importances,
                        );
                        plot::importance_bars(
                            &mut cols[1],
                            "boosting_importances",
                            "Boosting feature importances",
                            &report.boosting_importances,
                        );
                    });
                }
                View::Predictions => tables::predictions(ui, report, &self.state.palette),
            }
        });
    }
}
