use std::f64::consts::TAU;

use eframe::egui::{Align2, Color32, RichText, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, HLine, Legend, Line, LineStyle, MarkerShape, Plot, PlotPoint, PlotPoints,
    Points, Polygon, Text,
};

use phone_price_explorer::analysis::CorrelationMatrix;
use phone_price_explorer::experiment::{Report, Sweep};

use crate::color::{ClassPalette, correlation_color, generate_palette};

// ---------------------------------------------------------------------------
// Price range pie
// ---------------------------------------------------------------------------

/// Share of each price range in the training labels, as a pie.
pub fn distribution_pie(ui: &mut Ui, report: &Report, palette: &ClassPalette) {
    let total: usize = report.distribution.iter().map(|s| s.count).sum();
    if total == 0 {
        ui.label("No labelled rows.");
        return;
    }

    Plot::new("distribution_pie")
        .legend(Legend::default())
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            let mut start = 0.0;
            for share in &report.distribution {
                let sweep = TAU * share.count as f64 / total as f64;
                if sweep <= 0.0 {
                    continue;
                }
                let color = palette.color_for(share.class);
                // Quarter-turn pieces keep every polygon convex.
                let pieces = (sweep / (TAU / 4.0)).ceil() as usize;
                for p in 0..pieces {
                    let a0 = start + sweep * p as f64 / pieces as f64;
                    let a1 = start + sweep * (p + 1) as f64 / pieces as f64;
                    plot_ui.polygon(
                        Polygon::new(wedge(a0, a1))
                            .name(share.class.label())
                            .fill_color(color)
                            .stroke(Stroke::new(1.0, Color32::WHITE)),
                    );
                }

                let mid = start + sweep / 2.0;
                plot_ui.text(
                    Text::new(
                        PlotPoint::new(0.65 * mid.cos(), 0.65 * mid.sin()),
                        RichText::new(format!("{}\n{:.2}%", share.class.label(), share.percent))
                            .color(Color32::BLACK),
                    )
                    .anchor(Align2::CENTER_CENTER),
                );
                start += sweep;
            }
        });
}

fn wedge(a0: f64, a1: f64) -> PlotPoints<'static> {
    let steps = (((a1 - a0) / TAU) * 96.0).ceil().max(2.0) as usize;
    std::iter::once([0.0, 0.0])
        .chain((0..=steps).map(|s| {
            let a = a0 + (a1 - a0) * s as f64 / steps as f64;
            [a.cos(), a.sin()]
        }))
        .collect()
}

// ---------------------------------------------------------------------------
// Correlation heatmap
// ---------------------------------------------------------------------------

/// Lower-triangle heatmap of pairwise correlations, each cell annotated.
pub fn correlation_heatmap(ui: &mut Ui, matrix: &CorrelationMatrix) {
    let n = matrix.columns.len();
    let x_names = matrix.columns.clone();
    let y_names = matrix.columns.clone();

    Plot::new("correlation_heatmap")
        .data_aspect(1.0)
        .show_grid(false)
        .x_axis_formatter(move |mark, _range| axis_name(&x_names, mark.value))
        .y_axis_formatter(move |mark, _range| axis_name(&y_names, -mark.value))
        .show(ui, |plot_ui| {
            for row in 0..n {
                for col in 0..n {
                    if matrix.is_masked(row, col) {
                        continue;
                    }
                    let r = matrix.values[[row, col]];
                    let (x, y) = (col as f64, -(row as f64));
                    let cell: PlotPoints = vec![
                        [x - 0.5, y - 0.5],
                        [x + 0.5, y - 0.5],
                        [x + 0.5, y + 0.5],
                        [x - 0.5, y + 0.5],
                    ]
                    .into();
                    plot_ui.polygon(
                        Polygon::new(cell)
                            .fill_color(correlation_color(r))
                            .stroke(Stroke::new(0.5, Color32::WHITE)),
                    );
                    plot_ui.text(
                        Text::new(
                            PlotPoint::new(x, y),
                            RichText::new(format!("{r:.2}")).small().color(Color32::BLACK),
                        )
                        .anchor(Align2::CENTER_CENTER),
                    );
                }
            }
        });
}

fn axis_name(names: &[String], value: f64) -> String {
    let i = value.round();
    if (value - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    names.get(i as usize).cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

/// Validation error and accuracy against the swept hyperparameter.
pub fn sweep_plot(ui: &mut Ui, sweep: &Sweep) {
    let half = (ui.available_height() / 2.0 - 8.0).max(120.0);
    let mse: Vec<[f64; 2]> = sweep.points.iter().map(|p| [p.param as f64, p.mse]).collect();
    let acc: Vec<[f64; 2]> = sweep
        .points
        .iter()
        .map(|p| [p.param as f64, p.accuracy])
        .collect();

    for (id, label, data, color, best) in [
        ("sweep_mse", "Mean squared error", mse, Color32::RED, sweep.best_by_mse()),
        ("sweep_acc", "Accuracy", acc, Color32::BLUE, sweep.best_by_accuracy()),
    ] {
        Plot::new((id, sweep.param_name.as_str()))
            .height(half)
            .legend(Legend::default())
            .x_axis_label(sweep.param_name.as_str())
            .y_axis_label(label)
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(PlotPoints::from(data.clone()))
                        .name(label)
                        .color(color)
                        .style(LineStyle::dashed_dense()),
                );
                plot_ui.points(
                    Points::new(PlotPoints::from(data))
                        .color(color)
                        .shape(MarkerShape::Circle)
                        .radius(3.0),
                );
                if let Some(best) = best {
                    let y = if id == "sweep_mse" { best.mse } else { best.accuracy };
                    plot_ui.points(
                        Points::new(PlotPoints::from(vec![[best.param as f64, y]]))
                            .name(format!("best: {}={}", sweep.param_name, best.param))
                            .color(Color32::GOLD)
                            .shape(MarkerShape::Diamond)
                            .radius(6.0),
                    );
                }
            });
    }
}

// ---------------------------------------------------------------------------
// Boosting grid
// ---------------------------------------------------------------------------

/// Mean CV accuracy per learning rate, with the single-stump baseline.
pub fn boosting_grid(ui: &mut Ui, report: &Report) {
    let grid = &report.grid;
    let mut rates: Vec<f64> = grid.cells.iter().map(|c| c.params.learning_rate).collect();
    rates.dedup();
    let colors = generate_palette(rates.len());

    ui.label(format!(
        "Best: n_estimators={}, learning_rate={} (CV accuracy {:.4})",
        grid.best.params.n_estimators, grid.best.params.learning_rate, grid.best.mean_score
    ));
    ui.label(format!(
        "Refit on the training split: validation mse {:.4}, accuracy {:.4}",
        report.grid_best.mse, report.grid_best.accuracy
    ));

    Plot::new("boosting_grid")
        .legend(Legend::default())
        .x_axis_label("n_estimators")
        .y_axis_label("Mean CV accuracy")
        .show(ui, |plot_ui| {
            for (&lr, &color) in rates.iter().zip(colors.iter()) {
                let points: PlotPoints = grid
                    .cells
                    .iter()
                    .filter(|c| c.params.learning_rate == lr && !c.mean_score.is_nan())
                    .map(|c| [c.params.n_estimators as f64, c.mean_score])
                    .collect();
                plot_ui.line(Line::new(points).name(format!("lr={lr}")).color(color));
            }
            plot_ui.hline(
                HLine::new(report.stump.validation_accuracy)
                    .name("single stump (validation)")
                    .color(Color32::GRAY)
                    .style(LineStyle::dashed_loose()),
            );
            plot_ui.points(
                Points::new(PlotPoints::from(vec![[
                    grid.best.params.n_estimators as f64,
                    grid.best.mean_score,
                ]]))
                .name("best")
                .color(Color32::GOLD)
                .shape(MarkerShape::Diamond)
                .radius(6.0),
            );
        });
}

// ---------------------------------------------------------------------------
// Feature importances
// ---------------------------------------------------------------------------

pub fn importance_bars(ui: &mut Ui, id: &str, title: &str, importances: &[(String, f64)]) {
    if importances.is_empty() {
        return;
    }
    let shown: Vec<&(String, f64)> = importances.iter().take(10).collect();
    let names: Vec<String> = shown.iter().map(|(n, _)| n.clone()).collect();
    let bars: Vec<Bar> = shown
        .iter()
        .enumerate()
        .map(|(i, (name, v))| Bar::new(i as f64, *v).name(name))
        .collect();

    ui.strong(title);
    Plot::new(id)
        .height(260.0)
        .show_grid(false)
        .y_axis_formatter(move |mark, _range| axis_name(&names, mark.value))
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(
                BarChart::new(bars)
                    .horizontal()
                    .color(Color32::from_rgb(90, 140, 200)),
            );
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wedge_spans_its_arc_from_the_centre() {
        let points: PlotPoints<'static> = wedge(0.0, TAU / 4.0);
        let points = points.points();
        assert_eq!((points[0].x, points[0].y), (0.0, 0.0));
        let first = points[1];
        let last = points[points.len() - 1];
        assert!((first.x - 1.0).abs() < 1e-12 && first.y.abs() < 1e-12);
        assert!(last.x.abs() < 1e-12 && (last.y - 1.0).abs() < 1e-12);
        assert!(points[1..]
            .iter()
            .all(|p| ((p.x * p.x + p.y * p.y).sqrt() - 1.0).abs() < 1e-12));
    }
}
