//! Chart Plotter Module
//! Draws the dashboard charts interactively with egui_plot.

use crate::charts::chart_data::{heat_color, unit_scale, ChartData, ChartKind, ScatterPoint};
use crate::stats::RateDistribution;
use egui::{Color32, RichText};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, Line, Plot, PlotPoints, Points, Polygon,
};
use std::collections::HashMap;

/// Colour of bars without a colour metric.
pub const BAR_COLOR: Color32 = Color32::from_rgb(52, 152, 219);
/// Colour of the LOESS trend line and violin outline.
pub const TREND_COLOR: Color32 = Color32::from_rgb(44, 62, 80);

/// Creates interactive charts using egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn heat(t: f64) -> Color32 {
        let (r, g, b) = heat_color(t);
        Color32::from_rgb(r, g, b)
    }

    /// Calculate beeswarm positions for points with duplicate values.
    pub fn beeswarm_positions(y_values: &[f64], center: f64, width: f64) -> Vec<f64> {
        let n = y_values.len();
        if n == 0 {
            return Vec::new();
        }

        let mut positions = vec![center; n];

        // Values closer than 1% of the range share a slot
        let (min, max) = y_values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let bucket = ((max - min) / 100.0).max(f64::EPSILON);
        let mut value_indices: HashMap<i64, Vec<usize>> = HashMap::new();

        for (i, &y) in y_values.iter().enumerate() {
            let key = ((y - min) / bucket).round() as i64;
            value_indices.entry(key).or_default().push(i);
        }

        // Spread duplicates symmetrically
        for indices in value_indices.values() {
            if indices.len() > 1 {
                let count = indices.len();
                let step = width / (count - 1) as f64;
                let start = center - width / 2.0;

                for (i, &idx) in indices.iter().enumerate() {
                    positions[idx] = start + i as f64 * step;
                }
            }
        }

        positions
    }

    /// Draw any dashboard chart.
    pub fn draw_chart(ui: &mut egui::Ui, chart: &ChartData, height: f32) {
        if chart.is_empty() {
            ui.allocate_ui(egui::vec2(ui.available_width(), height), |ui| {
                ui.centered_and_justified(|ui| {
                    ui.label(RichText::new("No data for this selection").color(Color32::GRAY));
                });
            });
            return;
        }

        match &chart.kind {
            ChartKind::Bars {
                x_label,
                y_label,
                categories,
                values,
                shades,
                horizontal,
            } => Self::draw_bar_chart(
                ui,
                &chart.id,
                height,
                (x_label, y_label),
                categories,
                values,
                shades.as_deref(),
                *horizontal,
            ),
            ChartKind::Scatter {
                x_label,
                y_label,
                points,
                trend,
                geographic,
            } => Self::draw_scatter_chart(
                ui,
                &chart.id,
                height,
                (x_label, y_label),
                points,
                trend,
                *geographic,
            ),
            ChartKind::Violin {
                y_label,
                distribution,
            } => Self::draw_violin_chart(ui, &chart.id, height, y_label, distribution),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_bar_chart(
        ui: &mut egui::Ui,
        id: &str,
        height: f32,
        (x_label, y_label): (&str, &str),
        categories: &[String],
        values: &[f64],
        shades: Option<&[f64]>,
        horizontal: bool,
    ) {
        let n = values.len();
        let colors: Vec<Color32> = match shades {
            Some(shades) => unit_scale(shades).into_iter().map(Self::heat).collect(),
            None => vec![BAR_COLOR; n],
        };

        // Horizontal rankings read top-down, largest first
        let position = |i: usize| if horizontal { (n - 1 - i) as f64 } else { i as f64 };

        let bars: Vec<Bar> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Bar::new(position(i), v)
                    .name(categories.get(i).cloned().unwrap_or_default())
                    .fill(colors[i])
                    .width(0.7)
            })
            .collect();

        let mut chart = BarChart::new(bars).name(id);
        if horizontal {
            chart = chart.horizontal();
        }

        let labels: Vec<String> = if horizontal {
            categories.iter().rev().cloned().collect()
        } else {
            categories.to_vec()
        };
        let category_label = move |value: f64| {
            let idx = value.round();
            if (value - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            labels.get(idx as usize).cloned().unwrap_or_default()
        };

        let mut plot = Plot::new(format!("bars_{id}"))
            .height(height)
            .allow_scroll(false)
            .x_axis_label(x_label)
            .y_axis_label(y_label);
        plot = if horizontal {
            plot.y_axis_formatter(move |mark, _range| category_label(mark.value))
        } else {
            plot.x_axis_formatter(move |mark, _range| category_label(mark.value))
        };

        plot.show(ui, |plot_ui| {
            plot_ui.bar_chart(chart);
        });
    }

    fn draw_scatter_chart(
        ui: &mut egui::Ui,
        id: &str,
        height: f32,
        (x_label, y_label): (&str, &str),
        points: &[ScatterPoint],
        trend: &[[f64; 2]],
        geographic: bool,
    ) {
        let metrics: Vec<f64> = points.iter().map(|p| p.metric).collect();
        let scaled = unit_scale(&metrics);

        let mut plot = Plot::new(format!("scatter_{id}"))
            .height(height)
            .allow_scroll(false)
            .x_axis_label(x_label)
            .y_axis_label(y_label);
        if geographic {
            plot = plot
                .include_x(-180.0)
                .include_x(180.0)
                .include_y(-90.0)
                .include_y(90.0)
                .data_aspect(1.0);
        }

        plot.show(ui, |plot_ui| {
            for (point, &t) in points.iter().zip(&scaled) {
                let radius = if geographic { 3.0 + 9.0 * t as f32 } else { 4.0 };
                plot_ui.points(
                    Points::new(PlotPoints::new(vec![[point.x, point.y]]))
                        .radius(radius)
                        .color(Self::heat(t))
                        .name(format!("{} ({:.2})", point.label, point.metric)),
                );
            }

            if trend.len() > 1 {
                plot_ui.line(
                    Line::new(PlotPoints::new(trend.to_vec()))
                        .color(TREND_COLOR)
                        .width(2.0)
                        .name("LOESS"),
                );
            }
        });
    }

    fn draw_violin_chart(
        ui: &mut egui::Ui,
        id: &str,
        height: f32,
        y_label: &str,
        distribution: &RateDistribution,
    ) {
        let summary = &distribution.summary;
        let peak = distribution
            .density
            .iter()
            .map(|p| p[1])
            .fold(0.0_f64, f64::max);
        let half_width = 0.4;
        let scale = if peak > 0.0 { half_width / peak } else { 0.0 };

        // Outline: right half bottom-up, then left half top-down
        let mut outline: Vec<[f64; 2]> = distribution
            .density
            .iter()
            .map(|&[y, d]| [d * scale, y])
            .collect();
        outline.extend(distribution.density.iter().rev().map(|&[y, d]| [-d * scale, y]));

        let box_elem = BoxElem::new(
            0.0,
            BoxSpread::new(summary.min, summary.q1, summary.median, summary.q3, summary.max),
        )
        .box_width(0.1)
        .fill(TREND_COLOR.gamma_multiply(0.4))
        .stroke(egui::Stroke::new(1.5, TREND_COLOR));

        let xs = Self::beeswarm_positions(&distribution.values, 0.7, 0.3);
        let swarm: Vec<[f64; 2]> = xs
            .into_iter()
            .zip(&distribution.values)
            .map(|(x, &y)| [x, y])
            .collect();

        Plot::new(format!("violin_{id}"))
            .height(height)
            .allow_scroll(false)
            .show_x(false)
            .y_axis_label(y_label)
            .include_x(-0.6)
            .include_x(1.0)
            .show(ui, |plot_ui| {
                if outline.len() > 2 {
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::new(outline))
                            .fill_color(BAR_COLOR.gamma_multiply(0.3))
                            .stroke(egui::Stroke::new(1.0, BAR_COLOR))
                            .name("density"),
                    );
                }
                plot_ui.box_plot(BoxPlot::new(vec![box_elem]).name("quartiles"));
                plot_ui.points(
                    Points::new(PlotPoints::new(swarm))
                        .radius(3.0)
                        .color(BAR_COLOR.gamma_multiply(0.8))
                        .name("countries"),
                );
            });
    }

    /// Summary table shown under the distribution chart.
    pub fn draw_summary_table(ui: &mut egui::Ui, id: &str, distribution: &RateDistribution) {
        let s = &distribution.summary;
        egui::Grid::new(ui.make_persistent_id(format!("summary_{id}")))
            .striped(true)
            .min_col_width(55.0)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                for header in ["N", "Min", "Q1", "Median", "Q3", "Max", "Mean"] {
                    ui.label(RichText::new(header).strong().size(11.0));
                }
                ui.end_row();

                ui.label(RichText::new(s.count.to_string()).size(11.0));
                for v in [s.min, s.q1, s.median, s.q3, s.max, s.mean] {
                    ui.label(RichText::new(format!("{v:.2}")).size(11.0));
                }
                ui.end_row();
            });
    }
}
