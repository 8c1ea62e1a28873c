//! Chart Viewer Widget
//! Right side scrollable panel showing the dashboard charts as cards.
//! Cards wrap into as many columns as the available width allows.

use crate::charts::{ChartData, ChartKind, ChartPlotter};
use egui::{RichText, ScrollArea};

const CHART_SPACING: f32 = 15.0;
const CARD_HEIGHT: f32 = 470.0;
const CHART_WIDTH: f32 = 640.0;
const PLOT_HEIGHT: f32 = 380.0;

/// Scrollable chart display area with responsive multi-column layout.
#[derive(Default)]
pub struct ChartViewer {
    pub charts: Vec<ChartData>,
}

impl ChartViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.charts.clear();
    }

    pub fn set_charts(&mut self, charts: Vec<ChartData>) {
        self.charts = charts;
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        if self.charts.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        }

        let avail_width = ui.available_width();
        let num_columns = ((avail_width / (CHART_WIDTH + CHART_SPACING)).floor() as usize).max(1);
        let total_rows = self.charts.len().div_ceil(num_columns);
        let row_height = CARD_HEIGHT + CHART_SPACING;
        let charts = &self.charts;

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show_rows(ui, row_height, total_rows, |ui, row_range| {
                for row in row_range {
                    ui.horizontal(|ui| {
                        let start = row * num_columns;
                        let end = (start + num_columns).min(charts.len());
                        for chart in &charts[start..end] {
                            Self::draw_chart_card(ui, chart);
                            ui.add_space(CHART_SPACING);
                        }
                    });
                    ui.add_space(CHART_SPACING);
                }
            });
    }

    fn draw_chart_card(ui: &mut egui::Ui, chart: &ChartData) {
        let card_width = CHART_WIDTH - 20.0;

        egui::Frame::none()
            .rounding(8.0)
            .stroke(ui.visuals().widgets.noninteractive.bg_stroke)
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.set_width(card_width);
                ui.vertical(|ui| {
                    ui.label(RichText::new(&chart.title).size(16.0).strong());
                    ui.add_space(8.0);

                    match &chart.kind {
                        // Plot on the left, summary on the right
                        ChartKind::Violin { distribution, .. } if !chart.is_empty() => {
                            ui.horizontal(|ui| {
                                ui.vertical(|ui| {
                                    ui.set_width(card_width * 0.45);
                                    ChartPlotter::draw_chart(ui, chart, PLOT_HEIGHT);
                                });
                                ui.add_space(10.0);
                                ui.vertical(|ui| {
                                    ChartPlotter::draw_summary_table(ui, &chart.id, distribution);
                                });
                            });
                        }
                        _ => ChartPlotter::draw_chart(ui, chart, PLOT_HEIGHT),
                    }
                });
            });
    }
}
