//! Suicide Atlas Main Application
//! Main window with control panel and chart viewer.
//!
//! Everything runs on the UI thread: input files are read when Load is
//! pressed, and views are recomputed whenever the selection changes.

use crate::charts::ChartData;
use crate::config::AppConfig;
use crate::data::{DashboardTables, PipelineContext, Selection};
use crate::export::DashboardExporter;
use crate::gui::{ChartViewer, ControlPanel, ControlPanelAction, DataSources};
use egui::SidePanel;
use std::path::PathBuf;
use tracing::{error, info};

/// Main application window.
pub struct DashboardApp {
    config: AppConfig,
    control_panel: ControlPanel,
    chart_viewer: ChartViewer,

    context: Option<PipelineContext>,
    tables: Option<DashboardTables>,
}

impl DashboardApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let sources = DataSources {
            records_path: config.records_path.clone(),
            coordinates_path: config.coordinates_path.clone(),
        };
        let mut app = Self {
            config,
            control_panel: ControlPanel::new(sources),
            chart_viewer: ChartViewer::new(),
            context: None,
            tables: None,
        };

        // Both inputs named in the config: load straight away
        if app.control_panel.sources.is_complete() {
            app.start_loading();
        }
        app
    }

    fn pick_csv(title: &str) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title(title)
            .add_filter("CSV Files", &["csv"])
            .pick_file()
    }

    /// Read both inputs, then show the default selection
    fn start_loading(&mut self) {
        let DataSources {
            records_path: Some(records_path),
            coordinates_path: Some(coordinates_path),
        } = self.control_panel.sources.clone()
        else {
            return;
        };

        let aliases = match self.config.aliases() {
            Ok(aliases) => aliases,
            Err(e) => {
                self.control_panel.set_error(&e.to_string());
                return;
            }
        };

        self.chart_viewer.clear();
        self.context = None;
        self.tables = None;
        self.control_panel.view_ready = false;

        let context = match PipelineContext::load_inputs(
            &records_path,
            &coordinates_path,
            aliases,
            self.config.view_settings(),
        ) {
            Ok(context) => context,
            Err(e) => {
                error!(error = %e, "loading inputs failed");
                self.control_panel.set_error(&e.to_string());
                return;
            }
        };

        let mut selection = context.default_selection(self.config.default_country.as_deref());
        selection.dimension = self.config.default_dimension;
        info!(
            records = context.records().height(),
            coordinates = context.coordinates().height(),
            "inputs loaded"
        );

        self.control_panel
            .set_countries(context.countries().to_vec(), selection);
        self.context = Some(context);
        self.recompute();
    }

    /// Rebuild every view for the current selection
    fn recompute(&mut self) {
        let Some(context) = &self.context else {
            return;
        };
        let selection: Selection = self.control_panel.selection.clone();

        // Selectors stay usable even if this selection fails
        self.control_panel.view_ready = true;

        let result = context
            .compute_view(&selection)
            .and_then(|tables| ChartData::from_dashboard(&tables).map(|charts| (tables, charts)));

        match result {
            Ok((tables, charts)) => {
                let mut status = format!("Showing {} / {}", selection.country, selection.dimension);
                if !tables.undefined_rates.is_empty() {
                    status.push_str(&format!(
                        "\nNo population, rate left out: {}",
                        tables.undefined_rates.join("; ")
                    ));
                }
                self.chart_viewer.set_charts(charts);
                self.tables = Some(tables);
                self.control_panel.set_status(&status);
            }
            Err(e) => {
                error!(error = %e, "computing views failed");
                self.chart_viewer.clear();
                self.tables = None;
                self.control_panel.set_error(&e.to_string());
            }
        }
    }

    /// Export tables and figures into the configured or chosen directory
    fn handle_export(&mut self) {
        let Some(tables) = &self.tables else {
            self.control_panel.set_status("Nothing to export");
            return;
        };

        let dir = match self.config.export_dir.clone() {
            Some(dir) => dir,
            None => match rfd::FileDialog::new()
                .set_title("Export directory")
                .pick_folder()
            {
                Some(dir) => dir,
                None => return,
            },
        };

        self.control_panel.set_status("Exporting...");
        match DashboardExporter::export_dashboard(tables, &self.chart_viewer.charts, &dir) {
            Ok(files) => {
                info!(dir = %dir.display(), files = files.len(), "export finished");
                self.control_panel
                    .set_status(&format!("Exported {} files to {}", files.len(), dir.display()));
                self.control_panel.last_export = Some(dir);
            }
            Err(e) => {
                error!(error = %e, "export failed");
                self.control_panel.set_error(&e.to_string());
            }
        }
    }

    fn open_export_dir(&mut self) {
        if let Some(dir) = &self.control_panel.last_export {
            if let Err(e) = open::that(dir) {
                let message = format!("Could not open {}: {e}", dir.display());
                self.control_panel.set_error(&message);
            }
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    match self.control_panel.show(ui) {
                        ControlPanelAction::BrowseRecords => {
                            if let Some(path) = Self::pick_csv("Suicide records") {
                                self.control_panel.sources.records_path = Some(path);
                            }
                        }
                        ControlPanelAction::BrowseCoordinates => {
                            if let Some(path) = Self::pick_csv("Country coordinates") {
                                self.control_panel.sources.coordinates_path = Some(path);
                            }
                        }
                        ControlPanelAction::Load => self.start_loading(),
                        ControlPanelAction::SelectionChanged => self.recompute(),
                        ControlPanelAction::Export => self.handle_export(),
                        ControlPanelAction::OpenExportDir => self.open_export_dir(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        // Central panel - Chart Viewer
        egui::CentralPanel::default().show(ctx, |ui| {
            self.chart_viewer.show(ui);
        });
    }
}
