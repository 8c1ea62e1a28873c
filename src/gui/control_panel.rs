//! Control Panel Widget
//! Left side panel with data sources, the selection context and export.

use crate::data::{Dimension, Selection};
use egui::{Color32, ComboBox, RichText};
use std::path::PathBuf;

/// Input files chosen by the user
#[derive(Default, Clone)]
pub struct DataSources {
    pub records_path: Option<PathBuf>,
    pub coordinates_path: Option<PathBuf>,
}

impl DataSources {
    pub fn is_complete(&self) -> bool {
        self.records_path.is_some() && self.coordinates_path.is_some()
    }
}

/// Left side control panel with file selection and selection controls.
pub struct ControlPanel {
    pub sources: DataSources,
    pub selection: Selection,
    pub countries: Vec<String>,
    pub status: String,
    pub is_error: bool,
    pub view_ready: bool,
    pub last_export: Option<PathBuf>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            sources: DataSources::default(),
            selection: Selection::default(),
            countries: Vec::new(),
            status: "Ready".to_string(),
            is_error: false,
            view_ready: false,
            last_export: None,
        }
    }
}

impl ControlPanel {
    pub fn new(sources: DataSources) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    /// Country list and starting selection after a load
    pub fn set_countries(&mut self, countries: Vec<String>, selection: Selection) {
        self.countries = countries;
        self.selection = selection;
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("Suicide Atlas")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("Suicide rates 1985-2016")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("Data Sources").size(14.0).strong());
        ui.add_space(5.0);

        if Self::file_row(ui, "Records", self.sources.records_path.as_ref()) {
            action = ControlPanelAction::BrowseRecords;
        }
        ui.add_space(4.0);
        if Self::file_row(ui, "Coordinates", self.sources.coordinates_path.as_ref()) {
            action = ControlPanelAction::BrowseCoordinates;
        }

        ui.add_space(8.0);
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.sources.is_complete(), |ui| {
                let button = egui::Button::new(RichText::new("Load Data").size(15.0))
                    .min_size(egui::vec2(200.0, 32.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::Load;
                }
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Selection Section =====
        ui.label(RichText::new("Selection").size(14.0).strong());
        ui.add_space(8.0);

        let label_width = 90.0;
        let combo_width = 170.0;

        ui.add_enabled_ui(self.view_ready, |ui| {
            ui.horizontal(|ui| {
                ui.add_sized([label_width, 20.0], egui::Label::new("Group by:"));
                ComboBox::from_id_salt("dimension")
                    .width(combo_width)
                    .selected_text(self.selection.dimension.to_string())
                    .show_ui(ui, |ui| {
                        for dimension in Dimension::ALL {
                            if ui
                                .selectable_label(
                                    self.selection.dimension == dimension,
                                    dimension.to_string(),
                                )
                                .clicked()
                                && self.selection.dimension != dimension
                            {
                                self.selection.dimension = dimension;
                                action = ControlPanelAction::SelectionChanged;
                            }
                        }
                    });
            });

            ui.add_space(5.0);

            ui.horizontal(|ui| {
                ui.add_sized([label_width, 20.0], egui::Label::new("Country:"));
                ComboBox::from_id_salt("country")
                    .width(combo_width)
                    .height(400.0)
                    .selected_text(&self.selection.country)
                    .show_ui(ui, |ui| {
                        for country in &self.countries {
                            if ui
                                .selectable_label(self.selection.country == *country, country)
                                .clicked()
                                && self.selection.country != *country
                            {
                                self.selection.country = country.clone();
                                action = ControlPanelAction::SelectionChanged;
                            }
                        }
                    });
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Export =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.view_ready, |ui| {
                let button = egui::Button::new(RichText::new("Export Dashboard").size(14.0))
                    .min_size(egui::vec2(150.0, 30.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::Export;
                }
            });

            if self.last_export.is_some() {
                ui.add_space(4.0);
                if ui.small_button("Open export folder").clicked() {
                    action = ControlPanelAction::OpenExportDir;
                }
            }
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Status =====
        ui.label(RichText::new("Status").size(14.0).strong());
        ui.add_space(5.0);

        let status_color = if self.is_error {
            Color32::from_rgb(220, 53, 69)
        } else if self.view_ready {
            Color32::from_rgb(40, 167, 69)
        } else {
            Color32::GRAY
        };
        ui.label(RichText::new(&self.status).size(11.0).color(status_color));

        action
    }

    /// File name with a browse button; true when the button was clicked.
    fn file_row(ui: &mut egui::Ui, label: &str, path: Option<&PathBuf>) -> bool {
        let mut clicked = false;
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(format!("{label}:")).size(12.0).strong());
                    let name = path
                        .and_then(|p| p.file_name())
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "No file selected".to_string());
                    ui.label(RichText::new(name).size(12.0).color(if path.is_some() {
                        Color32::WHITE
                    } else {
                        Color32::GRAY
                    }));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Browse").clicked() {
                            clicked = true;
                        }
                    });
                });
            });
        clicked
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
        self.is_error = false;
    }

    pub fn set_error(&mut self, error: &str) {
        self.status = format!("Error: {error}");
        self.is_error = true;
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseRecords,
    BrowseCoordinates,
    Load,
    SelectionChanged,
    Export,
    OpenExportDir,
}
