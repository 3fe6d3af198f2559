use std::path::Path;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::loader::{load_catalog, load_table};
use crate::data::model::{LineCatalog, format_flux};
use crate::state::{AppState, Slot};

// ---------------------------------------------------------------------------
// Left side panel – inputs and tolerance
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Spectra");
    ui.separator();

    for (slot, title) in [(Slot::First, "Region 1"), (Slot::Second, "Region 2")] {
        ui.strong(title);
        match state.table(slot) {
            Some(table) => {
                ui.label(format!("{}  ({} rows)", table.name, table.len()));
                if table.missing_count() > 0 {
                    ui.label(
                        RichText::new(format!("{} missing fluxes", table.missing_count()))
                            .color(Color32::GRAY),
                    );
                }
            }
            None => {
                ui.label("Not loaded.");
            }
        }
        if ui.button("Open…").clicked() {
            open_table_dialog(state, slot);
        }
        ui.add_space(6.0);
    }

    ui.separator();
    ui.strong("Line catalog");
    ui.label(format!("{} lines", state.catalog.len()));
    ui.checkbox(&mut state.show_markers, "Show markers");

    ui.add_space(6.0);
    ui.strong("Peak window");
    let mut tolerance = state.tolerance;
    if ui
        .add(
            egui::Slider::new(&mut tolerance, 0.01..=0.5)
                .text("± μm")
                .logarithmic(true),
        )
        .changed()
    {
        state.set_tolerance(tolerance);
    }
}

// ---------------------------------------------------------------------------
// Right side panel – line summary
// ---------------------------------------------------------------------------

pub fn summary_panel(ui: &mut Ui, state: &AppState) {
    ui.heading("Line summary");
    ui.separator();

    if state.summary.is_empty() {
        ui.label("Load both spectra to compare lines.");
        return;
    }

    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .column(Column::auto().at_least(110.0))
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(20.0, |mut header| {
                for title in ["Line", "λ (μm)", "Region 1", "Region 2", "Stronger In"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for row in &state.summary {
                    body.row(18.0, |mut table_row| {
                        table_row.col(|ui| {
                            ui.label(&row.label);
                        });
                        table_row.col(|ui| {
                            ui.label(format!("{}", row.wavelength));
                        });
                        table_row.col(|ui| {
                            ui.label(format_flux(row.first));
                        });
                        table_row.col(|ui| {
                            ui.label(format_flux(row.second));
                        });
                        table_row.col(|ui| {
                            ui.label(row.stronger.to_string());
                        });
                    });
                }
            });
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open region 1 spectrum…").clicked() {
                open_table_dialog(state, Slot::First);
                ui.close_menu();
            }
            if ui.button("Open region 2 spectrum…").clicked() {
                open_table_dialog(state, Slot::Second);
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Open line catalog…").clicked() {
                open_catalog_dialog(state);
                ui.close_menu();
            }
            if ui.button("Built-in mid-IR catalog").clicked() {
                state.set_catalog(LineCatalog::mid_infrared());
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(figure) = &state.figure {
            ui.label(format!(
                "{} spectra, {} lines in range",
                figure.series.len(),
                figure.markers.len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_table_dialog(state: &mut AppState, slot: Slot) {
    let file = rfd::FileDialog::new()
        .set_title("Open extracted spectrum")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        load_into(state, slot, &path);
    }
}

/// Load a spectrum file into `slot`, reporting failures in the status bar.
pub fn load_into(state: &mut AppState, slot: Slot, path: &Path) {
    match load_table(path) {
        Ok(table) => {
            log::info!(
                "Loaded '{}' ({} rows, {} missing)",
                table.name,
                table.len(),
                table.missing_count()
            );
            state.set_table(slot, table);
        }
        Err(e) => {
            log::error!("Failed to load {}: {e:#}", path.display());
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

pub fn open_catalog_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open line catalog")
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        match load_catalog(&path) {
            Ok(catalog) => {
                log::info!("Loaded {} catalog lines", catalog.len());
                state.set_catalog(catalog);
            }
            Err(e) => {
                log::error!("Failed to load catalog: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
