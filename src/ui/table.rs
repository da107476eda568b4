use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Photometry table (bottom panel)
// ---------------------------------------------------------------------------

const HEADERS: [&str; 6] = ["Source", "Bandpass", "Counts/s", "Pivot", "Efflam", "Effstim"];

/// Render one row per observation made this session.
pub fn photometry_table(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Photometry");
        if ui.small_button("Clear").clicked() {
            state.photometry.clear();
        }
    });
    if state.photometry.is_empty() {
        ui.label("Observe a source through a bandpass to fill this table.");
        return;
    }

    let wave = state.waveunits;
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(120.0))
        .column(Column::auto().at_least(120.0))
        .columns(Column::auto().at_least(90.0), 3)
        .column(Column::remainder())
        .header(20.0, |mut header| {
            for title in HEADERS {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for row in &state.photometry {
                body.row(18.0, |mut cells| {
                    cells.col(|ui: &mut Ui| {
                        ui.label(&row.source);
                    });
                    cells.col(|ui: &mut Ui| {
                        ui.label(&row.band);
                    });
                    cells.col(|ui: &mut Ui| {
                        ui.label(format!("{:.4e}", row.countrate));
                    });
                    cells.col(|ui: &mut Ui| {
                        ui.label(format!("{:.2} {wave}", wave.value_from_angstrom(row.pivot)));
                    });
                    cells.col(|ui: &mut Ui| {
                        ui.label(format!("{:.2} {wave}", wave.value_from_angstrom(row.efflam)));
                    });
                    cells.col(|ui: &mut Ui| {
                        ui.label(format!("{:.4e} {}", row.effstim, row.effstim_unit));
                    });
                });
            }
        });
}
