use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};
use rusty_synphot::{FluxUnit, Force, WaveUnit};

use crate::state::{AppState, BandKind, SourceKind};

// ---------------------------------------------------------------------------
// Left side panel – sources, bandpasses, observation
// ---------------------------------------------------------------------------

/// Render the left model panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Sources");
            ui.separator();
            source_list(ui, state);
            egui::CollapsingHeader::new(RichText::new("New source").strong())
                .id_salt("new_source")
                .default_open(true)
                .show(ui, |ui: &mut Ui| source_form(ui, state));

            ui.add_space(8.0);
            ui.heading("Bandpasses");
            ui.separator();
            band_list(ui, state);
            egui::CollapsingHeader::new(RichText::new("New bandpass").strong())
                .id_salt("new_band")
                .default_open(true)
                .show(ui, |ui: &mut Ui| band_form(ui, state));

            ui.add_space(8.0);
            ui.heading("Observe");
            ui.separator();
            observe_controls(ui, state);
        });
}

fn source_list(ui: &mut Ui, state: &mut AppState) {
    if state.sources.is_empty() {
        ui.label("No sources yet.");
        return;
    }
    let mut remove = None;
    for (idx, entry) in state.sources.iter_mut().enumerate() {
        let color = state.color_map.color_for(&entry.label);
        ui.horizontal(|ui: &mut Ui| {
            ui.checkbox(&mut entry.visible, "");
            let selected = state.selected_source == Some(idx);
            if ui
                .selectable_label(selected, RichText::new(&entry.label).color(color))
                .clicked()
            {
                state.selected_source = Some(idx);
            }
            if ui.small_button("✖").clicked() {
                remove = Some(idx);
            }
        });
    }
    if let Some(idx) = remove {
        state.remove_source(idx);
    }
}

fn band_list(ui: &mut Ui, state: &mut AppState) {
    if state.bands.is_empty() {
        ui.label("No bandpasses yet.");
        return;
    }
    let mut remove = None;
    for (idx, entry) in state.bands.iter_mut().enumerate() {
        let color = state.color_map.color_for(&entry.label);
        ui.horizontal(|ui: &mut Ui| {
            ui.checkbox(&mut entry.visible, "");
            let selected = state.selected_band == Some(idx);
            if ui
                .selectable_label(selected, RichText::new(&entry.label).color(color))
                .clicked()
            {
                state.selected_band = Some(idx);
            }
            if ui.small_button("✖").clicked() {
                remove = Some(idx);
            }
        });
    }
    if let Some(idx) = remove {
        state.remove_band(idx);
    }
}

fn number(ui: &mut Ui, label: &str, value: &mut f64, speed: f64) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        ui.add(DragValue::new(value).speed(speed));
    });
}

fn source_form(ui: &mut Ui, state: &mut AppState) {
    let wave = state.waveunits;
    let builder = &mut state.source_builder;
    egui::ComboBox::from_id_salt("source_kind")
        .selected_text(builder.kind.label())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in SourceKind::ALL {
                ui.selectable_value(&mut builder.kind, kind, kind.label());
            }
        });
    match builder.kind {
        SourceKind::Blackbody => number(ui, "T [K]", &mut builder.temperature, 10.0),
        SourceKind::Flat => number(ui, "Value", &mut builder.value, 1e-17),
        SourceKind::PowerLaw => {
            number(ui, &format!("Reference [{wave}]"), &mut builder.reference, 1.0);
            number(ui, "Index", &mut builder.index, 0.05);
        }
        SourceKind::GaussianLine => {
            number(ui, "Line flux", &mut builder.value, 1e-17);
            number(ui, &format!("Centre [{wave}]"), &mut builder.center, 1.0);
            number(ui, &format!("FWHM [{wave}]"), &mut builder.fwhm, 0.5);
        }
    }
    number(ui, "Redshift", &mut builder.redshift, 0.001);

    ui.horizontal(|ui: &mut Ui| {
        let mut renorm = builder.renorm.is_some();
        ui.checkbox(&mut renorm, "Renormalise to");
        match (renorm, builder.renorm) {
            (true, None) => builder.renorm = Some(0.0),
            (false, Some(_)) => builder.renorm = None,
            _ => {}
        }
        if let Some(target) = &mut builder.renorm {
            ui.add(DragValue::new(target).speed(0.01));
            ui.label(state.fluxunits.to_string());
        }
    });

    if ui.button("Add source").clicked() {
        report(state, AppState::build_source);
    }
}

fn band_form(ui: &mut Ui, state: &mut AppState) {
    let wave = state.waveunits;
    let builder = &mut state.band_builder;
    egui::ComboBox::from_id_salt("band_kind")
        .selected_text(builder.kind.label())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in BandKind::ALL {
                ui.selectable_value(&mut builder.kind, kind, kind.label());
            }
        });
    match builder.kind {
        BandKind::Box | BandKind::Gaussian => {
            number(ui, &format!("Centre [{wave}]"), &mut builder.center, 1.0);
            let width = if builder.kind == BandKind::Box { "Width" } else { "FWHM" };
            number(ui, &format!("{width} [{wave}]"), &mut builder.width, 1.0);
        }
        BandKind::Uniform => number(ui, "Throughput", &mut builder.value, 0.01),
    }
    if ui.button("Add bandpass").clicked() {
        report(state, AppState::build_band);
    }
}

fn observe_controls(ui: &mut Ui, state: &mut AppState) {
    let force_label = |force: Option<Force>| match force {
        None => "require overlap".to_string(),
        Some(f) => f.to_string(),
    };
    egui::ComboBox::from_id_salt("force")
        .selected_text(force_label(state.force))
        .show_ui(ui, |ui: &mut Ui| {
            for force in [None, Some(Force::Taper), Some(Force::Extrapolate)] {
                ui.selectable_value(&mut state.force, force, force_label(force));
            }
        });
    let ready = state.selected_source.is_some() && state.selected_band.is_some();
    if ui.add_enabled(ready, egui::Button::new("Observe")).clicked() {
        report(state, AppState::observe);
    }
}

/// Run a state action, surfacing its error in the status line.
fn report(state: &mut AppState, action: fn(&mut AppState) -> anyhow::Result<()>) {
    match action(state) {
        Ok(()) => state.status_message = None,
        Err(e) => {
            log::error!("{e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Export source…").clicked() {
                save_file_dialog(state, false);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.observation.is_some(), egui::Button::new("Export observation…"))
                .clicked()
            {
                save_file_dialog(state, true);
                ui.close_menu();
            }
        });

        ui.separator();

        let (mut waveunits, mut fluxunits) = (state.waveunits, state.fluxunits);
        egui::ComboBox::from_id_salt("waveunits")
            .selected_text(waveunits.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for unit in WaveUnit::ALL {
                    ui.selectable_value(&mut waveunits, unit, unit.to_string());
                }
            });
        egui::ComboBox::from_id_salt("fluxunits")
            .selected_text(fluxunits.to_string())
            .show_ui(ui, |ui: &mut Ui| {
                for unit in FluxUnit::ALL {
                    ui.selectable_value(&mut fluxunits, unit, unit.to_string());
                }
            });
        if (waveunits, fluxunits) != (state.waveunits, state.fluxunits) {
            state.set_units(waveunits, fluxunits);
        }

        ui.separator();

        if ui
            .add_enabled(
                !state.fluxunits.is_magnitude(),
                egui::SelectableLabel::new(state.log_scale, "Log flux"),
            )
            .clicked()
        {
            state.log_scale = !state.log_scale;
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

const EXTENSIONS: [&str; 6] = ["fits", "fit", "parquet", "pq", "json", "csv"];

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open spectrum or bandpass")
        .add_filter("Supported files", &EXTENSIONS)
        .add_filter("FITS", &["fits", "fit"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        match state.load_path(&path) {
            Ok(()) => {
                log::info!("Loaded {}", path.display());
                state.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

pub fn save_file_dialog(state: &mut AppState, observed: bool) {
    let file = rfd::FileDialog::new()
        .set_title(if observed { "Export observation" } else { "Export source" })
        .add_filter("Supported files", &EXTENSIONS)
        .set_file_name("spectrum.fits")
        .save_file();

    if let Some(path) = file {
        if let Err(e) = state.export(&path, observed) {
            log::error!("Failed to export: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
