use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, Plot, Points};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Flux and throughput plots (central panel)
// ---------------------------------------------------------------------------

/// Pair wavelengths with values, dropping non-finite points.
fn to_points(x: &[f64], y: &[f64], log: bool) -> Vec<[f64; 2]> {
    x.iter()
        .zip(y)
        .filter_map(|(&xi, &yi)| {
            let yi = if log { yi.log10() } else { yi };
            (xi.is_finite() && yi.is_finite()).then_some([xi, yi])
        })
        .collect()
}

/// Render the flux plot above the throughput plot.
pub fn spectral_plot(ui: &mut Ui, state: &AppState) {
    if state.sources.is_empty() && state.bands.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Add a source or bandpass, or open a file  (File → Open…)");
        });
        return;
    }

    let log = state.log_scale && !state.fluxunits.is_magnitude();
    let wave_label = format!("Wavelength [{}]", state.waveunits);
    let flux_label = if log {
        format!("log10 Flux [{}]", state.fluxunits)
    } else {
        format!("Flux [{}]", state.fluxunits)
    };
    let half = (ui.available_height() / 2.0 - 4.0).max(100.0);

    Plot::new("flux_plot")
        .height(half)
        .legend(Legend::default())
        .link_axis("wave_axis", [true, false])
        .x_axis_label(wave_label.clone())
        .y_axis_label(flux_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for entry in state.sources.iter().filter(|e| e.visible) {
                let (wave, flux) = state.source_curve(&entry.spectrum);
                let line = Line::new(to_points(&wave, &flux, log))
                    .name(&entry.label)
                    .color(state.color_map.color_for(&entry.label))
                    .width(1.5);
                plot_ui.line(line);
            }
            if let Some(obs) = &state.observation {
                let points = Points::new(to_points(&obs.binwave(), &obs.binflux(), log))
                    .name(format!("{obs} (binned)"))
                    .color(Color32::WHITE)
                    .radius(2.0);
                plot_ui.points(points);
            }
        });

    ui.separator();

    Plot::new("throughput_plot")
        .height(half)
        .legend(Legend::default())
        .link_axis("wave_axis", [true, false])
        .x_axis_label(wave_label)
        .y_axis_label("Throughput")
        .include_y(0.0)
        .include_y(1.0)
        .show(ui, |plot_ui| {
            for entry in state.bands.iter().filter(|e| e.visible) {
                let (wave, throughput) = state.band_curve(&entry.band);
                let line = Line::new(to_points(&wave, &throughput, false))
                    .name(&entry.label)
                    .color(state.color_map.color_for(&entry.label))
                    .width(1.5);
                plot_ui.line(line);
            }
        });
}
