use std::path::Path;

use anyhow::{Context, Result};
use rusty_synphot::data::loader;
use rusty_synphot::data::model::{SpectralTable, TableKind};
use rusty_synphot::{
    FluxUnit, Force, Observation, Settings, SourceSpectrum, SpectralElement, WaveUnit,
};

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Model builders (form state for the side panel)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Blackbody,
    Flat,
    PowerLaw,
    GaussianLine,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Blackbody,
        SourceKind::Flat,
        SourceKind::PowerLaw,
        SourceKind::GaussianLine,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Blackbody => "Blackbody",
            SourceKind::Flat => "Flat",
            SourceKind::PowerLaw => "Power law",
            SourceKind::GaussianLine => "Gaussian line",
        }
    }
}

/// Parameters for a new analytic source. Wavelengths are in the display unit.
#[derive(Debug, Clone)]
pub struct SourceBuilder {
    pub kind: SourceKind,
    pub temperature: f64,
    pub value: f64,
    pub reference: f64,
    pub index: f64,
    pub center: f64,
    pub fwhm: f64,
    pub redshift: f64,
    /// Target effstim in the display flux unit through the selected band.
    pub renorm: Option<f64>,
}

impl Default for SourceBuilder {
    fn default() -> Self {
        SourceBuilder {
            kind: SourceKind::Blackbody,
            temperature: 5800.0,
            value: 1e-15,
            reference: 5500.0,
            index: -2.0,
            center: 6563.0,
            fwhm: 10.0,
            redshift: 0.0,
            renorm: None,
        }
    }
}

impl SourceBuilder {
    pub fn build(&self, waveunits: WaveUnit, fluxunits: FluxUnit) -> Result<SourceSpectrum> {
        let (spectrum, name) = match self.kind {
            SourceKind::Blackbody => (
                SourceSpectrum::blackbody(self.temperature),
                format!("bb({:.0} K)", self.temperature),
            ),
            SourceKind::Flat => (
                SourceSpectrum::flat(self.value, fluxunits),
                format!("flat({:.3e} {fluxunits})", self.value),
            ),
            SourceKind::PowerLaw => (
                SourceSpectrum::power_law(self.reference, self.index, waveunits, fluxunits),
                format!("pl({})", self.index),
            ),
            SourceKind::GaussianLine => (
                SourceSpectrum::gaussian(self.value, self.center, self.fwhm, waveunits, fluxunits),
                format!("line({} {waveunits})", self.center),
            ),
        };
        let spectrum = spectrum.context("building source")?;
        let mut spectrum = if self.redshift != 0.0 {
            spectrum
                .redshift(self.redshift)
                .context("applying redshift")?
                .with_name(format!("{name} z={}", self.redshift))
        } else {
            spectrum.with_name(name)
        };
        spectrum.convert_wave(waveunits);
        spectrum.convert_flux(fluxunits);
        Ok(spectrum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    Box,
    Gaussian,
    Uniform,
}

impl BandKind {
    pub const ALL: [BandKind; 3] = [BandKind::Box, BandKind::Gaussian, BandKind::Uniform];

    pub fn label(self) -> &'static str {
        match self {
            BandKind::Box => "Box",
            BandKind::Gaussian => "Gaussian",
            BandKind::Uniform => "Uniform",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BandBuilder {
    pub kind: BandKind,
    pub center: f64,
    pub width: f64,
    pub value: f64,
}

impl Default for BandBuilder {
    fn default() -> Self {
        BandBuilder {
            kind: BandKind::Box,
            center: 5500.0,
            width: 880.0,
            value: 1.0,
        }
    }
}

impl BandBuilder {
    pub fn build(&self, waveunits: WaveUnit) -> Result<SpectralElement> {
        let band = match self.kind {
            BandKind::Box => SpectralElement::box_filter(self.center, self.width, waveunits)
                .map(|b| b.with_name(format!("box({}, {})", self.center, self.width))),
            BandKind::Gaussian => SpectralElement::gaussian(self.center, self.width, waveunits)
                .map(|b| b.with_name(format!("gauss({}, {})", self.center, self.width))),
            BandKind::Uniform => SpectralElement::uniform(self.value)
                .map(|b| b.with_name(format!("uniform({})", self.value))),
        };
        band.context("building bandpass")
    }
}

// ---------------------------------------------------------------------------
// Loaded / built items
// ---------------------------------------------------------------------------

pub struct SourceEntry {
    pub label: String,
    pub spectrum: SourceSpectrum,
    pub visible: bool,
}

pub struct BandEntry {
    pub label: String,
    pub band: SpectralElement,
    pub visible: bool,
}

/// One row of the photometry table.
#[derive(Debug, Clone)]
pub struct Photometry {
    pub source: String,
    pub band: String,
    pub countrate: f64,
    /// Angstrom.
    pub pivot: f64,
    /// Angstrom.
    pub efflam: f64,
    pub effstim: f64,
    pub effstim_unit: FluxUnit,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub settings: Settings,

    pub sources: Vec<SourceEntry>,
    pub bands: Vec<BandEntry>,

    /// Source and bandpass picked for the next observation.
    pub selected_source: Option<usize>,
    pub selected_band: Option<usize>,

    pub source_builder: SourceBuilder,
    pub band_builder: BandBuilder,
    pub force: Option<Force>,

    /// Display units for plots and the photometry table.
    pub waveunits: WaveUnit,
    pub fluxunits: FluxUnit,

    /// Most recent observation, plotted as binned points.
    pub observation: Option<Observation>,
    pub photometry: Vec<Photometry>,

    pub color_map: ColorMap,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Plot the flux axis logarithmically.
    pub log_scale: bool,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            waveunits: settings.waveunits,
            fluxunits: settings.fluxunits,
            settings,
            sources: Vec::new(),
            bands: Vec::new(),
            selected_source: None,
            selected_band: None,
            source_builder: SourceBuilder::default(),
            band_builder: BandBuilder::default(),
            force: None,
            observation: None,
            photometry: Vec::new(),
            color_map: ColorMap::default(),
            status_message: None,
            log_scale: false,
        }
    }

    fn unique_label(&self, base: &str) -> String {
        let taken = |label: &str| {
            self.sources.iter().any(|s| s.label == label)
                || self.bands.iter().any(|b| b.label == label)
        };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base} #{n}"))
            .find(|label| !taken(label))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn add_source(&mut self, mut spectrum: SourceSpectrum) {
        spectrum.convert_wave(self.waveunits);
        spectrum.convert_flux(self.fluxunits);
        let label = self.unique_label(&spectrum.to_string());
        self.sources.push(SourceEntry {
            label,
            spectrum,
            visible: true,
        });
        self.selected_source = Some(self.sources.len() - 1);
        self.rebuild_color_map();
    }

    pub fn add_band(&mut self, mut band: SpectralElement) {
        band.convert_wave(self.waveunits);
        let label = self.unique_label(&band.to_string());
        self.bands.push(BandEntry {
            label,
            band,
            visible: true,
        });
        self.selected_band = Some(self.bands.len() - 1);
        self.rebuild_color_map();
    }

    pub fn remove_source(&mut self, idx: usize) {
        if idx < self.sources.len() {
            self.sources.remove(idx);
            self.selected_source = None;
            self.rebuild_color_map();
        }
    }

    pub fn remove_band(&mut self, idx: usize) {
        if idx < self.bands.len() {
            self.bands.remove(idx);
            self.selected_band = None;
            self.rebuild_color_map();
        }
    }

    pub fn rebuild_color_map(&mut self) {
        self.color_map = ColorMap::new(
            self.sources.iter().map(|s| s.label.as_str()),
            self.bands.iter().map(|b| b.label.as_str()),
        );
    }

    /// Build a source from the builder, renormalising through the selected
    /// band when a target is set.
    pub fn build_source(&mut self) -> Result<()> {
        let mut spectrum = self.source_builder.build(self.waveunits, self.fluxunits)?;
        if let Some(target) = self.source_builder.renorm {
            let band = self
                .selected_band()
                .context("renormalisation needs a selected bandpass")?;
            let name = spectrum.to_string();
            spectrum = spectrum
                .renorm(target, self.fluxunits, &band.band)
                .context("renormalising source")?
                .with_name(format!("{name} = {target} {}", self.fluxunits));
        }
        self.add_source(spectrum);
        Ok(())
    }

    pub fn build_band(&mut self) -> Result<()> {
        let band = self.band_builder.build(self.waveunits)?;
        self.add_band(band);
        Ok(())
    }

    /// Load a file as a source spectrum, or as a bandpass when it holds throughput.
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let mut table = loader::load_table(path)?;
        if table.name.is_none() {
            table.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string);
        }
        match table.kind {
            TableKind::Flux => {
                let spectrum = table
                    .into_spectrum()
                    .with_context(|| format!("building spectrum from {}", path.display()))?;
                self.add_source(spectrum);
            }
            TableKind::Throughput => {
                let band = table
                    .into_bandpass()
                    .with_context(|| format!("building bandpass from {}", path.display()))?;
                self.add_band(band);
            }
        }
        Ok(())
    }

    pub fn selected_source(&self) -> Option<&SourceEntry> {
        self.selected_source.and_then(|i| self.sources.get(i))
    }

    pub fn selected_band(&self) -> Option<&BandEntry> {
        self.selected_band.and_then(|i| self.bands.get(i))
    }

    /// Observe the selected source through the selected band and record its photometry.
    pub fn observe(&mut self) -> Result<()> {
        let source = self.selected_source().context("no source selected")?;
        let band = self.selected_band().context("no bandpass selected")?;
        let mut obs = Observation::new(source.spectrum.clone(), band.band.clone(), None, self.force)
            .with_context(|| format!("observing {} through {}", source.label, band.label))?;
        obs.convert_wave(self.waveunits);
        obs.convert_flux(self.fluxunits);

        let area = Some(self.settings.area);
        let row = Photometry {
            source: source.label.clone(),
            band: band.label.clone(),
            countrate: obs.countrate(true, area),
            pivot: obs.pivot(),
            efflam: obs.efflam(),
            effstim: obs.effstim(self.fluxunits, area)?,
            effstim_unit: self.fluxunits,
        };
        log::info!(
            "{} through {}: {:.4e} counts/s, effstim {:.4e} {}",
            row.source,
            row.band,
            row.countrate,
            row.effstim,
            row.effstim_unit
        );
        self.photometry.push(row);
        self.observation = Some(obs);
        Ok(())
    }

    /// Switch display units on every item.
    pub fn set_units(&mut self, waveunits: WaveUnit, fluxunits: FluxUnit) {
        self.waveunits = waveunits;
        self.fluxunits = fluxunits;
        for entry in &mut self.sources {
            entry.spectrum.convert_wave(waveunits);
            entry.spectrum.convert_flux(fluxunits);
        }
        for entry in &mut self.bands {
            entry.band.convert_wave(waveunits);
        }
        if let Some(obs) = &mut self.observation {
            obs.convert_wave(waveunits);
            obs.convert_flux(fluxunits);
        }
    }

    /// Curve of a source in display units; analytic models use the configured grid.
    pub fn source_curve(&self, spectrum: &SourceSpectrum) -> (Vec<f64>, Vec<f64>) {
        let grid = spectrum
            .waveset()
            .unwrap_or_else(|| self.settings.grid());
        let wave = self.waveunits.from_angstrom(&grid);
        let flux = spectrum.call(&wave);
        (wave, flux)
    }

    pub fn band_curve(&self, band: &SpectralElement) -> (Vec<f64>, Vec<f64>) {
        let grid = band.waveset().unwrap_or_else(|| self.settings.grid());
        let wave = self.waveunits.from_angstrom(&grid);
        let throughput = band.call(&wave);
        (wave, throughput)
    }

    /// Write the selected source, or the current observation when `observed`.
    pub fn export(&self, path: &Path, observed: bool) -> Result<()> {
        let table = if observed {
            let obs = self.observation.as_ref().context("nothing observed yet")?;
            SpectralTable::from_observation(obs, true)
        } else {
            let source = self.selected_source().context("no source selected")?;
            let mut table = if source.spectrum.is_tabular() {
                SpectralTable::from_spectrum(&source.spectrum)
            } else {
                let grid = source.spectrum.waveunits().from_angstrom(&self.settings.grid());
                let tabulated = source
                    .spectrum
                    .compute(Some(&grid))
                    .context("tabulating source")?;
                SpectralTable::from_spectrum(&tabulated)
            };
            table.name = Some(source.label.clone());
            table
        };
        loader::save_table(path, &table)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let mut state = AppState::default();
        state.settings.waveset.points = 500;
        state
    }

    #[test]
    fn test_labels_are_unique() {
        let mut state = state();
        state.build_source().unwrap();
        state.build_source().unwrap();
        assert_eq!(state.sources.len(), 2);
        assert_ne!(state.sources[0].label, state.sources[1].label);
        assert_eq!(state.selected_source, Some(1));
    }

    #[test]
    fn test_observe_records_photometry() {
        let mut state = state();
        state.build_source().unwrap();
        state.build_band().unwrap();
        state.observe().unwrap();
        let row = &state.photometry[0];
        assert!(row.countrate > 0.0);
        assert!(row.pivot > 5000.0 && row.pivot < 6000.0);
        assert_eq!(row.effstim_unit, FluxUnit::Flam);
    }

    #[test]
    fn test_observe_without_selection_fails() {
        let mut state = state();
        state.build_band().unwrap();
        assert!(state.observe().is_err());
        assert!(state.photometry.is_empty());
    }

    #[test]
    fn test_renorm_through_selected_band() {
        let mut state = state();
        state.build_band().unwrap();
        state.fluxunits = FluxUnit::AbMag;
        state.source_builder.renorm = Some(15.0);
        state.build_source().unwrap();
        let source = &state.sources[0].spectrum;
        let band = &state.bands[0].band;
        let abmag = source.effstim(band, FluxUnit::AbMag).unwrap();
        assert!((abmag - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_units_converts_curves() {
        let mut state = state();
        state.build_band().unwrap();
        let (angstrom, _) = state.band_curve(&state.bands[0].band);
        state.set_units(WaveUnit::Nanometer, FluxUnit::Photlam);
        let (nm, _) = state.band_curve(&state.bands[0].band);
        assert!((angstrom[0] / 10.0 - nm[0]).abs() < 1e-9);
    }

    #[test]
    fn test_export_tabulates_analytic_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bb.csv");
        let mut state = state();
        state.build_source().unwrap();
        state.export(&path, false).unwrap();
        let table = loader::load_table(&path).unwrap();
        assert_eq!(table.len(), 500);
    }

    #[test]
    fn test_export_grid_follows_display_units() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state();
        state.settings.waveset.points = 5;
        state.build_source().unwrap();

        for (unit, name) in [(WaveUnit::Nanometer, "nm.csv"), (WaveUnit::Hertz, "hz.csv")] {
            state.set_units(unit, FluxUnit::Flam);
            let path = dir.path().join(name);
            state.export(&path, false).unwrap();
            let table = loader::load_table(&path).unwrap();
            assert_eq!(table.waveunits, Some(unit));
            let angstrom = unit.to_angstrom(&table.wave);
            let expected = state.settings.grid();
            assert_eq!(angstrom.len(), expected.len());
            let (lo, hi) = if angstrom[0] < angstrom[4] {
                (angstrom[0], angstrom[4])
            } else {
                (angstrom[4], angstrom[0])
            };
            assert!((lo - expected[0]).abs() < 1e-6 * expected[0], "{unit}: {lo}");
            assert!((hi - expected[4]).abs() < 1e-6 * expected[4], "{unit}: {hi}");
        }
    }
}
