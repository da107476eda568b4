use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SynphotError};
use crate::synth::{FluxUnit, Observation, SourceSpectrum, SpectralElement, WaveUnit};

// ---------------------------------------------------------------------------
// MetadataValue – a single header keyword value
// ---------------------------------------------------------------------------

/// A dynamically-typed header value (FITS card, extra JSON key, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to interpret the value as an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralTable – a two-column table as stored on disk
// ---------------------------------------------------------------------------

/// What the second column of a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Flux,
    Throughput,
}

impl TableKind {
    /// Canonical column name (FITS `TTYPE` spelling).
    pub fn column_name(self) -> &'static str {
        match self {
            TableKind::Flux => "FLUX",
            TableKind::Throughput => "THROUGHPUT",
        }
    }

    /// Match a column name, case-insensitively.
    pub fn from_column_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "flux" => Some(TableKind::Flux),
            "throughput" => Some(TableKind::Throughput),
            _ => None,
        }
    }
}

/// Whether a column name denotes the wavelength axis.
pub fn is_wave_column(name: &str) -> bool {
    matches!(
        name.trim().to_ascii_lowercase().as_str(),
        "wave" | "wavelength"
    )
}

/// Raw wavelength / value columns plus whatever units the file declared.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTable {
    pub wave: Vec<f64>,
    pub values: Vec<f64>,
    pub kind: TableKind,
    /// `None` when the file did not declare a wavelength unit.
    pub waveunits: Option<WaveUnit>,
    /// `None` when the file did not declare a flux unit (always `None` for throughput).
    pub fluxunits: Option<FluxUnit>,
    pub name: Option<String>,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl SpectralTable {
    fn new(kind: TableKind, wave: Vec<f64>, values: Vec<f64>) -> Self {
        SpectralTable {
            wave,
            values,
            kind,
            waveunits: None,
            fluxunits: None,
            name: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Table of a spectrum on its own grid, in its display units.
    pub fn from_spectrum(spectrum: &SourceSpectrum) -> Self {
        let mut table = Self::new(TableKind::Flux, spectrum.wave(), spectrum.flux());
        table.waveunits = Some(spectrum.waveunits());
        table.fluxunits = Some(spectrum.fluxunits());
        table.name = spectrum.name().map(str::to_string);
        table
    }

    /// Throughput table of a bandpass on its own grid.
    pub fn from_bandpass(band: &SpectralElement) -> Self {
        let mut table = Self::new(TableKind::Throughput, band.wave(), band.throughput());
        table.waveunits = Some(band.waveunits());
        table.name = band.name().map(str::to_string);
        table
    }

    /// Observed flux, either binned or on the native waveset.
    pub fn from_observation(obs: &Observation, binned: bool) -> Self {
        let (wave, flux) = if binned {
            (obs.binwave(), obs.binflux())
        } else {
            (obs.wave(), obs.flux())
        };
        let mut table = Self::new(TableKind::Flux, wave, flux);
        table.waveunits = Some(obs.waveunits());
        table.fluxunits = Some(obs.fluxunits());
        table.name = Some(obs.to_string());
        table
    }

    pub fn len(&self) -> usize {
        self.wave.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }

    /// Drop leading and trailing rows whose value is zero.
    pub fn trim_zeros(&mut self) {
        let Some(first) = self.values.iter().position(|&v| v != 0.0) else {
            self.wave.clear();
            self.values.clear();
            return;
        };
        let last = self.values.iter().rposition(|&v| v != 0.0).unwrap_or(first);
        self.wave = self.wave[first..=last].to_vec();
        self.values = self.values[first..=last].to_vec();
    }

    /// Build a source spectrum, defaulting undeclared units.
    ///
    /// A missing wavelength unit means Angstrom, a missing flux unit means
    /// flam; both defaults are logged.
    pub fn into_spectrum(self) -> Result<SourceSpectrum> {
        if self.kind != TableKind::Flux {
            return Err(SynphotError::invalid("table holds throughput, not flux"));
        }
        let waveunits = self.waveunits.unwrap_or_else(|| {
            log::warn!("no wavelength unit declared; assuming angstrom");
            WaveUnit::Angstrom
        });
        let fluxunits = self.fluxunits.unwrap_or_else(|| {
            log::warn!("no flux unit declared; assuming flam");
            FluxUnit::Flam
        });
        let spectrum = SourceSpectrum::tabular(self.wave, self.values, waveunits, fluxunits)?;
        Ok(match self.name {
            Some(name) => spectrum.with_name(name),
            None => spectrum,
        })
    }

    /// Build a bandpass, defaulting an undeclared wavelength unit to Angstrom.
    pub fn into_bandpass(self) -> Result<SpectralElement> {
        if self.kind != TableKind::Throughput {
            return Err(SynphotError::invalid("table holds flux, not throughput"));
        }
        let waveunits = self.waveunits.unwrap_or_else(|| {
            log::warn!("no wavelength unit declared; assuming angstrom");
            WaveUnit::Angstrom
        });
        let band = SpectralElement::tabular(self.wave, self.values, waveunits)?;
        Ok(match self.name {
            Some(name) => band.with_name(name),
            None => band,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flux_table(values: Vec<f64>) -> SpectralTable {
        let wave = (0..values.len()).map(|i| 1000.0 + i as f64).collect();
        SpectralTable::new(TableKind::Flux, wave, values)
    }

    #[test]
    fn test_trim_zeros() {
        let mut table = flux_table(vec![0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
        table.trim_zeros();
        assert_eq!(table.values, vec![1.0, 0.0, 2.0]);
        assert_eq!(table.wave, vec![1002.0, 1003.0, 1004.0]);

        let mut empty = flux_table(vec![0.0, 0.0]);
        empty.trim_zeros();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_into_spectrum_defaults_to_angstrom_flam() {
        let sp = flux_table(vec![1e-15, 2e-15]).into_spectrum().unwrap();
        assert_eq!(sp.waveunits(), WaveUnit::Angstrom);
        assert_eq!(sp.fluxunits(), FluxUnit::Flam);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        assert!(flux_table(vec![1.0, 1.0]).into_bandpass().is_err());
    }

    #[test]
    fn test_spectrum_round_trip_keeps_units_and_name() {
        let sp = SourceSpectrum::tabular(
            vec![400.0, 500.0],
            vec![1.0, 2.0],
            WaveUnit::Nanometer,
            FluxUnit::Photlam,
        )
        .unwrap()
        .with_name("pair");
        let table = SpectralTable::from_spectrum(&sp);
        assert_eq!(table.waveunits, Some(WaveUnit::Nanometer));
        assert_eq!(table.values, vec![1.0, 2.0]);
        let back = table.into_spectrum().unwrap();
        assert_eq!(back.name(), Some("pair"));
        assert_eq!(back.flux(), sp.flux());
    }

    #[test]
    fn test_column_names() {
        assert_eq!(TableKind::from_column_name("Flux"), Some(TableKind::Flux));
        assert_eq!(TableKind::from_column_name("THROUGHPUT"), Some(TableKind::Throughput));
        assert!(is_wave_column("WAVELENGTH"));
        assert!(!is_wave_column("freq"));
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(MetadataValue::Float(1.23456).to_string(), "1.2346");
        assert_eq!(MetadataValue::Null.to_string(), "<null>");
        assert_eq!(MetadataValue::Integer(3).as_f64(), Some(3.0));
    }
}
