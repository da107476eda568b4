//! Runtime settings: collecting area, plotting grid and default units.
//!
//! Settings are read from the JSON file named by `RUSTY_SYNPHOT_CONFIG`;
//! missing keys take their defaults.
//!
//! ```json
//! {
//!   "area": 45238.93416,
//!   "waveset": { "min": 500.0, "max": 26000.0, "points": 10000 },
//!   "waveunits": "nanometer",
//!   "fluxunits": "flam"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynphotError};
use crate::synth::math::{self, DEFAULT_WAVESET_MAX, DEFAULT_WAVESET_MIN, DEFAULT_WAVESET_POINTS};
use crate::synth::units::PRIMARY_AREA;
use crate::synth::{FluxUnit, WaveUnit};

/// Environment variable holding the settings path.
pub const CONFIG_ENV: &str = "RUSTY_SYNPHOT_CONFIG";

/// Log-spaced viewer grid (Angstrom) on which models without a waveset of
/// their own are plotted and exported.
///
/// Photometry does not read it: `wave()`, `effstim` and observation binning
/// fall back to [`math::default_waveset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavesetSettings {
    pub min: f64,
    pub max: f64,
    pub points: usize,
}

impl Default for WavesetSettings {
    fn default() -> Self {
        WavesetSettings {
            min: DEFAULT_WAVESET_MIN,
            max: DEFAULT_WAVESET_MAX,
            points: DEFAULT_WAVESET_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Telescope collecting area, cm^2.
    pub area: f64,
    pub waveset: WavesetSettings,
    /// Display units for new models.
    pub waveunits: WaveUnit,
    pub fluxunits: FluxUnit,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            area: PRIMARY_AREA,
            waveset: WavesetSettings::default(),
            waveunits: WaveUnit::Angstrom,
            fluxunits: FluxUnit::Flam,
        }
    }
}

impl Settings {
    /// Settings from `RUSTY_SYNPHOT_CONFIG`, or the defaults when it is unset
    /// or unreadable.
    pub fn load() -> Self {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            log::debug!("{CONFIG_ENV} not set; using default settings");
            return Self::default();
        };
        match Self::from_path(Path::new(&path)) {
            Ok(settings) => {
                log::info!("loaded settings from {path}");
                settings
            }
            Err(e) => {
                log::warn!("ignoring settings file {path}: {e}");
                Self::default()
            }
        }
    }

    /// Read and validate a settings file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.area.is_finite() && self.area > 0.0) {
            return Err(SynphotError::invalid(format!(
                "collecting area must be positive, got {}",
                self.area
            )));
        }
        let WavesetSettings { min, max, points } = self.waveset;
        if !(min > 0.0 && max > min && max.is_finite()) {
            return Err(SynphotError::invalid(format!(
                "waveset range must satisfy 0 < min < max, got {min}..{max}"
            )));
        }
        if points < 2 {
            return Err(SynphotError::invalid("waveset needs at least two points"));
        }
        Ok(())
    }

    /// The configured plotting grid, Angstrom.
    pub fn grid(&self) -> Vec<f64> {
        math::log_space(self.waveset.min, self.waveset.max, self.waveset.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"area": 100.0, "fluxunits": "abmag"}"#).unwrap();
        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.area, 100.0);
        assert_eq!(settings.fluxunits, FluxUnit::AbMag);
        assert_eq!(settings.waveunits, WaveUnit::Angstrom);
        assert_eq!(settings.waveset, WavesetSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            waveunits: WaveUnit::Micron,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::from_path(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_area = Settings {
            area: -1.0,
            ..Settings::default()
        };
        assert!(bad_area.validate().is_err());

        let mut bad_range = Settings::default();
        bad_range.waveset.max = bad_range.waveset.min;
        assert!(bad_range.validate().is_err());

        let mut too_few = Settings::default();
        too_few.waveset.points = 1;
        assert!(too_few.validate().is_err());
    }

    #[test]
    fn test_grid_spans_configured_range() {
        let mut settings = Settings::default();
        settings.waveset = WavesetSettings {
            min: 1000.0,
            max: 10000.0,
            points: 11,
        };
        let grid = settings.grid();
        assert_eq!(grid.len(), 11);
        assert!((grid[0] - 1000.0).abs() < 1e-9);
        assert!((grid[10] - 10000.0).abs() < 1e-6);
        assert!((grid[5] - 10f64.powf(3.5)).abs() < 1e-6);
    }
}
