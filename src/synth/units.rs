//! Wavelength and flux units.
//!
//! Every model stores its data in internal units: Angstrom for wavelength
//! and photlam (photons s^-1 cm^-2 A^-1) for flux density. Units only
//! matter at the edges, when values enter or leave a model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::math;
use crate::error::{Result, SynphotError};

/// Planck constant, erg s.
pub const H: f64 = 6.6262e-27;
/// Speed of light, Angstrom/s.
pub const C: f64 = 2.99792458e18;
/// `H * C`, erg Angstrom.
pub const HC: f64 = H * C;
/// Zero point of the AB magnitude system.
pub const AB_ZERO: f64 = -48.60;
/// Zero point of the ST magnitude system.
pub const ST_ZERO: f64 = -21.10;
/// Default collecting area used for count rates, cm^2.
pub const PRIMARY_AREA: f64 = 45238.93416;

// ---------------------------------------------------------------------------
// WaveUnit
// ---------------------------------------------------------------------------

/// Units accepted for wavelength (or frequency) axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveUnit {
    #[default]
    Angstrom,
    Nanometer,
    Micron,
    Millimeter,
    Centimeter,
    Meter,
    Hertz,
}

impl WaveUnit {
    /// All wavelength units, in display order.
    pub const ALL: [WaveUnit; 7] = [
        WaveUnit::Angstrom,
        WaveUnit::Nanometer,
        WaveUnit::Micron,
        WaveUnit::Millimeter,
        WaveUnit::Centimeter,
        WaveUnit::Meter,
        WaveUnit::Hertz,
    ];

    /// Angstrom per unit, for the linear length units.
    fn angstrom_factor(self) -> Option<f64> {
        match self {
            WaveUnit::Angstrom => Some(1.0),
            WaveUnit::Nanometer => Some(10.0),
            WaveUnit::Micron => Some(1e4),
            WaveUnit::Millimeter => Some(1e7),
            WaveUnit::Centimeter => Some(1e8),
            WaveUnit::Meter => Some(1e10),
            WaveUnit::Hertz => None,
        }
    }

    /// Whether this is a frequency rather than a length.
    pub fn is_frequency(self) -> bool {
        self.angstrom_factor().is_none()
    }

    /// Convert a single value in this unit to Angstrom.
    pub fn value_to_angstrom(self, value: f64) -> f64 {
        match self.angstrom_factor() {
            Some(factor) => value * factor,
            None => C / value,
        }
    }

    /// Convert a single Angstrom value to this unit.
    pub fn value_from_angstrom(self, value: f64) -> f64 {
        match self.angstrom_factor() {
            Some(factor) => value / factor,
            None => C / value,
        }
    }

    /// Convert a wavelength width in this unit to Angstrom.
    ///
    /// Frequency widths are not linear in wavelength and are rejected.
    pub fn width_to_angstrom(self, width: f64) -> Result<f64> {
        self.angstrom_factor()
            .map(|factor| width * factor)
            .ok_or_else(|| SynphotError::invalid(format!("widths cannot be given in {self}")))
    }

    /// Convert values in this unit to Angstrom.
    pub fn to_angstrom(self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.value_to_angstrom(v)).collect()
    }

    /// Convert Angstrom values to this unit.
    pub fn from_angstrom(self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.value_from_angstrom(v)).collect()
    }

    fn lookup(name: &str) -> Option<WaveUnit> {
        let unit = match name.trim().to_ascii_lowercase().as_str() {
            "angstrom" | "angstroms" | "a" | "aa" => WaveUnit::Angstrom,
            "nm" | "nanometer" | "nanometers" => WaveUnit::Nanometer,
            "um" | "micron" | "microns" | "micrometer" | "micrometers" => WaveUnit::Micron,
            "mm" | "millimeter" | "millimeters" => WaveUnit::Millimeter,
            "cm" | "centimeter" | "centimeters" => WaveUnit::Centimeter,
            "m" | "meter" | "meters" => WaveUnit::Meter,
            "hz" | "hertz" => WaveUnit::Hertz,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for WaveUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaveUnit::Angstrom => "angstrom",
            WaveUnit::Nanometer => "nm",
            WaveUnit::Micron => "micron",
            WaveUnit::Millimeter => "mm",
            WaveUnit::Centimeter => "cm",
            WaveUnit::Meter => "m",
            WaveUnit::Hertz => "hz",
        };
        f.write_str(name)
    }
}

impl FromStr for WaveUnit {
    type Err = SynphotError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(unit) = WaveUnit::lookup(s) {
            return Ok(unit);
        }
        if FluxUnit::lookup(s).is_some() {
            return Err(SynphotError::NotAWaveUnit {
                unit: s.trim().to_string(),
            });
        }
        Err(SynphotError::UnknownUnit(s.trim().to_string()))
    }
}

// ---------------------------------------------------------------------------
// FluxUnit
// ---------------------------------------------------------------------------

/// Units accepted for flux values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FluxUnit {
    /// photons s^-1 cm^-2 A^-1 (internal).
    #[default]
    Photlam,
    /// photons s^-1 cm^-2 Hz^-1.
    Photnu,
    /// erg s^-1 cm^-2 A^-1.
    Flam,
    /// erg s^-1 cm^-2 Hz^-1.
    Fnu,
    Jansky,
    MilliJansky,
    AbMag,
    StMag,
    /// Magnitude of the count rate.
    ObMag,
    /// Photons s^-1 per bin over the collecting area.
    Counts,
}

impl FluxUnit {
    /// All flux units, in display order.
    pub const ALL: [FluxUnit; 10] = [
        FluxUnit::Photlam,
        FluxUnit::Photnu,
        FluxUnit::Flam,
        FluxUnit::Fnu,
        FluxUnit::Jansky,
        FluxUnit::MilliJansky,
        FluxUnit::AbMag,
        FluxUnit::StMag,
        FluxUnit::ObMag,
        FluxUnit::Counts,
    ];

    /// Whether values in this unit are magnitudes.
    pub fn is_magnitude(self) -> bool {
        matches!(self, FluxUnit::AbMag | FluxUnit::StMag | FluxUnit::ObMag)
    }

    /// Whether the unit depends on the binning of the wavelength grid.
    pub fn depends_on_binning(self) -> bool {
        matches!(self, FluxUnit::Counts | FluxUnit::ObMag)
    }

    /// Convert photlam values sampled at `wave` (Angstrom) to this unit.
    pub fn from_photlam(self, wave: &[f64], flux: &[f64]) -> Vec<f64> {
        self.from_photlam_with_area(wave, flux, PRIMARY_AREA)
    }

    /// Convert values in this unit sampled at `wave` (Angstrom) to photlam.
    pub fn to_photlam(self, wave: &[f64], flux: &[f64]) -> Vec<f64> {
        self.to_photlam_with_area(wave, flux, PRIMARY_AREA)
    }

    /// [`FluxUnit::from_photlam`] with an explicit collecting area (cm^2).
    pub fn from_photlam_with_area(self, wave: &[f64], flux: &[f64], area: f64) -> Vec<f64> {
        let pairs = wave.iter().zip(flux);
        match self {
            FluxUnit::Photlam => flux.to_vec(),
            FluxUnit::Photnu => pairs.map(|(w, f)| f * w * w / C).collect(),
            FluxUnit::Flam => pairs.map(|(w, f)| f * HC / w).collect(),
            FluxUnit::Fnu => pairs.map(|(w, f)| f * H * w).collect(),
            FluxUnit::Jansky => pairs.map(|(w, f)| f * H * w * 1e23).collect(),
            FluxUnit::MilliJansky => pairs.map(|(w, f)| f * H * w * 1e26).collect(),
            FluxUnit::AbMag => pairs.map(|(w, f)| magnitude(f * H * w) + AB_ZERO).collect(),
            FluxUnit::StMag => pairs.map(|(w, f)| magnitude(f * HC / w) + ST_ZERO).collect(),
            FluxUnit::Counts => math::bin_widths(wave)
                .iter()
                .zip(flux)
                .map(|(dw, f)| f * area * dw)
                .collect(),
            FluxUnit::ObMag => math::bin_widths(wave)
                .iter()
                .zip(flux)
                .map(|(dw, f)| magnitude(f * area * dw))
                .collect(),
        }
    }

    /// [`FluxUnit::to_photlam`] with an explicit collecting area (cm^2).
    pub fn to_photlam_with_area(self, wave: &[f64], flux: &[f64], area: f64) -> Vec<f64> {
        let pairs = wave.iter().zip(flux);
        match self {
            FluxUnit::Photlam => flux.to_vec(),
            FluxUnit::Photnu => pairs.map(|(w, f)| f * C / (w * w)).collect(),
            FluxUnit::Flam => pairs.map(|(w, f)| f * w / HC).collect(),
            FluxUnit::Fnu => pairs.map(|(w, f)| f / (H * w)).collect(),
            FluxUnit::Jansky => pairs.map(|(w, f)| f * 1e-23 / (H * w)).collect(),
            FluxUnit::MilliJansky => pairs.map(|(w, f)| f * 1e-26 / (H * w)).collect(),
            FluxUnit::AbMag => pairs
                .map(|(w, m)| from_magnitude(m - AB_ZERO) / (H * w))
                .collect(),
            FluxUnit::StMag => pairs
                .map(|(w, m)| from_magnitude(m - ST_ZERO) * w / HC)
                .collect(),
            FluxUnit::Counts => math::bin_widths(wave)
                .iter()
                .zip(flux)
                .map(|(dw, f)| f / (area * dw))
                .collect(),
            FluxUnit::ObMag => math::bin_widths(wave)
                .iter()
                .zip(flux)
                .map(|(dw, m)| from_magnitude(*m) / (area * dw))
                .collect(),
        }
    }

    fn lookup(name: &str) -> Option<FluxUnit> {
        let unit = match name.trim().to_ascii_lowercase().as_str() {
            "photlam" => FluxUnit::Photlam,
            "photnu" => FluxUnit::Photnu,
            "flam" | "erg/s/cm**2/a" | "erg/s/cm**2/angstrom" | "erg/s/cm^2/a" => FluxUnit::Flam,
            "fnu" => FluxUnit::Fnu,
            "jy" | "jansky" | "janskys" => FluxUnit::Jansky,
            "mjy" | "millijansky" | "millijanskys" => FluxUnit::MilliJansky,
            "abmag" => FluxUnit::AbMag,
            "stmag" => FluxUnit::StMag,
            "obmag" => FluxUnit::ObMag,
            "counts" | "count" => FluxUnit::Counts,
            _ => return None,
        };
        Some(unit)
    }
}

impl fmt::Display for FluxUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FluxUnit::Photlam => "photlam",
            FluxUnit::Photnu => "photnu",
            FluxUnit::Flam => "flam",
            FluxUnit::Fnu => "fnu",
            FluxUnit::Jansky => "jy",
            FluxUnit::MilliJansky => "mjy",
            FluxUnit::AbMag => "abmag",
            FluxUnit::StMag => "stmag",
            FluxUnit::ObMag => "obmag",
            FluxUnit::Counts => "counts",
        };
        f.write_str(name)
    }
}

impl FromStr for FluxUnit {
    type Err = SynphotError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(unit) = FluxUnit::lookup(s) {
            return Ok(unit);
        }
        if WaveUnit::lookup(s).is_some() {
            return Err(SynphotError::NotAFluxUnit {
                unit: s.trim().to_string(),
            });
        }
        Err(SynphotError::UnknownUnit(s.trim().to_string()))
    }
}

/// Parse a wavelength unit, rejecting flux units with [`SynphotError::NotAWaveUnit`].
pub fn parse_wave_unit(name: &str) -> Result<WaveUnit> {
    name.parse()
}

/// Parse a flux unit, rejecting wavelength units with [`SynphotError::NotAFluxUnit`].
pub fn parse_flux_unit(name: &str) -> Result<FluxUnit> {
    name.parse()
}

/// `-2.5 log10(x)`; non-positive values map to `+inf`.
pub fn magnitude(x: f64) -> f64 {
    if x > 0.0 {
        -2.5 * x.log10()
    } else {
        f64::INFINITY
    }
}

/// Inverse of [`magnitude`].
pub fn from_magnitude(m: f64) -> f64 {
    10f64.powf(-0.4 * m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1e-300)
    }

    #[test]
    fn test_parse_aliases_case_insensitively() {
        assert_eq!(parse_wave_unit("ANGSTROMS").unwrap(), WaveUnit::Angstrom);
        assert_eq!(parse_wave_unit(" um ").unwrap(), WaveUnit::Micron);
        assert_eq!(parse_flux_unit("FLAM").unwrap(), FluxUnit::Flam);
        assert_eq!(parse_flux_unit("mJy").unwrap(), FluxUnit::MilliJansky);
        assert_eq!(parse_flux_unit("erg/s/cm**2/A").unwrap(), FluxUnit::Flam);
    }

    #[test]
    fn test_flux_unit_is_not_a_wave_unit() {
        let err = parse_wave_unit("photlam").unwrap_err();
        assert!(matches!(err, SynphotError::NotAWaveUnit { .. }));
        let err = parse_flux_unit("nm").unwrap_err();
        assert!(matches!(err, SynphotError::NotAFluxUnit { .. }));
        let err = parse_wave_unit("furlong").unwrap_err();
        assert!(matches!(err, SynphotError::UnknownUnit(_)));
    }

    #[test]
    fn test_display_parses_back() {
        for unit in WaveUnit::ALL {
            assert_eq!(unit.to_string().parse::<WaveUnit>().unwrap(), unit);
        }
        for unit in FluxUnit::ALL {
            assert_eq!(unit.to_string().parse::<FluxUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_wave_conversions() {
        assert_eq!(WaveUnit::Nanometer.to_angstrom(&[500.0]), vec![5000.0]);
        assert_eq!(WaveUnit::Micron.value_to_angstrom(1.5), 15000.0);
        let hz = WaveUnit::Hertz.from_angstrom(&[5000.0, 6000.0]);
        assert!(hz[0] > hz[1], "frequency order reverses");
        assert!(close(WaveUnit::Hertz.value_to_angstrom(hz[0]), 5000.0));
        assert!(WaveUnit::Hertz.width_to_angstrom(1.0).is_err());
    }

    #[test]
    fn test_flam_photlam_relation() {
        let wave = [5000.0];
        let flam = FluxUnit::Flam.from_photlam(&wave, &[1.0]);
        assert!(close(flam[0], HC / 5000.0));
        let back = FluxUnit::Flam.to_photlam(&wave, &flam);
        assert!(close(back[0], 1.0));
    }

    #[test]
    fn test_abmag_zero_point() {
        // fnu = 10^(-0.4 * 48.6) is the AB zero-magnitude flux.
        let wave = [5500.0];
        let fnu_zero = 10f64.powf(-0.4 * 48.60);
        let photlam = FluxUnit::Fnu.to_photlam(&wave, &[fnu_zero]);
        let ab = FluxUnit::AbMag.from_photlam(&wave, &photlam);
        assert!(ab[0].abs() < 1e-9);
        let back = FluxUnit::AbMag.to_photlam(&wave, &ab);
        assert!(close(back[0], photlam[0]));
    }

    #[test]
    fn test_counts_use_bin_width_and_area() {
        let wave = [1000.0, 1002.0, 1004.0];
        let counts = FluxUnit::Counts.from_photlam_with_area(&wave, &[1.0, 1.0, 1.0], 10.0);
        assert_eq!(counts, vec![20.0, 20.0, 20.0]);
        let back = FluxUnit::Counts.to_photlam_with_area(&wave, &counts, 10.0);
        assert_eq!(back, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_magnitude_of_zero_is_infinite() {
        assert_eq!(magnitude(0.0), f64::INFINITY);
        assert_eq!(from_magnitude(f64::INFINITY), 0.0);
        let st = FluxUnit::StMag.from_photlam(&[5000.0], &[0.0]);
        assert!(st[0].is_infinite());
    }

    #[test]
    fn test_units_serialize_lowercase() {
        let json = serde_json::to_string(&FluxUnit::AbMag).unwrap();
        assert_eq!(json, "\"abmag\"");
        let unit: WaveUnit = serde_json::from_str("\"micron\"").unwrap();
        assert_eq!(unit, WaveUnit::Micron);
    }
}
