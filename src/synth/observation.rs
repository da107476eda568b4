use std::fmt;
use std::str::FromStr;

use super::bandpass::SpectralElement;
use super::math;
use super::source::{Overlap, SourceSpectrum};
use super::units::{FluxUnit, WaveUnit, PRIMARY_AREA};
use crate::error::{Result, SynphotError};

// ---------------------------------------------------------------------------
// Force – what to do when spectrum and bandpass only partly overlap
// ---------------------------------------------------------------------------

/// Override for the full-overlap requirement of an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Force {
    /// Taper the spectrum to zero just outside its waveset.
    Taper,
    /// Use the spectrum as it is; it reads zero outside its table.
    Extrapolate,
}

impl FromStr for Force {
    type Err = SynphotError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "taper" {
            Ok(Force::Taper)
        } else if lower.starts_with("extrap") {
            Ok(Force::Extrapolate)
        } else {
            Err(SynphotError::IllegalForce(s.to_string()))
        }
    }
}

impl fmt::Display for Force {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Force::Taper => f.write_str("taper"),
            Force::Extrapolate => f.write_str("extrap"),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A source seen through a bandpass, binned onto a detector wavelength grid.
///
/// An observation ends a chain of spectral manipulation: unlike
/// [`SourceSpectrum`] it cannot be added, multiplied or redshifted.
#[derive(Debug, Clone)]
pub struct Observation {
    spectrum: SourceSpectrum,
    bandpass: SpectralElement,
    product: SourceSpectrum,
    /// Bin centres, Angstrom.
    binwave: Vec<f64>,
    /// Mean photlam in each bin.
    binflux: Vec<f64>,
}

impl Observation {
    /// Observe `spectrum` through `bandpass`.
    ///
    /// `binset` (Angstrom) overrides the bandpass binset; without either the
    /// spectrum's own wavelength grid is used. Without `force` the spectrum
    /// must cover the whole passband.
    pub fn new(
        spectrum: SourceSpectrum,
        bandpass: SpectralElement,
        binset: Option<Vec<f64>>,
        force: Option<Force>,
    ) -> Result<Self> {
        let spectrum = validate_overlap(spectrum, &bandpass, force)?;
        let product = spectrum.clone() * bandpass.clone();
        let binwave = choose_binset(binset, &spectrum, &bandpass)?;
        let binflux = bin_flux(&product, &binwave);
        log::debug!(
            "observed {spectrum} through {bandpass} on {} bins",
            binwave.len()
        );
        Ok(Observation {
            spectrum,
            bandpass,
            product,
            binwave,
            binflux,
        })
    }

    /// The (possibly tapered) source spectrum.
    pub fn spectrum(&self) -> &SourceSpectrum {
        &self.spectrum
    }

    pub fn bandpass(&self) -> &SpectralElement {
        &self.bandpass
    }

    pub fn waveunits(&self) -> WaveUnit {
        self.product.waveunits()
    }

    pub fn fluxunits(&self) -> FluxUnit {
        self.product.fluxunits()
    }

    pub fn convert_wave(&mut self, unit: WaveUnit) {
        self.product.convert_wave(unit);
    }

    pub fn convert_flux(&mut self, unit: FluxUnit) {
        self.product.convert_flux(unit);
    }

    /// Photlam of spectrum x bandpass at Angstrom wavelengths.
    pub fn sample(&self, wave: &[f64]) -> Vec<f64> {
        self.product.sample(wave)
    }

    /// Flux in display units at wavelengths in display units.
    pub fn call(&self, wave: &[f64]) -> Vec<f64> {
        self.product.call(wave)
    }

    /// Natural waveset of spectrum and bandpass merged, Angstrom.
    pub fn waveset(&self) -> Option<Vec<f64>> {
        self.product.waveset()
    }

    pub fn wave(&self) -> Vec<f64> {
        self.product.wave()
    }

    pub fn flux(&self) -> Vec<f64> {
        self.product.flux()
    }

    /// Bin centres in Angstrom.
    pub fn binwave_angstrom(&self) -> &[f64] {
        &self.binwave
    }

    /// Bin centres in display units.
    pub fn binwave(&self) -> Vec<f64> {
        self.waveunits().from_angstrom(&self.binwave)
    }

    /// Binned flux in photlam.
    pub fn binflux_photlam(&self) -> &[f64] {
        &self.binflux
    }

    /// Binned flux in display units.
    pub fn binflux(&self) -> Vec<f64> {
        self.fluxunits().from_photlam(&self.binwave, &self.binflux)
    }

    /// Total count rate (counts/s) over the collecting `area` (cm^2).
    pub fn countrate(&self, binned: bool, area: Option<f64>) -> f64 {
        let area = area.unwrap_or(PRIMARY_AREA);
        let counts = if binned {
            FluxUnit::Counts.from_photlam_with_area(&self.binwave, &self.binflux, area)
        } else {
            let wave = self.product.wave_angstrom();
            let flux = self.product.sample(&wave);
            FluxUnit::Counts.from_photlam_with_area(&wave, &flux, area)
        };
        counts.iter().sum()
    }

    /// Pivot wavelength of the observed flux over the native waveset, Angstrom.
    pub fn pivot(&self) -> f64 {
        let wave = self.product.wave_angstrom();
        let flux = self.product.sample(&wave);
        let times_wave = math::multiply(&flux, &wave);
        let over_wave: Vec<f64> = flux.iter().zip(&wave).map(|(f, w)| f / w).collect();
        let num = math::trapezoid(&wave, &times_wave);
        let den = math::trapezoid(&wave, &over_wave);
        if num == 0.0 || den == 0.0 {
            return 0.0;
        }
        (num / den).sqrt()
    }

    /// Effective wavelength of the binned flam flux, Angstrom.
    pub fn efflam(&self) -> f64 {
        let wave = &self.binwave;
        let flam = FluxUnit::Flam.from_photlam(wave, &self.binflux);
        let times_wave = math::multiply(&flam, wave);
        let times_wave_sq = math::multiply(&times_wave, wave);
        let num = math::trapezoid(wave, &times_wave_sq);
        let den = math::trapezoid(wave, &times_wave);
        if num == 0.0 || den == 0.0 {
            return 0.0;
        }
        num / den
    }

    /// Effective stimulus of the spectrum through the bandpass.
    pub fn effstim(&self, unit: FluxUnit, area: Option<f64>) -> Result<f64> {
        self.spectrum
            .effstim_with_area(&self.bandpass, unit, area.unwrap_or(PRIMARY_AREA))
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} through {}", self.spectrum, self.bandpass)
    }
}

fn validate_overlap(
    spectrum: SourceSpectrum,
    bandpass: &SpectralElement,
    force: Option<Force>,
) -> Result<SourceSpectrum> {
    match force {
        None => match spectrum.check_overlap(bandpass) {
            Overlap::Full => Ok(spectrum),
            Overlap::Partial => Err(SynphotError::PartialOverlap),
            Overlap::Disjoint => Err(SynphotError::DisjointOverlap),
        },
        Some(Force::Taper) => spectrum.taper(),
        Some(Force::Extrapolate) => Ok(spectrum),
    }
}

fn choose_binset(
    binset: Option<Vec<f64>>,
    spectrum: &SourceSpectrum,
    bandpass: &SpectralElement,
) -> Result<Vec<f64>> {
    let binwave = match (binset, bandpass.binset()) {
        (Some(binset), _) => binset,
        (None, Some(binset)) => binset.to_vec(),
        (None, None) => {
            log::info!(
                "{bandpass} does not define a binset; using the waveset of {spectrum} instead"
            );
            spectrum.wave_angstrom()
        }
    };
    if binwave.len() < 2 || !math::is_strictly_increasing(&binwave) {
        return Err(SynphotError::invalid(
            "binset needs at least two strictly increasing wavelengths",
        ));
    }
    Ok(binwave)
}

/// Average photlam of `product` within each bin around `binwave`.
///
/// The product is sampled on its native waveset merged with the bin edges and
/// centres, then integrated bin by bin with the trapezoid rule.
fn bin_flux(product: &SourceSpectrum, binwave: &[f64]) -> Vec<f64> {
    let edges = math::bin_edges(binwave);
    let merged = math::merge_wavesets(Some(product.wave_angstrom()), Some(edges.clone()));
    let merged = math::merge_wavesets(merged, Some(binwave.to_vec())).unwrap_or_default();

    let flux = product.sample(&merged);
    let avflux: Vec<f64> = flux.windows(2).map(|f| (f[0] + f[1]) / 2.0).collect();
    let deltaw: Vec<f64> = merged.windows(2).map(|w| w[1] - w[0]).collect();
    let indices: Vec<usize> = edges
        .iter()
        .map(|&edge| math::search_sorted(&merged, edge).min(deltaw.len()))
        .collect();

    indices
        .windows(2)
        .map(|bin| {
            let (first, last) = (bin[0], bin[1]);
            let width: f64 = deltaw[first..last].iter().sum();
            if width == 0.0 {
                return 0.0;
            }
            let integral: f64 = avflux[first..last]
                .iter()
                .zip(&deltaw[first..last])
                .map(|(f, dw)| f * dw)
                .sum();
            integral / width
        })
        .collect()
}
