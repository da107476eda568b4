use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Mul};

use super::bandpass::SpectralElement;
use super::math;
use super::units::{self, FluxUnit, WaveUnit, AB_ZERO, H, PRIMARY_AREA, ST_ZERO};
use crate::error::{Result, SynphotError};

/// Speed of light, cm/s.
const C_CM: f64 = 2.99792458e10;
/// Boltzmann constant, erg/K.
const K_B: f64 = 1.38062e-16;
/// Solar radius, cm.
const R_SUN: f64 = 6.9599e10;
/// One kiloparsec, cm.
const KPC: f64 = 3.0856776e21;

// ---------------------------------------------------------------------------
// Overlap – how a spectrum covers a bandpass
// ---------------------------------------------------------------------------

/// Coverage of a bandpass by a spectrum's natural waveset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// The spectrum is defined over the whole passband.
    Full,
    /// The spectrum covers only part of the passband.
    Partial,
    /// No common wavelengths.
    Disjoint,
}

// ---------------------------------------------------------------------------
// SourceSpectrum
// ---------------------------------------------------------------------------

/// A source of flux: tabulated data, an analytic model, or a composite.
///
/// Models hold Angstrom / photlam internally. `waveunits` and `fluxunits`
/// are display units: they control what [`SourceSpectrum::call`],
/// [`SourceSpectrum::wave`] and [`SourceSpectrum::flux`] accept and return.
#[derive(Debug, Clone)]
pub struct SourceSpectrum {
    model: SourceModel,
    waveunits: WaveUnit,
    fluxunits: FluxUnit,
    name: Option<String>,
}

#[derive(Debug, Clone)]
enum SourceModel {
    Tabular { wave: Vec<f64>, flux: Vec<f64> },
    Flat { value: f64, unit: FluxUnit },
    Blackbody { temperature: f64 },
    /// Peak `amplitude` in photlam.
    Gaussian { center: f64, sigma: f64, amplitude: f64 },
    PowerLaw { reference: f64, index: f64, unit: FluxUnit },
    Sum(Box<SourceSpectrum>, Box<SourceSpectrum>),
    Product(Box<SourceSpectrum>, Box<SpectralElement>),
    Scaled(Box<SourceSpectrum>, f64),
    Redshifted(Box<SourceSpectrum>, f64),
}

impl SourceSpectrum {
    fn from_model(model: SourceModel, waveunits: WaveUnit, fluxunits: FluxUnit) -> Self {
        SourceSpectrum {
            model,
            waveunits,
            fluxunits,
            name: None,
        }
    }

    /// Tabulated spectrum. Values are converted to internal units right away.
    ///
    /// Decreasing wavelength arrays are reversed; negative fluxes are kept
    /// but logged.
    pub fn tabular(
        wave: Vec<f64>,
        flux: Vec<f64>,
        waveunits: WaveUnit,
        fluxunits: FluxUnit,
    ) -> Result<Self> {
        if wave.len() != flux.len() {
            return Err(SynphotError::invalid(format!(
                "wavelength array has {} values but the flux array has {}",
                wave.len(),
                flux.len()
            )));
        }
        let wave = waveunits.to_angstrom(&wave);
        let flux = fluxunits.to_photlam(&wave, &flux);
        let (wave, flux) = math::sorted_table(wave, flux)?;
        if let Some(i) = flux.iter().position(|&f| f < 0.0) {
            log::warn!(
                "spectrum contains negative flux (first at {:.3} A)",
                wave[i]
            );
        }
        Ok(Self::from_model(
            SourceModel::Tabular { wave, flux },
            waveunits,
            fluxunits,
        ))
    }

    /// Constant flux density in `fluxunits`.
    pub fn flat(value: f64, fluxunits: FluxUnit) -> Result<Self> {
        reject_binned_unit(fluxunits)?;
        if !value.is_finite() {
            return Err(SynphotError::invalid(format!("flat flux must be finite, got {value}")));
        }
        Ok(Self::from_model(
            SourceModel::Flat {
                value,
                unit: fluxunits,
            },
            WaveUnit::Angstrom,
            fluxunits,
        ))
    }

    /// Blackbody of the given temperature (K), for a 1 Rsun star at 1 kpc.
    pub fn blackbody(temperature: f64) -> Result<Self> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(SynphotError::invalid(format!(
                "blackbody temperature must be positive, got {temperature}"
            )));
        }
        Ok(Self::from_model(
            SourceModel::Blackbody { temperature },
            WaveUnit::Angstrom,
            FluxUnit::Photlam,
        ))
    }

    /// Gaussian emission line.
    ///
    /// `total_flux` is the integrated line flux: photons s^-1 cm^-2 when
    /// `fluxunits` is photlam, erg s^-1 cm^-2 when it is flam. `center` and
    /// `fwhm` are in `waveunits`.
    pub fn gaussian(
        total_flux: f64,
        center: f64,
        fwhm: f64,
        waveunits: WaveUnit,
        fluxunits: FluxUnit,
    ) -> Result<Self> {
        let center = waveunits.value_to_angstrom(center);
        let fwhm = waveunits.width_to_angstrom(fwhm)?;
        if !center.is_finite() || center <= 0.0 || !fwhm.is_finite() || fwhm <= 0.0 {
            return Err(SynphotError::invalid(format!(
                "gaussian line needs a positive centre and FWHM, got {center} / {fwhm} A"
            )));
        }
        let photons = match fluxunits {
            FluxUnit::Photlam => total_flux,
            FluxUnit::Flam => total_flux * center / units::HC,
            other => {
                return Err(SynphotError::invalid(format!(
                    "gaussian line flux must be given in photlam or flam, not {other}"
                )))
            }
        };
        let sigma = math::fwhm_to_sigma(fwhm);
        Ok(Self::from_model(
            SourceModel::Gaussian {
                center,
                sigma,
                amplitude: photons / (sigma * (2.0 * PI).sqrt()),
            },
            waveunits,
            fluxunits,
        ))
    }

    /// Power law `(l / reference)^index` in `fluxunits`; `reference` is in `waveunits`.
    pub fn power_law(
        reference: f64,
        index: f64,
        waveunits: WaveUnit,
        fluxunits: FluxUnit,
    ) -> Result<Self> {
        reject_binned_unit(fluxunits)?;
        let reference = waveunits.value_to_angstrom(reference);
        if !reference.is_finite() || reference <= 0.0 || !index.is_finite() {
            return Err(SynphotError::invalid(format!(
                "power law needs a positive reference wavelength, got {reference} A"
            )));
        }
        Ok(Self::from_model(
            SourceModel::PowerLaw {
                reference,
                index,
                unit: fluxunits,
            },
            waveunits,
            fluxunits,
        ))
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn waveunits(&self) -> WaveUnit {
        self.waveunits
    }

    pub fn fluxunits(&self) -> FluxUnit {
        self.fluxunits
    }

    /// Change the unit used for wavelengths handed in and out.
    pub fn convert_wave(&mut self, unit: WaveUnit) {
        self.waveunits = unit;
    }

    /// Change the unit used for fluxes handed out.
    pub fn convert_flux(&mut self, unit: FluxUnit) {
        self.fluxunits = unit;
    }

    /// Whether the model is tabulated data (as opposed to analytic or composite).
    pub fn is_tabular(&self) -> bool {
        matches!(self.model, SourceModel::Tabular { .. })
    }

    /// Flux in photlam at Angstrom wavelengths.
    pub fn sample(&self, wave: &[f64]) -> Vec<f64> {
        match &self.model {
            SourceModel::Tabular { wave: table, flux } => math::interpolate_all(table, flux, wave),
            SourceModel::Flat { value, unit } => unit.to_photlam(wave, &vec![*value; wave.len()]),
            SourceModel::Blackbody { temperature } => wave
                .iter()
                .map(|&w| blackbody_photlam(w, *temperature))
                .collect(),
            SourceModel::Gaussian {
                center,
                sigma,
                amplitude,
            } => wave
                .iter()
                .map(|&w| amplitude * (-0.5 * ((w - center) / sigma).powi(2)).exp())
                .collect(),
            SourceModel::PowerLaw {
                reference,
                index,
                unit,
            } => {
                let flux: Vec<f64> = wave
                    .iter()
                    .map(|&w| if w > 0.0 { (w / reference).powf(*index) } else { 0.0 })
                    .collect();
                unit.to_photlam(wave, &flux)
            }
            SourceModel::Sum(a, b) => a
                .sample(wave)
                .into_iter()
                .zip(b.sample(wave))
                .map(|(x, y)| x + y)
                .collect(),
            SourceModel::Product(source, band) => {
                math::multiply(&source.sample(wave), &band.sample(wave))
            }
            SourceModel::Scaled(inner, factor) => {
                inner.sample(wave).into_iter().map(|f| f * factor).collect()
            }
            SourceModel::Redshifted(inner, z) => {
                let rest: Vec<f64> = wave.iter().map(|w| w / (1.0 + z)).collect();
                inner.sample(&rest)
            }
        }
    }

    /// Flux in `fluxunits` at wavelengths given in `waveunits`.
    ///
    /// Always returns one value per requested wavelength.
    pub fn call(&self, wave: &[f64]) -> Vec<f64> {
        let wave = self.waveunits.to_angstrom(wave);
        self.fluxunits.from_photlam(&wave, &self.sample(&wave))
    }

    /// Natural waveset in Angstrom, if the model defines one.
    pub fn waveset(&self) -> Option<Vec<f64>> {
        match &self.model {
            SourceModel::Tabular { wave, .. } => Some(wave.clone()),
            SourceModel::Flat { .. }
            | SourceModel::Blackbody { .. }
            | SourceModel::PowerLaw { .. } => None,
            SourceModel::Gaussian { center, sigma, .. } => {
                Some(math::gaussian_waveset(*center, *sigma))
            }
            SourceModel::Sum(a, b) => math::merge_wavesets(a.waveset(), b.waveset()),
            SourceModel::Product(source, band) => {
                math::merge_wavesets(source.waveset(), band.waveset())
            }
            SourceModel::Scaled(inner, _) => inner.waveset(),
            SourceModel::Redshifted(inner, z) => inner
                .waveset()
                .map(|wave| wave.into_iter().map(|w| w * (1.0 + z)).collect()),
        }
    }

    /// Natural waveset, or the default waveset, in Angstrom.
    pub fn wave_angstrom(&self) -> Vec<f64> {
        self.waveset().unwrap_or_else(math::default_waveset)
    }

    /// Wavelength grid in `waveunits`.
    pub fn wave(&self) -> Vec<f64> {
        self.waveunits.from_angstrom(&self.wave_angstrom())
    }

    /// Flux on the [`SourceSpectrum::wave`] grid, in `fluxunits`.
    pub fn flux(&self) -> Vec<f64> {
        let wave = self.wave_angstrom();
        self.fluxunits.from_photlam(&wave, &self.sample(&wave))
    }

    /// Evaluate the model into a tabulated spectrum.
    ///
    /// `grid` is in `waveunits`; without one the [`SourceSpectrum::wave`]
    /// grid is used. Display units and name carry over.
    pub fn compute(&self, grid: Option<&[f64]>) -> Result<SourceSpectrum> {
        let wave = match grid {
            Some(grid) => self.waveunits.to_angstrom(grid),
            None => self.wave_angstrom(),
        };
        let flux = self.sample(&wave);
        let (wave, flux) = math::sorted_table(wave, flux)?;
        Ok(SourceSpectrum {
            model: SourceModel::Tabular { wave, flux },
            waveunits: self.waveunits,
            fluxunits: self.fluxunits,
            name: self.name.clone(),
        })
    }

    /// Tabulated copy with a zero-flux point one grid step beyond each end.
    pub fn taper(&self) -> Result<SourceSpectrum> {
        let tabulated = match &self.model {
            SourceModel::Tabular { .. } => self.clone(),
            _ => self.compute(None)?,
        };
        let SourceModel::Tabular { wave, flux } = tabulated.model else {
            return Err(SynphotError::invalid("tabulation did not produce a table"));
        };

        let n = wave.len();
        let (low_step, high_step) = if n >= 2 {
            (wave[1] - wave[0], wave[n - 1] - wave[n - 2])
        } else {
            let step = (wave[0].abs() * 0.01).max(f64::EPSILON);
            (step, step)
        };
        let low = (wave[0] - low_step).max(wave[0] / 2.0);
        let high = wave[n - 1] + high_step;

        let mut tapered_wave = Vec::with_capacity(n + 2);
        tapered_wave.push(low);
        tapered_wave.extend(&wave);
        tapered_wave.push(high);
        let mut tapered_flux = Vec::with_capacity(n + 2);
        tapered_flux.push(0.0);
        tapered_flux.extend(&flux);
        tapered_flux.push(0.0);

        Ok(SourceSpectrum {
            model: SourceModel::Tabular {
                wave: tapered_wave,
                flux: tapered_flux,
            },
            waveunits: self.waveunits,
            fluxunits: self.fluxunits,
            name: self.name.clone(),
        })
    }

    /// Shift to redshift `z`: wavelengths stretch by `1 + z`, flux density
    /// values move with them unchanged.
    pub fn redshift(&self, z: f64) -> Result<SourceSpectrum> {
        if !z.is_finite() || z <= -1.0 {
            return Err(SynphotError::invalid(format!("redshift must exceed -1, got {z}")));
        }
        Ok(Self::from_model(
            SourceModel::Redshifted(Box::new(self.clone()), z),
            self.waveunits,
            self.fluxunits,
        ))
    }

    /// Multiply every flux by `factor`.
    pub fn scale(&self, factor: f64) -> SourceSpectrum {
        self.clone() * factor
    }

    /// How this spectrum's natural waveset covers the bandpass.
    ///
    /// Models without a natural waveset are defined everywhere and always
    /// overlap fully, as does any spectrum against a bandpass without one.
    pub fn check_overlap(&self, band: &SpectralElement) -> Overlap {
        if band.waveset().is_none() {
            return Overlap::Full;
        }
        let Some(wave) = self.waveset() else {
            return Overlap::Full;
        };
        let Some((low, high)) = band.throughput_range() else {
            return Overlap::Disjoint;
        };
        let (first, last) = (wave[0], wave[wave.len() - 1]);
        if first <= low && last >= high {
            Overlap::Full
        } else if last < low || first > high {
            Overlap::Disjoint
        } else {
            Overlap::Partial
        }
    }

    /// Integrated photon flux (photons s^-1 cm^-2) over the natural waveset.
    pub fn integrate(&self) -> f64 {
        let wave = self.wave_angstrom();
        math::trapezoid(&wave, &self.sample(&wave))
    }

    /// Effective stimulus through `band`, in `unit`.
    pub fn effstim(&self, band: &SpectralElement, unit: FluxUnit) -> Result<f64> {
        self.effstim_with_area(band, unit, PRIMARY_AREA)
    }

    /// [`SourceSpectrum::effstim`] with an explicit collecting area for count units.
    ///
    /// Flux densities are photon-weighted averages over the passband; counts
    /// are the total count rate.
    pub fn effstim_with_area(&self, band: &SpectralElement, unit: FluxUnit, area: f64) -> Result<f64> {
        let wave =
            math::merge_wavesets(self.waveset(), band.waveset()).unwrap_or_else(math::default_waveset);
        let through = band.sample(&wave);
        let photlam = self.sample(&wave);

        let weighted_mean = |flux: &[f64], weights: &[f64]| -> Result<f64> {
            let num = math::trapezoid(&wave, &math::multiply(flux, weights));
            let den = math::trapezoid(&wave, weights);
            if den == 0.0 {
                return Err(SynphotError::invalid(format!(
                    "bandpass {band} has no throughput over the spectrum"
                )));
            }
            Ok(num / den)
        };

        let value = match unit {
            FluxUnit::Counts | FluxUnit::ObMag => {
                let counts = area * math::trapezoid(&wave, &math::multiply(&photlam, &through));
                if unit == FluxUnit::ObMag {
                    units::magnitude(counts)
                } else {
                    counts
                }
            }
            FluxUnit::Photlam => weighted_mean(&photlam, &through)?,
            FluxUnit::Flam | FluxUnit::StMag => {
                let flam = FluxUnit::Flam.from_photlam(&wave, &photlam);
                let weights = math::multiply(&through, &wave);
                let mean = weighted_mean(&flam, &weights)?;
                if unit == FluxUnit::StMag {
                    units::magnitude(mean) + ST_ZERO
                } else {
                    mean
                }
            }
            FluxUnit::Photnu => {
                let photnu = FluxUnit::Photnu.from_photlam(&wave, &photlam);
                let weights: Vec<f64> = through.iter().zip(&wave).map(|(t, w)| t / w).collect();
                weighted_mean(&photnu, &weights)?
            }
            FluxUnit::Fnu | FluxUnit::Jansky | FluxUnit::MilliJansky | FluxUnit::AbMag => {
                let fnu = FluxUnit::Fnu.from_photlam(&wave, &photlam);
                let weights: Vec<f64> = through.iter().zip(&wave).map(|(t, w)| t / w).collect();
                let mean = weighted_mean(&fnu, &weights)?;
                match unit {
                    FluxUnit::Jansky => mean * 1e23,
                    FluxUnit::MilliJansky => mean * 1e26,
                    FluxUnit::AbMag => units::magnitude(mean) + AB_ZERO,
                    _ => mean,
                }
            }
        };
        Ok(value)
    }

    /// Scale so that the effective stimulus through `band` equals `value` in `unit`.
    pub fn renorm(&self, value: f64, unit: FluxUnit, band: &SpectralElement) -> Result<SourceSpectrum> {
        let current = self.effstim(band, unit)?;
        let factor = if unit.is_magnitude() {
            if !current.is_finite() {
                return Err(SynphotError::invalid(
                    "cannot renormalise a spectrum with zero flux in the band",
                ));
            }
            units::from_magnitude(value - current)
        } else {
            if current == 0.0 {
                return Err(SynphotError::invalid(
                    "cannot renormalise a spectrum with zero flux in the band",
                ));
            }
            value / current
        };
        log::debug!("renormalising {self} by {factor:e} to {value} {unit}");
        Ok(self.scale(factor))
    }

    fn describe(&self) -> String {
        match &self.model {
            SourceModel::Tabular { wave, .. } => format!("table[{}]", wave.len()),
            SourceModel::Flat { value, unit } => format!("flat({value} {unit})"),
            SourceModel::Blackbody { temperature } => format!("bb({temperature} K)"),
            SourceModel::Gaussian { center, .. } => format!("line({center:.1} A)"),
            SourceModel::PowerLaw { reference, index, .. } => {
                format!("pl({reference:.1} A, {index})")
            }
            SourceModel::Sum(a, b) => format!("{a} + {b}"),
            SourceModel::Product(source, band) => format!("{source} * {band}"),
            SourceModel::Scaled(inner, factor) => format!("{inner} * {factor:e}"),
            SourceModel::Redshifted(inner, z) => format!("{inner} at z={z}"),
        }
    }
}

fn reject_binned_unit(unit: FluxUnit) -> Result<()> {
    if unit.depends_on_binning() {
        return Err(SynphotError::invalid(format!(
            "analytic spectra cannot be defined in {unit}"
        )));
    }
    Ok(())
}

/// Planck photon flux (photlam) at `wave` Angstrom for a 1 Rsun star at 1 kpc.
fn blackbody_photlam(wave: f64, temperature: f64) -> f64 {
    if wave <= 0.0 {
        return 0.0;
    }
    let lambda_cm = wave * 1e-8;
    let x = H * C_CM / (lambda_cm * K_B * temperature);
    let denom = x.exp_m1();
    if !denom.is_finite() || denom <= 0.0 {
        return 0.0;
    }
    // photons s^-1 cm^-2 cm^-1 sr^-1, per Angstrom, over the stellar disc
    let radiance = 2.0 * C_CM / lambda_cm.powi(4) / denom * 1e-8;
    radiance * PI * (R_SUN / KPC).powi(2)
}

impl fmt::Display for SourceSpectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => f.write_str(&self.describe()),
        }
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Sums and products keep the left operand's display units.
impl Add for SourceSpectrum {
    type Output = SourceSpectrum;

    fn add(self, rhs: SourceSpectrum) -> SourceSpectrum {
        let (waveunits, fluxunits) = (self.waveunits, self.fluxunits);
        SourceSpectrum::from_model(
            SourceModel::Sum(Box::new(self), Box::new(rhs)),
            waveunits,
            fluxunits,
        )
    }
}

impl Mul<SpectralElement> for SourceSpectrum {
    type Output = SourceSpectrum;

    fn mul(self, band: SpectralElement) -> SourceSpectrum {
        let (waveunits, fluxunits) = (self.waveunits, self.fluxunits);
        SourceSpectrum::from_model(
            SourceModel::Product(Box::new(self), Box::new(band)),
            waveunits,
            fluxunits,
        )
    }
}

impl Mul<SourceSpectrum> for SpectralElement {
    type Output = SourceSpectrum;

    fn mul(self, source: SourceSpectrum) -> SourceSpectrum {
        source * self
    }
}

impl Mul<f64> for SourceSpectrum {
    type Output = SourceSpectrum;

    fn mul(self, factor: f64) -> SourceSpectrum {
        let (waveunits, fluxunits) = (self.waveunits, self.fluxunits);
        SourceSpectrum::from_model(
            SourceModel::Scaled(Box::new(self), factor),
            waveunits,
            fluxunits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_all_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!(
                (x - y).abs() <= tol * x.abs().max(y.abs()).max(1e-30),
                "index {i}: {x} vs {y}"
            );
        }
    }

    fn table() -> SourceSpectrum {
        SourceSpectrum::tabular(
            vec![4000.0, 5000.0, 6000.0, 7000.0],
            vec![1.0, 2.0, 3.0, 2.5],
            WaveUnit::Angstrom,
            FluxUnit::Photlam,
        )
        .unwrap()
    }

    #[test]
    fn test_call_at_own_wave_returns_own_flux() {
        let sp = table();
        assert_eq!(sp.call(&sp.wave()), sp.flux());
        assert_eq!(sp.flux(), vec![1.0, 2.0, 3.0, 2.5]);
    }

    #[test]
    fn test_call_at_own_wave_in_other_units() {
        let sp = SourceSpectrum::tabular(
            vec![400.0, 500.0, 600.0],
            vec![1e-15, 2e-15, 1.5e-15],
            WaveUnit::Nanometer,
            FluxUnit::Flam,
        )
        .unwrap();
        assert_all_close(&sp.wave(), &[400.0, 500.0, 600.0], 1e-12);
        assert_all_close(&sp.flux(), &[1e-15, 2e-15, 1.5e-15], 1e-9);
        assert_all_close(&sp.call(&sp.wave()), &sp.flux(), 1e-9);
    }

    #[test]
    fn test_call_returns_array_for_every_variant() {
        let band = SpectralElement::box_filter(5000.0, 100.0, WaveUnit::Angstrom).unwrap();
        let spectra = vec![
            table(),
            SourceSpectrum::flat(1.0, FluxUnit::Flam).unwrap(),
            SourceSpectrum::blackbody(5800.0).unwrap(),
            SourceSpectrum::gaussian(1.0, 5000.0, 10.0, WaveUnit::Angstrom, FluxUnit::Photlam)
                .unwrap(),
            SourceSpectrum::power_law(5000.0, -2.0, WaveUnit::Angstrom, FluxUnit::Flam).unwrap(),
            table() + SourceSpectrum::flat(1.0, FluxUnit::Photlam).unwrap(),
            table() * band,
            table() * 2.0,
            table().redshift(0.5).unwrap(),
        ];
        for sp in spectra {
            assert_eq!(sp.call(&[4500.0, 5000.0]).len(), 2, "{sp}");
            assert_eq!(sp.call(&[]).len(), 0, "{sp}");
        }
    }

    #[test]
    fn test_tabular_reverses_frequency_input() {
        // increasing frequency means decreasing wavelength
        let nu = WaveUnit::Hertz.from_angstrom(&[6000.0, 5000.0, 4000.0]);
        let sp = SourceSpectrum::tabular(
            nu,
            vec![1.0, 2.0, 3.0],
            WaveUnit::Hertz,
            FluxUnit::Photlam,
        )
        .unwrap();
        let wave = sp.wave_angstrom();
        assert!(wave[0] < wave[2]);
        assert_all_close(&sp.sample(&wave), &[3.0, 2.0, 1.0], 1e-12);
    }

    #[test]
    fn test_tabular_validation() {
        assert!(SourceSpectrum::tabular(vec![], vec![], WaveUnit::Angstrom, FluxUnit::Photlam).is_err());
        assert!(SourceSpectrum::tabular(
            vec![1.0, 2.0],
            vec![1.0],
            WaveUnit::Angstrom,
            FluxUnit::Photlam
        )
        .is_err());
    }

    #[test]
    fn test_flat_flam_converts_to_photlam() {
        let sp = SourceSpectrum::flat(1e-15, FluxUnit::Flam).unwrap();
        let photlam = sp.sample(&[5000.0]);
        assert_all_close(&photlam, &[1e-15 * 5000.0 / units::HC], 1e-12);
        assert!(sp.waveset().is_none());
        assert_eq!(sp.wave().len(), math::DEFAULT_WAVESET_POINTS);
    }

    #[test]
    fn test_analytic_rejects_count_units() {
        assert!(SourceSpectrum::flat(1.0, FluxUnit::Counts).is_err());
        assert!(SourceSpectrum::power_law(1.0, 1.0, WaveUnit::Angstrom, FluxUnit::ObMag).is_err());
    }

    #[test]
    fn test_blackbody_peak_follows_wien() {
        let sp = SourceSpectrum::blackbody(10000.0).unwrap();
        let grid = math::lin_space(1000.0, 10000.0, 9001);
        let flam = FluxUnit::Flam.from_photlam(&grid, &sp.sample(&grid));
        let (peak, _) = flam
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &f)| if f > acc.1 { (i, f) } else { acc });
        // Wien: lambda_max = 2.898e7 A K / T
        assert!((grid[peak] - 2898.0).abs() < 5.0, "peak at {}", grid[peak]);
        assert!(SourceSpectrum::blackbody(0.0).is_err());
    }

    #[test]
    fn test_gaussian_line_integrates_to_total_flux() {
        let sp =
            SourceSpectrum::gaussian(2.0, 6563.0, 5.0, WaveUnit::Angstrom, FluxUnit::Photlam).unwrap();
        assert!((sp.integrate() - 2.0).abs() < 1e-3);
        let flam_line =
            SourceSpectrum::gaussian(1e-13, 6563.0, 5.0, WaveUnit::Angstrom, FluxUnit::Flam).unwrap();
        let expected = 1e-13 * 6563.0 / units::HC;
        assert!((flam_line.integrate() - expected).abs() < 1e-3 * expected);
        assert!(
            SourceSpectrum::gaussian(1.0, 6563.0, 5.0, WaveUnit::Angstrom, FluxUnit::AbMag).is_err()
        );
    }

    #[test]
    fn test_power_law_at_reference_is_one() {
        let sp = SourceSpectrum::power_law(500.0, -2.0, WaveUnit::Nanometer, FluxUnit::Flam).unwrap();
        assert_all_close(&sp.call(&[500.0, 1000.0]), &[1.0, 0.25], 1e-12);
    }

    #[test]
    fn test_sum_keeps_left_units_and_merges_wavesets() {
        let mut left = table();
        left.convert_flux(FluxUnit::Flam);
        let right = SourceSpectrum::tabular(
            vec![650.0, 800.0],
            vec![1.0, 1.0],
            WaveUnit::Nanometer,
            FluxUnit::Photlam,
        )
        .unwrap();
        let sum = left + right;
        assert_eq!(sum.fluxunits(), FluxUnit::Flam);
        assert_eq!(sum.waveunits(), WaveUnit::Angstrom);
        assert_eq!(sum.waveset().unwrap().len(), 6);
        assert_all_close(&sum.sample(&[6500.0]), &[2.75 + 1.0], 1e-12);
    }

    #[test]
    fn test_redshift_stretches_wavelengths() {
        let sp = table().redshift(1.0).unwrap();
        assert_eq!(sp.waveset().unwrap(), vec![8000.0, 10000.0, 12000.0, 14000.0]);
        assert_eq!(sp.sample(&[10000.0]), vec![2.0]);
        assert!(table().redshift(-1.0).is_err());
    }

    #[test]
    fn test_compute_evaluates_analytic_model() {
        let sp = SourceSpectrum::blackbody(6000.0).unwrap().with_name("sun-like");
        let tab = sp.compute(Some(&[4000.0, 5000.0, 6000.0])).unwrap();
        assert!(tab.is_tabular());
        assert_eq!(tab.name(), Some("sun-like"));
        assert_eq!(tab.flux(), sp.call(&[4000.0, 5000.0, 6000.0]));
    }

    #[test]
    fn test_taper_adds_zero_ends() {
        let tapered = table().taper().unwrap();
        assert_eq!(
            tapered.waveset().unwrap(),
            vec![3000.0, 4000.0, 5000.0, 6000.0, 7000.0, 8000.0]
        );
        assert_eq!(tapered.sample(&[3000.0, 8000.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_check_overlap() {
        let sp = table();
        let inside = SpectralElement::box_filter(5000.0, 100.0, WaveUnit::Angstrom).unwrap();
        let straddling = SpectralElement::box_filter(7000.0, 400.0, WaveUnit::Angstrom).unwrap();
        let outside = SpectralElement::box_filter(9000.0, 100.0, WaveUnit::Angstrom).unwrap();
        assert_eq!(sp.check_overlap(&inside), Overlap::Full);
        assert_eq!(sp.check_overlap(&straddling), Overlap::Partial);
        assert_eq!(sp.check_overlap(&outside), Overlap::Disjoint);
        let flat = SourceSpectrum::flat(1.0, FluxUnit::Photlam).unwrap();
        assert_eq!(flat.check_overlap(&outside), Overlap::Full);
    }

    #[test]
    fn test_effstim_of_flat_spectrum() {
        let band = SpectralElement::box_filter(5000.0, 200.0, WaveUnit::Angstrom).unwrap();
        let flat = SourceSpectrum::flat(2.0, FluxUnit::Photlam).unwrap();
        assert!((flat.effstim(&band, FluxUnit::Photlam).unwrap() - 2.0).abs() < 1e-9);

        let ab = SourceSpectrum::flat(20.0, FluxUnit::AbMag).unwrap();
        assert!((ab.effstim(&band, FluxUnit::AbMag).unwrap() - 20.0).abs() < 1e-6);

        let counts = flat.effstim_with_area(&band, FluxUnit::Counts, 1.0).unwrap();
        assert!((counts - 2.0 * band.equivwidth()).abs() < 1e-6);
    }

    #[test]
    fn test_renorm_hits_requested_value() {
        let band = SpectralElement::box_filter(5500.0, 800.0, WaveUnit::Angstrom).unwrap();
        let bb = SourceSpectrum::blackbody(9000.0).unwrap();
        let renormed = bb.renorm(15.0, FluxUnit::StMag, &band).unwrap();
        let stmag = renormed.effstim(&band, FluxUnit::StMag).unwrap();
        assert!((stmag - 15.0).abs() < 1e-9);

        let renormed = bb.renorm(1e-16, FluxUnit::Flam, &band).unwrap();
        let flam = renormed.effstim(&band, FluxUnit::Flam).unwrap();
        assert!((flam - 1e-16).abs() < 1e-25);
    }

    #[test]
    fn test_renorm_fails_without_flux_in_band() {
        let band = SpectralElement::box_filter(9000.0, 100.0, WaveUnit::Angstrom).unwrap();
        assert!(table().renorm(1.0, FluxUnit::Photlam, &band).is_err());
    }
}
