use std::fmt;
use std::ops::Mul;

use super::math;
use super::observation::{Force, Observation};
use super::source::SourceSpectrum;
use super::units::WaveUnit;
use crate::error::{Result, SynphotError};

/// Number of points spanning the passband of a box filter.
const BOX_POINTS: usize = 101;
/// Offset of the zero-throughput points outside a box, as a fraction of its width.
const BOX_EDGE_FRACTION: f64 = 1e-4;

// ---------------------------------------------------------------------------
// SpectralElement – a dimensionless throughput curve
// ---------------------------------------------------------------------------

/// A bandpass: throughput as a function of wavelength.
///
/// Throughput is stored against Angstrom; `waveunits` only affects the values
/// handed in and out by [`SpectralElement::call`] and [`SpectralElement::wave`].
#[derive(Debug, Clone)]
pub struct SpectralElement {
    model: ElementModel,
    waveunits: WaveUnit,
    name: Option<String>,
    /// Preferred binning for observations through this element (Angstrom).
    binset: Option<Vec<f64>>,
}

#[derive(Debug, Clone)]
enum ElementModel {
    Uniform(f64),
    Box { low: f64, high: f64 },
    Gaussian { center: f64, sigma: f64 },
    Tabular { wave: Vec<f64>, throughput: Vec<f64> },
    Product(Box<SpectralElement>, Box<SpectralElement>),
    Scaled(Box<SpectralElement>, f64),
}

impl SpectralElement {
    fn from_model(model: ElementModel, waveunits: WaveUnit) -> Self {
        SpectralElement {
            model,
            waveunits,
            name: None,
            binset: None,
        }
    }

    /// Constant throughput at every wavelength.
    pub fn uniform(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(SynphotError::invalid(format!(
                "uniform throughput must be finite and non-negative, got {value}"
            )));
        }
        Ok(Self::from_model(ElementModel::Uniform(value), WaveUnit::Angstrom))
    }

    /// Unit throughput over `center +- width/2`, zero elsewhere.
    pub fn box_filter(center: f64, width: f64, waveunits: WaveUnit) -> Result<Self> {
        let center = waveunits.value_to_angstrom(center);
        let width = waveunits.width_to_angstrom(width)?;
        if !center.is_finite() || !width.is_finite() || width <= 0.0 {
            return Err(SynphotError::invalid(format!(
                "box needs a finite centre and a positive width, got {center} / {width} A"
            )));
        }
        Ok(Self::from_model(
            ElementModel::Box {
                low: center - width / 2.0,
                high: center + width / 2.0,
            },
            waveunits,
        ))
    }

    /// Gaussian throughput curve with unit peak.
    pub fn gaussian(center: f64, fwhm: f64, waveunits: WaveUnit) -> Result<Self> {
        let center = waveunits.value_to_angstrom(center);
        let fwhm = waveunits.width_to_angstrom(fwhm)?;
        if !center.is_finite() || !fwhm.is_finite() || fwhm <= 0.0 {
            return Err(SynphotError::invalid(format!(
                "gaussian needs a finite centre and a positive FWHM, got {center} / {fwhm} A"
            )));
        }
        Ok(Self::from_model(
            ElementModel::Gaussian {
                center,
                sigma: math::fwhm_to_sigma(fwhm),
            },
            waveunits,
        ))
    }

    /// Tabulated throughput; zero outside the table.
    pub fn tabular(wave: Vec<f64>, throughput: Vec<f64>, waveunits: WaveUnit) -> Result<Self> {
        let wave = waveunits.to_angstrom(&wave);
        let (wave, throughput) = math::sorted_table(wave, throughput)?;
        if let Some(bad) = throughput.iter().position(|&t| t < 0.0) {
            return Err(SynphotError::invalid(format!(
                "negative throughput {} at index {bad}",
                throughput[bad]
            )));
        }
        Ok(Self::from_model(
            ElementModel::Tabular { wave, throughput },
            waveunits,
        ))
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a preferred observation binset (Angstrom).
    pub fn with_binset(mut self, binset: Vec<f64>) -> Result<Self> {
        if binset.len() < 2 || !math::is_strictly_increasing(&binset) {
            return Err(SynphotError::invalid(
                "binset needs at least two strictly increasing wavelengths",
            ));
        }
        self.binset = Some(binset);
        Ok(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn waveunits(&self) -> WaveUnit {
        self.waveunits
    }

    /// Change the unit used for wavelengths handed in and out.
    pub fn convert_wave(&mut self, unit: WaveUnit) {
        self.waveunits = unit;
    }

    /// Preferred observation binset (Angstrom); products inherit the first one found.
    pub fn binset(&self) -> Option<&[f64]> {
        if let Some(binset) = &self.binset {
            return Some(binset);
        }
        match &self.model {
            ElementModel::Product(a, b) => a.binset().or_else(|| b.binset()),
            ElementModel::Scaled(inner, _) => inner.binset(),
            _ => None,
        }
    }

    /// Throughput at Angstrom wavelengths.
    pub fn sample(&self, wave: &[f64]) -> Vec<f64> {
        match &self.model {
            ElementModel::Uniform(value) => vec![*value; wave.len()],
            ElementModel::Box { low, high } => wave
                .iter()
                .map(|&w| if w >= *low && w <= *high { 1.0 } else { 0.0 })
                .collect(),
            ElementModel::Gaussian { center, sigma } => wave
                .iter()
                .map(|&w| (-0.5 * ((w - center) / sigma).powi(2)).exp())
                .collect(),
            ElementModel::Tabular {
                wave: table,
                throughput,
            } => math::interpolate_all(table, throughput, wave),
            ElementModel::Product(a, b) => math::multiply(&a.sample(wave), &b.sample(wave)),
            ElementModel::Scaled(inner, factor) => {
                inner.sample(wave).into_iter().map(|t| t * factor).collect()
            }
        }
    }

    /// Throughput at wavelengths given in the element's `waveunits`.
    pub fn call(&self, wave: &[f64]) -> Vec<f64> {
        self.sample(&self.waveunits.to_angstrom(wave))
    }

    /// Natural waveset in Angstrom, if the model defines one.
    pub fn waveset(&self) -> Option<Vec<f64>> {
        match &self.model {
            ElementModel::Uniform(_) => None,
            ElementModel::Box { low, high } => {
                let edge = (high - low) * BOX_EDGE_FRACTION;
                let mut wave = Vec::with_capacity(BOX_POINTS + 2);
                wave.push(low - edge);
                wave.extend(math::lin_space(*low, *high, BOX_POINTS));
                wave.push(high + edge);
                Some(wave)
            }
            ElementModel::Gaussian { center, sigma } => {
                Some(math::gaussian_waveset(*center, *sigma))
            }
            ElementModel::Tabular { wave, .. } => Some(wave.clone()),
            ElementModel::Product(a, b) => math::merge_wavesets(a.waveset(), b.waveset()),
            ElementModel::Scaled(inner, _) => inner.waveset(),
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

    /// Throughput on the [`SpectralElement::wave`] grid.
    pub fn throughput(&self) -> Vec<f64> {
        self.sample(&self.wave_angstrom())
    }

    /// First and last natural-waveset wavelengths (Angstrom) with non-zero throughput.
    pub fn throughput_range(&self) -> Option<(f64, f64)> {
        let wave = self.waveset()?;
        let through = self.sample(&wave);
        let first = through.iter().position(|&t| t > 0.0)?;
        let last = through.iter().rposition(|&t| t > 0.0)?;
        Some((wave[first], wave[last]))
    }

    // -- photometric properties (Angstrom) --

    /// Throughput-weighted mean wavelength.
    pub fn avgwave(&self) -> f64 {
        let wave = self.wave_angstrom();
        let through = self.sample(&wave);
        let num = math::trapezoid(&wave, &math::multiply(&through, &wave));
        let den = math::trapezoid(&wave, &through);
        ratio_or_zero(num, den)
    }

    /// Pivot wavelength, `sqrt(int T l / int T / l)`.
    pub fn pivot(&self) -> f64 {
        let wave = self.wave_angstrom();
        let through = self.sample(&wave);
        let num = math::trapezoid(&wave, &math::multiply(&through, &wave));
        let per_wave: Vec<f64> = through.iter().zip(&wave).map(|(t, w)| t / w).collect();
        let den = math::trapezoid(&wave, &per_wave);
        ratio_or_zero(num, den).sqrt()
    }

    /// Equivalent width, `int T dl`.
    pub fn equivwidth(&self) -> f64 {
        let wave = self.wave_angstrom();
        math::trapezoid(&wave, &self.sample(&wave))
    }

    /// Equivalent width divided by the peak throughput.
    pub fn rectwidth(&self) -> f64 {
        ratio_or_zero(self.equivwidth(), self.peak())
    }

    /// Dimensionless efficiency, `int T / l dl`.
    pub fn efficiency(&self) -> f64 {
        let wave = self.wave_angstrom();
        let through = self.sample(&wave);
        let per_wave: Vec<f64> = through.iter().zip(&wave).map(|(t, w)| t / w).collect();
        math::trapezoid(&wave, &per_wave)
    }

    /// Maximum throughput on the natural (or default) waveset.
    pub fn peak(&self) -> f64 {
        self.throughput().into_iter().fold(0.0, f64::max)
    }

    /// Observe `spectrum` through this element.
    pub fn observe(
        &self,
        spectrum: &SourceSpectrum,
        binset: Option<Vec<f64>>,
        force: Option<Force>,
    ) -> Result<Observation> {
        Observation::new(spectrum.clone(), self.clone(), binset, force)
    }

    fn describe(&self) -> String {
        match &self.model {
            ElementModel::Uniform(value) => format!("uniform({value})"),
            ElementModel::Box { low, high } => {
                format!("box({:.1}, {:.1})", (low + high) / 2.0, high - low)
            }
            ElementModel::Gaussian { center, .. } => format!("gauss({center:.1})"),
            ElementModel::Tabular { wave, .. } => format!("table[{}]", wave.len()),
            ElementModel::Product(a, b) => format!("{a} * {b}"),
            ElementModel::Scaled(inner, factor) => format!("{inner} * {factor}"),
        }
    }
}

fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if num == 0.0 || den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl fmt::Display for SpectralElement {
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

impl Mul for SpectralElement {
    type Output = SpectralElement;

    /// Throughputs multiply; the left operand's wave unit wins.
    fn mul(self, rhs: SpectralElement) -> SpectralElement {
        let waveunits = self.waveunits;
        SpectralElement::from_model(
            ElementModel::Product(Box::new(self), Box::new(rhs)),
            waveunits,
        )
    }
}

impl Mul<f64> for SpectralElement {
    type Output = SpectralElement;

    fn mul(self, factor: f64) -> SpectralElement {
        let waveunits = self.waveunits;
        SpectralElement::from_model(ElementModel::Scaled(Box::new(self), factor), waveunits)
    }
}
