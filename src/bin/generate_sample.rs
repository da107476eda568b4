//! Write a small set of sample spectra and bandpasses, one per supported
//! file format, into `sample_data/`.

use std::path::Path;

use anyhow::{Context, Result};
use rusty_synphot::data::fits::{self, WriteOptions};
use rusty_synphot::data::loader::save_table;
use rusty_synphot::data::model::{MetadataValue, SpectralTable};
use rusty_synphot::synth::math::lin_space;
use rusty_synphot::{FluxUnit, SourceSpectrum, SpectralElement, WaveUnit};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// A hot star normalised to 0 abmag in a V-like box, as FITS.
fn write_star(dir: &Path, v_band: &SpectralElement) -> Result<()> {
    let mut star = SourceSpectrum::blackbody(9600.0)?
        .renorm(0.0, FluxUnit::AbMag, v_band)?
        .compute(None)?
        .with_name("bb9600");
    star.convert_flux(FluxUnit::Flam);
    fits::write_spectrum(&dir.join("bb9600.fits"), &star, WriteOptions::default())
        .context("writing bb9600.fits")?;
    Ok(())
}

/// Redshifted H-alpha emission on a flat continuum with noise, as JSON in nm.
fn write_emission_line(dir: &Path, rng: &mut SimpleRng) -> Result<()> {
    let continuum = SourceSpectrum::flat(1e-16, FluxUnit::Flam)?;
    let line = SourceSpectrum::gaussian(2e-14, 6563.0, 8.0, WaveUnit::Angstrom, FluxUnit::Flam)?;
    let mut galaxy = (continuum + line).redshift(0.05)?;
    galaxy.convert_wave(WaveUnit::Nanometer);
    galaxy.convert_flux(FluxUnit::Flam);

    let wave = lin_space(650.0, 750.0, 1001);
    let flux: Vec<f64> = galaxy
        .call(&wave)
        .into_iter()
        .map(|f| f + rng.gauss(0.0, 2e-18))
        .collect();
    let spectrum = SourceSpectrum::tabular(wave, flux, WaveUnit::Nanometer, FluxUnit::Flam)?
        .with_name("halpha_z0.05");

    let mut table = SpectralTable::from_spectrum(&spectrum);
    table
        .metadata
        .insert("redshift".to_string(), MetadataValue::Float(0.05));
    table
        .metadata
        .insert("observer".to_string(), MetadataValue::String("Alice".to_string()));
    save_table(&dir.join("halpha.json"), &table)
}

/// A measured-looking Gaussian B-like bandpass with noise, as CSV.
fn write_noisy_band(dir: &Path, rng: &mut SimpleRng) -> Result<()> {
    let ideal = SpectralElement::gaussian(4400.0, 1000.0, WaveUnit::Angstrom)?;
    let wave = lin_space(3000.0, 6000.0, 601);
    let throughput: Vec<f64> = ideal
        .call(&wave)
        .into_iter()
        .map(|t| (0.8 * t + rng.gauss(0.0, 0.005)).max(0.0))
        .collect();
    let band = SpectralElement::tabular(wave, throughput, WaveUnit::Angstrom)?;
    save_table(&dir.join("b_noisy.csv"), &SpectralTable::from_bandpass(&band))
}

/// An R-like box bandpass in microns, as Parquet.
fn write_box_band(dir: &Path) -> Result<()> {
    let band = SpectralElement::box_filter(0.64, 0.15, WaveUnit::Micron)?.with_name("r_box");
    save_table(&dir.join("r_box.parquet"), &SpectralTable::from_bandpass(&band))
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let dir = Path::new("sample_data");
    std::fs::create_dir_all(dir).context("creating sample_data/")?;

    let v_band = SpectralElement::box_filter(5500.0, 880.0, WaveUnit::Angstrom)?.with_name("v_box");
    save_table(&dir.join("v_box.fits"), &SpectralTable::from_bandpass(&v_band))?;

    write_star(dir, &v_band)?;
    write_emission_line(dir, &mut rng)?;
    write_noisy_band(dir, &mut rng)?;
    write_box_band(dir)?;

    println!("Wrote sample spectra and bandpasses to {}", dir.display());
    Ok(())
}
