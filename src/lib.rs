//! Synthetic photometry: source spectra, bandpasses and observations.
//!
//! Models are built from analytic shapes or tables, combined with `+`/`*`,
//! and observed through a bandpass to get binned fluxes, count rates and
//! effective stimuli. Internally every wavelength is in Angstrom and every
//! flux in photlam; each model carries its own display units.

pub mod config;
pub mod data;
pub mod error;
pub mod synth;

pub use config::Settings;
pub use data::loader::{load_bandpass, load_spectrum, load_table, save_table};
pub use error::{Result, SynphotError};
pub use synth::{FluxUnit, Force, Observation, Overlap, SourceSpectrum, SpectralElement, WaveUnit};
