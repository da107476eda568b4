//! Synthesis layer: units, models and observations.
//!
//! Architecture:
//! ```text
//!   values in user units
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  units    │  convert to Angstrom / photlam
//!   └──────────┘
//!        │
//!        ▼
//!   ┌────────────────┐     ┌─────────────────┐
//!   │ SourceSpectrum  │  *  │ SpectralElement  │  analytic, tabular, composite
//!   └────────────────┘     └─────────────────┘
//!        │                      │
//!        └──────────┬───────────┘
//!                   ▼
//!            ┌─────────────┐
//!            │ Observation  │  binned flux, count rate, pivot, efflam
//!            └─────────────┘
//! ```

pub mod bandpass;
pub mod math;
pub mod observation;
pub mod source;
pub mod units;

pub use bandpass::SpectralElement;
pub use observation::{Force, Observation};
pub use source::{Overlap, SourceSpectrum};
pub use units::{FluxUnit, WaveUnit};
