//! Data layer: on-disk tables and the formats that carry them.
//!
//! Architecture:
//! ```text
//!  .fits / .json / .csv / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  dispatch by extension (FITS goes through `fits`)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ SpectralTable  │  wave, values, declared units, metadata
//!   └──────────────┘
//!        │
//!        ▼
//!   SourceSpectrum / SpectralElement
//! ```

pub mod fits;
pub mod loader;
pub mod model;
