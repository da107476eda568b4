//! Error types for the synthesis library.
//!
//! Library code returns [`SynphotError`]; the viewer and the file loaders
//! wrap it in `anyhow` with extra context.

use thiserror::Error;

/// The main error type for spectrum, bandpass and observation operations.
#[derive(Error, Debug)]
pub enum SynphotError {
    // === Unit Errors ===
    /// The string does not name any known unit.
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    /// A known unit was given where a wavelength unit is required.
    #[error("'{unit}' is not a wavelength unit")]
    NotAWaveUnit {
        /// The offending unit name.
        unit: String,
    },

    /// A known unit was given where a flux unit is required.
    #[error("'{unit}' is not a flux unit")]
    NotAFluxUnit {
        /// The offending unit name.
        unit: String,
    },

    // === Model Errors ===
    /// Constructor or operation arguments failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The spectrum covers only part of the bandpass.
    #[error(
        "spectrum and bandpass do not fully overlap; use force=taper or force=extrap to observe anyway"
    )]
    PartialOverlap,

    /// The spectrum and the bandpass share no wavelengths.
    #[error("spectrum and bandpass are disjoint")]
    DisjointOverlap,

    /// Unrecognised `force` keyword for an observation.
    #[error("illegal value force={0}; legal values are 'taper' and 'extrap'")]
    IllegalForce(String),

    // === File Errors ===
    /// The FITS stream is structurally broken or lacks a required column.
    #[error("malformed FITS file: {0}")]
    Fits(String),

    /// cfitsio rejected a read or write.
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynphotError {
    /// Shorthand for an [`SynphotError::InvalidInput`] error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Shorthand for a [`SynphotError::Fits`] error.
    pub fn fits(message: impl Into<String>) -> Self {
        Self::Fits(message.into())
    }

    /// Whether the error comes from an unusable unit name.
    pub fn is_unit_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownUnit(_) | Self::NotAWaveUnit { .. } | Self::NotAFluxUnit { .. }
        )
    }

    /// Whether the error comes from a spectrum/bandpass overlap check.
    pub fn is_overlap_error(&self) -> bool {
        matches!(self, Self::PartialOverlap | Self::DisjointOverlap)
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, SynphotError>;
