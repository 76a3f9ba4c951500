//! Error taxonomy and the accumulated computation status of a cosmology.

use thiserror::Error;

use crate::algo::spline::SplineError;

/// Errors raised while building or querying power spectra
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerError {
    /// Inconsistent or missing input (normalization, method selection, parameters)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Scratch allocation refused by the allocator
    #[error("could not allocate {len} entries for {what}")]
    Memory { what: &'static str, len: usize },

    /// Malformed grid handed to the spline layer
    #[error("spline construction failed: {0}")]
    SplineConstruction(#[from] SplineError),

    /// Out-of-domain or ill-conditioned spline query
    #[error("spline evaluation failed: {0}")]
    SplineEvaluation(SplineError),

    /// A stage of the Boltzmann solver failed
    #[error("Boltzmann solver failed in {stage}: {message}")]
    Backend { stage: String, message: String },

    /// Cosmology or query outside the emulator's calibrated range
    #[error("emulator bounds violated: {0}")]
    EmulatorBounds(String),

    /// The emulator itself failed
    #[error("emulator failed: {0}")]
    Emulator(String),

    /// The background cosmology could not supply a quantity
    #[error("background cosmology error: {0}")]
    Background(String),

    /// Writing a diagnostic dump failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PowerError {
    fn from(err: std::io::Error) -> Self {
        PowerError::Io(err.to_string())
    }
}

impl PowerError {
    /// Map a spline error raised while querying an existing table.
    pub(crate) fn evaluation(err: SplineError) -> Self {
        PowerError::SplineEvaluation(err)
    }
}

/// Accumulated outcome of computations on one cosmology.
///
/// The first fatal error sticks; the message is whatever was recorded last.
/// Quadrature tolerance failures only bump `integration_warnings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputationStatus {
    error: Option<PowerError>,
    message: Option<String>,
    integration_warnings: usize,
}

impl ComputationStatus {
    /// True while no fatal error has been recorded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The first fatal error, if any.
    pub fn error(&self) -> Option<&PowerError> {
        self.error.as_ref()
    }

    /// Most recent human-readable message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Number of integrals that stopped short of their tolerance.
    pub fn integration_warnings(&self) -> usize {
        self.integration_warnings
    }

    /// Record a fatal error. Only the first one is kept as the status code.
    pub(crate) fn fail(&mut self, err: &PowerError) {
        self.message = Some(err.to_string());
        if self.error.is_none() {
            self.error = Some(err.clone());
        }
    }

    /// Record a message without changing the error state.
    pub(crate) fn note(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub(crate) fn integration_warning(&mut self, message: impl Into<String>) {
        self.integration_warnings += 1;
        self.message = Some(message.into());
    }
}

/// Allocate an empty vector with room for exactly `len` entries.
///
/// Refusal by the allocator is reported as `PowerError::Memory`.
pub(crate) fn try_with_capacity<T>(what: &'static str, len: usize) -> Result<Vec<T>, PowerError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| PowerError::Memory { what, len })?;
    Ok(values)
}
