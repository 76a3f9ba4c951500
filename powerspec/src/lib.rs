//! Linear and non-linear matter power spectra for a single cosmology.
//!
//! A [`Cosmology`] builds bicubic tables of ln P(k, a) from one of several
//! transfer function backends (BBKS, Eisenstein & Hu, a staged Boltzmann
//! solver or an emulator), normalizes them to the requested amplitude and
//! answers power spectrum and spectral moment queries from the tables.
//!
//! ```no_run
//! use powerspec::{Cosmology, CosmologicalParameters, ParameterSet, PowerConfig};
//!
//! let params = CosmologicalParameters::try_from(ParameterSet::lcdm(0.25, 0.05, 0.7, 0.96, 0.8))?;
//! let mut cosmo = Cosmology::new(params, PowerConfig::default())?;
//! let p = cosmo.nonlinear_power(1.0, 1.0)?;
//! # Ok::<(), powerspec::PowerError>(())
//! ```

pub mod algo;
pub mod background;
pub mod config;
pub mod constants;
pub mod error;
pub mod neutrinos;
pub mod params;
pub mod power;
pub mod solver;
pub mod transfer;

pub use background::{Background, LinearGrowth};
pub use config::{BaryonModel, EmulatorNeutrinos, MatterPowerMethod, PowerConfig, TransferFunctionMethod};
pub use error::{ComputationStatus, PowerError};
pub use params::{CosmologicalParameters, ParameterSet};
pub use power::{Cosmology, PowerSpectrumTable};
pub use solver::{BoltzmannSolver, ReferenceSolver, SolverError, SolverParameters, SolverStage};
pub use transfer::emulator::Emulator;
pub use transfer::{PowerTables, TransferBackend};
