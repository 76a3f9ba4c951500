//! Method selection and numerical settings for power spectrum computations
//!
//! Every type here is serde-serializable with defaults for missing fields,
//! so a JSON file only needs the settings that differ from the defaults.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::algo::quadrature::QuadratureOptions;
use crate::error::PowerError;

/// Linear transfer function used to build the linear table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferFunctionMethod {
    /// Bardeen, Bond, Kaiser & Szalay (1986) fit
    Bbks,
    /// Eisenstein & Hu (1998) fit with baryon acoustic oscillations
    #[default]
    EisensteinHu,
    /// Eisenstein & Hu (1998) zero-baryon-wiggle shape
    EisensteinHuNoWiggles,
    /// Full run of a Boltzmann solver
    Boltzmann,
    /// Boltzmann linear spectrum plus emulator non-linear spectrum
    Emulator,
}

impl std::str::FromStr for TransferFunctionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bbks" => Ok(Self::Bbks),
            "eisenstein_hu" | "eh" => Ok(Self::EisensteinHu),
            "eisenstein_hu_no_wiggles" | "eh_nowiggles" => Ok(Self::EisensteinHuNoWiggles),
            "boltzmann" | "class" => Ok(Self::Boltzmann),
            "emulator" | "emu" => Ok(Self::Emulator),
            _ => Err(format!(
                "Unknown transfer function: {}. Valid options: bbks, eisenstein_hu, eisenstein_hu_no_wiggles, boltzmann, emulator",
                s
            )),
        }
    }
}

/// How the non-linear table is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatterPowerMethod {
    /// Non-linear power equals linear power
    Linear,
    /// Halofit, computed by the Boltzmann solver
    #[default]
    Halofit,
    /// Emulator lookup
    Emulator,
}

impl std::str::FromStr for MatterPowerMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "halofit" => Ok(Self::Halofit),
            "emulator" | "emu" => Ok(Self::Emulator),
            _ => Err(format!(
                "Unknown matter power method: {}. Valid options: linear, halofit, emulator",
                s
            )),
        }
    }
}

/// Baryonic correction applied to non-linear queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaryonModel {
    #[default]
    None,
    /// Schneider & Teyssier (2015) baryonic correction model
    Bcm,
}

/// What the emulator backend does with unequal neutrino masses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmulatorNeutrinos {
    /// Require three equal masses
    #[default]
    Strict,
    /// Replace the masses with three copies of their mean
    Equalize,
}

/// Grid constants for the interpolation tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineConfig {
    /// Lower k bound of analytic tables (1/Mpc)
    pub k_min: f64,
    /// Upper k bound of analytic tables (1/Mpc)
    pub k_max: f64,
    /// Upper k bound of Boltzmann tables (1/Mpc)
    pub k_max_spline: f64,
    /// k samples per decade
    pub n_k: usize,
    /// Points in the linear a segment
    pub a_n_lin: usize,
    /// Points in the logarithmic a segment
    pub a_n_log: usize,
    /// Start of the logarithmic a segment
    pub a_min_log: f64,
    /// Start of the linear a segment
    pub a_min_lin: f64,
    /// Last a sample
    pub a_max: f64,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            k_min: 5e-5,
            k_max: 1e3,
            k_max_spline: 50.0,
            n_k: 167,
            a_n_lin: 40,
            a_n_log: 11,
            a_min_log: 0.01,
            a_min_lin: 0.1,
            a_max: 1.0,
        }
    }
}

/// Tolerances for the spectral moment integrals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Relative error target
    pub epsrel: f64,
    /// Maximum number of subintervals
    pub limit: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            epsrel: 1e-5,
            limit: 1000,
        }
    }
}

impl IntegrationConfig {
    pub(crate) fn quadrature(&self) -> QuadratureOptions {
        QuadratureOptions {
            epsabs: 0.0,
            epsrel: self.epsrel,
            limit: self.limit,
        }
    }
}

/// Complete method and numerics configuration of a cosmology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PowerConfig {
    pub transfer_function: TransferFunctionMethod,
    pub matter_power: MatterPowerMethod,
    pub baryons: BaryonModel,
    pub emulator_neutrinos: EmulatorNeutrinos,
    pub spline: SplineConfig,
    pub integration: IntegrationConfig,
}

impl PowerConfig {
    /// Configuration with the given methods and default numerics.
    pub fn new(transfer_function: TransferFunctionMethod, matter_power: MatterPowerMethod) -> Self {
        Self {
            transfer_function,
            matter_power,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PowerError> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| PowerError::Configuration(format!("invalid power config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the method combination and grid settings make sense.
    pub fn validate(&self) -> Result<(), PowerError> {
        let emulated_transfer = self.transfer_function == TransferFunctionMethod::Emulator;
        let emulated_power = self.matter_power == MatterPowerMethod::Emulator;
        if emulated_transfer != emulated_power {
            return Err(PowerError::Configuration(format!(
                "transfer function {:?} is incompatible with matter power method {:?}; \
                 the emulator must be selected for both",
                self.transfer_function, self.matter_power
            )));
        }

        let s = &self.spline;
        let ordered = 0.0 < s.k_min
            && s.k_min < s.k_max
            && s.k_max_spline > 0.0
            && 0.0 < s.a_min_log
            && s.a_min_log < s.a_min_lin
            && s.a_min_lin < s.a_max;
        if !ordered || s.n_k == 0 || s.a_n_lin < 2 || s.a_n_log < 2 {
            return Err(PowerError::Configuration(format!(
                "inconsistent spline grid settings: {s:?}"
            )));
        }
        if !(self.integration.epsrel > 0.0) || self.integration.limit == 0 {
            return Err(PowerError::Configuration(format!(
                "inconsistent integration settings: {:?}",
                self.integration
            )));
        }
        Ok(())
    }
}
