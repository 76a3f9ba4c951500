//! Cosmological parameters.
//!
//! [`ParameterSet`] is the raw, serde-friendly form read from JSON or the
//! command line. [`CosmologicalParameters`] is the checked form every
//! computation works with: it is only obtainable through `TryFrom`, which
//! enforces that exactly one of A_s and sigma8 is given.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::constants::T_CMB_DEFAULT;
use crate::error::PowerError;
use crate::neutrinos;

/// Maximum number of massive neutrino species
pub const MAX_NU_SPECIES: usize = 3;

/// How the amplitude of the primordial spectrum is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Primordial curvature amplitude at k = 0.05 / Mpc
    As(f64),
    /// RMS linear density contrast in 8 Mpc/h spheres today
    Sigma8(f64),
}

/// Parameters of the baryonic correction model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BcmParameters {
    /// log10 of the characteristic halo mass M_c in M_sun/h
    pub log10_mc: f64,
    /// Ejected-gas radius in units of the virial radius
    pub eta_b: f64,
    /// Stellar-component wavenumber in h/Mpc
    pub k_s: f64,
}

impl Default for BcmParameters {
    fn default() -> Self {
        Self {
            log10_mc: 1.2e14f64.log10(),
            eta_b: 0.5,
            k_s: 55.0,
        }
    }
}

/// Raw parameter input with optional normalization fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub h: f64,
    #[serde(rename = "Omega_c")]
    pub omega_c: f64,
    #[serde(rename = "Omega_b")]
    pub omega_b: f64,
    #[serde(rename = "Omega_k", default)]
    pub omega_k: f64,
    pub n_s: f64,
    #[serde(rename = "A_s", default)]
    pub a_s: Option<f64>,
    #[serde(default)]
    pub sigma8: Option<f64>,
    #[serde(default = "default_w0")]
    pub w0: f64,
    #[serde(default)]
    pub wa: f64,
    #[serde(rename = "T_CMB", default = "default_t_cmb")]
    pub t_cmb: f64,
    /// Effective number of massless neutrino species
    #[serde(rename = "N_nu_rel", default = "default_n_nu_rel")]
    pub n_nu_rel: f64,
    /// Neutrino masses in eV
    #[serde(default)]
    pub m_nu: Vec<f64>,
    #[serde(default)]
    pub bcm: BcmParameters,
}

fn default_w0() -> f64 {
    -1.0
}

fn default_t_cmb() -> f64 {
    T_CMB_DEFAULT
}

fn default_n_nu_rel() -> f64 {
    3.046
}

impl ParameterSet {
    /// Flat ΛCDM input normalized by sigma8, with massless neutrinos.
    pub fn lcdm(omega_c: f64, omega_b: f64, h: f64, n_s: f64, sigma8: f64) -> Self {
        Self {
            h,
            omega_c,
            omega_b,
            omega_k: 0.0,
            n_s,
            a_s: None,
            sigma8: Some(sigma8),
            w0: default_w0(),
            wa: 0.0,
            t_cmb: default_t_cmb(),
            n_nu_rel: default_n_nu_rel(),
            m_nu: Vec::new(),
            bcm: BcmParameters::default(),
        }
    }

    /// Load raw parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PowerError> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader)
            .map_err(|e| PowerError::Configuration(format!("invalid parameter file: {e}")))
    }
}

/// Checked cosmological parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CosmologicalParameters {
    pub h: f64,
    pub omega_c: f64,
    pub omega_b: f64,
    pub omega_k: f64,
    pub n_s: f64,
    pub w0: f64,
    pub wa: f64,
    pub t_cmb: f64,
    pub n_nu_rel: f64,
    /// Masses of the massive species in eV (only strictly positive entries)
    pub m_nu: Vec<f64>,
    pub normalization: Normalization,
    pub bcm: BcmParameters,
    /// Ω of the massive neutrinos today
    pub omega_nu_mass: f64,
    /// Ω_c + Ω_b + Ω_ν,mass
    pub omega_m: f64,
}

impl CosmologicalParameters {
    /// Target sigma8 if the amplitude is fixed that way.
    pub fn sigma8(&self) -> Option<f64> {
        match self.normalization {
            Normalization::Sigma8(s) => Some(s),
            Normalization::As(_) => None,
        }
    }

    /// Primordial amplitude if given directly.
    pub fn a_s(&self) -> Option<f64> {
        match self.normalization {
            Normalization::As(a) => Some(a),
            Normalization::Sigma8(_) => None,
        }
    }

    /// Number of massive neutrino species
    pub fn n_nu_mass(&self) -> usize {
        self.m_nu.len()
    }

    /// Sum of neutrino masses in eV
    pub fn sum_nu_masses(&self) -> f64 {
        self.m_nu.iter().sum()
    }

    /// Dark energy density today, closing the budget with matter and curvature.
    pub fn omega_de(&self) -> f64 {
        1.0 - self.omega_m - self.omega_k
    }

    /// True for a cosmological constant.
    pub fn is_lambda(&self) -> bool {
        self.w0 == -1.0 && self.wa == 0.0
    }
}

impl TryFrom<ParameterSet> for CosmologicalParameters {
    type Error = PowerError;

    fn try_from(raw: ParameterSet) -> Result<Self, Self::Error> {
        let invalid = |what: &str| PowerError::Configuration(format!("invalid {what}"));

        if !(raw.h.is_finite() && raw.h > 0.0) {
            return Err(invalid("h"));
        }
        if !(raw.omega_c.is_finite() && raw.omega_c >= 0.0) {
            return Err(invalid("Omega_c"));
        }
        if !(raw.omega_b.is_finite() && raw.omega_b > 0.0) {
            return Err(invalid("Omega_b"));
        }
        for (name, value) in [
            ("Omega_k", raw.omega_k),
            ("n_s", raw.n_s),
            ("w0", raw.w0),
            ("wa", raw.wa),
        ] {
            if !value.is_finite() {
                return Err(invalid(name));
            }
        }
        if !(raw.t_cmb.is_finite() && raw.t_cmb > 0.0) {
            return Err(invalid("T_CMB"));
        }
        if !(raw.n_nu_rel.is_finite() && raw.n_nu_rel >= 0.0) {
            return Err(invalid("N_nu_rel"));
        }
        if raw.m_nu.iter().any(|m| !(m.is_finite() && *m >= 0.0)) {
            return Err(invalid("neutrino mass"));
        }
        let m_nu: Vec<f64> = raw.m_nu.into_iter().filter(|&m| m > 0.0).collect();
        if m_nu.len() > MAX_NU_SPECIES {
            return Err(PowerError::Configuration(format!(
                "at most {MAX_NU_SPECIES} massive neutrino species are supported, got {}",
                m_nu.len()
            )));
        }

        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        let normalization = match (finite(raw.a_s), finite(raw.sigma8)) {
            (Some(_), Some(_)) => {
                return Err(PowerError::Configuration(
                    "both sigma8 and A_s defined; specify exactly one".into(),
                ))
            }
            (None, None) => {
                return Err(PowerError::Configuration(
                    "neither sigma8 nor A_s defined; specify exactly one".into(),
                ))
            }
            (Some(a_s), None) if a_s > 0.0 => Normalization::As(a_s),
            (None, Some(sigma8)) if sigma8 > 0.0 => Normalization::Sigma8(sigma8),
            _ => return Err(invalid("normalization (must be positive)")),
        };

        let omega_nu_mass = neutrinos::omega_nu_h2(1.0, &m_nu, raw.t_cmb)? / (raw.h * raw.h);
        let omega_m = raw.omega_c + raw.omega_b + omega_nu_mass;

        Ok(Self {
            h: raw.h,
            omega_c: raw.omega_c,
            omega_b: raw.omega_b,
            omega_k: raw.omega_k,
            n_s: raw.n_s,
            w0: raw.w0,
            wa: raw.wa,
            t_cmb: raw.t_cmb,
            n_nu_rel: raw.n_nu_rel,
            m_nu,
            normalization,
            bcm: raw.bcm,
            omega_nu_mass,
            omega_m,
        })
    }
}
