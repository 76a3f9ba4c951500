//! Non-linear power from an attached emulator.
//!
//! The emulator is an external collaborator trained on a fixed box of
//! cosmologies. The linear table still comes from the Boltzmann solver; the
//! non-linear table is assembled from emulator predictions on its own k
//! modes for redshifts up to z = 2.

use log::{info, warn};
use once_cell::sync::Lazy;

use super::{boltzmann, BackendContext, PowerTables};
use crate::config::EmulatorNeutrinos;
use crate::error::{try_with_capacity, PowerError};
use crate::neutrinos::{equalized_masses, omega_nu_h2};
use crate::params::CosmologicalParameters;
use crate::power::table::{linear_a_grid, PowerSpectrumTable};

/// Number of emulator inputs
pub const EMULATOR_INPUTS: usize = 9;
/// Number of scale factors sampled for the non-linear table
const A_SAMPLES: usize = 40;
/// Relativistic species expected when no neutrino is massive
const N_EFF_MASSLESS: f64 = 3.04;

/// A trained emulator of the non-linear matter power.
pub trait Emulator {
    /// Wavenumbers of the predictions (1/Mpc), increasing.
    fn k_modes(&self) -> &[f64];

    /// Non-linear P(k) in Mpc³ on [`Emulator::k_modes`].
    ///
    /// Inputs are, in order: ω_m, ω_b, σ8, h, n_s, w0, wa, ω_ν and z, with
    /// ω = Ω h².
    fn predict(&self, inputs: &[f64; EMULATOR_INPUTS]) -> Result<Vec<f64>, String>;
}

/// Calibrated region of the emulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmulatorLimits {
    pub h_min: f64,
    pub h_max: f64,
    /// Lower bound on −(w0 + wa)
    pub min_w_sum: f64,
    /// Upper bound on ω_ν
    pub omega_nu_h2_max: f64,
    /// Earliest scale factor
    pub a_min: f64,
    /// Tolerance on N_eff when all neutrinos are massless
    pub n_eff_tolerance: f64,
}

pub static EMULATOR_LIMITS: Lazy<EmulatorLimits> = Lazy::new(|| EmulatorLimits {
    h_min: 0.55,
    h_max: 0.85,
    min_w_sum: 8.1e-3,
    omega_nu_h2_max: 0.01,
    a_min: 1.0 / 3.0,
    n_eff_tolerance: 1e-6,
});

fn out_of_bounds(message: String) -> PowerError {
    PowerError::EmulatorBounds(message)
}

/// Check a cosmology against [`EMULATOR_LIMITS`] and return the ω_ν to use.
///
/// With [`EmulatorNeutrinos::Equalize`] unequal masses are replaced by three
/// copies of their mean before ω_ν is computed.
pub fn check_cosmology(params: &CosmologicalParameters, neutrinos: EmulatorNeutrinos) -> Result<f64, PowerError> {
    let limits = &*EMULATOR_LIMITS;
    let h2 = params.h * params.h;

    if params.h < limits.h_min || params.h > limits.h_max {
        return Err(out_of_bounds(format!(
            "h = {} outside [{}, {}]",
            params.h, limits.h_min, limits.h_max
        )));
    }
    if -params.w0 - params.wa < limits.min_w_sum {
        return Err(out_of_bounds(format!(
            "-(w0 + wa) = {} below {}",
            -params.w0 - params.wa,
            limits.min_w_sum
        )));
    }
    if params.omega_nu_mass * h2 > limits.omega_nu_h2_max {
        return Err(out_of_bounds(format!(
            "omega_nu h^2 = {:.4e} above {}",
            params.omega_nu_mass * h2,
            limits.omega_nu_h2_max
        )));
    }

    if params.n_nu_mass() == 0 {
        if (params.n_nu_rel - N_EFF_MASSLESS).abs() > limits.n_eff_tolerance {
            return Err(out_of_bounds(format!(
                "N_eff = {} but the emulator assumes {N_EFF_MASSLESS} massless species",
                params.n_nu_rel
            )));
        }
        return Ok(0.0);
    }

    let m = &params.m_nu;
    let equal = m.len() == 3 && m.iter().all(|&mi| mi == m[0]);
    match neutrinos {
        _ if equal => Ok(params.omega_nu_mass * h2),
        EmulatorNeutrinos::Strict => Err(out_of_bounds(format!(
            "massive neutrinos must be three equal masses, got {m:?} eV"
        ))),
        EmulatorNeutrinos::Equalize => {
            let masses = equalized_masses(m);
            warn!(
                "Emulator needs equal neutrino masses; using 3 x {:.6} eV instead of {m:?}",
                masses[0]
            );
            omega_nu_h2(1.0, &masses, params.t_cmb)
        }
    }
}

/// Input vector for one redshift.
pub fn emulator_inputs(params: &CosmologicalParameters, sigma8: f64, omega_nu: f64, z: f64) -> [f64; EMULATOR_INPUTS] {
    let h2 = params.h * params.h;
    [
        (params.omega_c + params.omega_b) * h2,
        params.omega_b * h2,
        sigma8,
        params.h,
        params.n_s,
        params.w0,
        params.wa,
        omega_nu,
        z,
    ]
}

/// Queries before the emulator's earliest scale factor are rejected.
pub fn check_scale_factor(a: f64) -> Result<(), PowerError> {
    let a_min = EMULATOR_LIMITS.a_min;
    if a < a_min {
        return Err(out_of_bounds(format!(
            "a = {a} before the emulator's earliest scale factor {a_min:.4}"
        )));
    }
    Ok(())
}

fn nonlinear_table(
    emulator: &dyn Emulator,
    params: &CosmologicalParameters,
    sigma8: f64,
    omega_nu: f64,
) -> Result<PowerSpectrumTable, PowerError> {
    let k_modes = emulator.k_modes();
    let mut ln_k = try_with_capacity("emulator k modes", k_modes.len())?;
    ln_k.extend(k_modes.iter().map(|k| k.ln()));
    let a = linear_a_grid(EMULATOR_LIMITS.a_min, 1.0, A_SAMPLES)?;

    let mut values = try_with_capacity("emulator power", ln_k.len() * a.len())?;
    for &aj in &a {
        let z = 1.0 / aj - 1.0;
        let inputs = emulator_inputs(params, sigma8, omega_nu, z);
        let prediction = emulator.predict(&inputs).map_err(PowerError::Emulator)?;
        if prediction.len() != ln_k.len() {
            return Err(PowerError::Emulator(format!(
                "expected {} power values at z = {z:.4}, got {}",
                ln_k.len(),
                prediction.len()
            )));
        }
        for (p, k) in prediction.iter().zip(k_modes) {
            if !(p.is_finite() && *p > 0.0) {
                return Err(PowerError::Emulator(format!(
                    "non-positive power {p} at k = {k:e}, z = {z:.4}"
                )));
            }
            values.push(p.ln());
        }
    }
    PowerSpectrumTable::from_flat(ln_k, a, values)
}

pub(crate) fn build(ctx: &mut BackendContext<'_>) -> Result<PowerTables, PowerError> {
    let sigma8 = ctx
        .params
        .sigma8()
        .ok_or_else(|| PowerError::Configuration("the emulator requires sigma8 normalization".into()))?;
    let emulator = ctx
        .emulator
        .ok_or_else(|| PowerError::Configuration("no emulator attached to this cosmology".into()))?;
    let omega_nu = check_cosmology(ctx.params, ctx.config.emulator_neutrinos)?;

    let (linear, _) = boltzmann::run(ctx, false)?;
    let nonlinear = nonlinear_table(emulator, ctx.params, sigma8, omega_nu)?;
    info!(
        "Emulated non-linear power on {} k modes for z <= {:.1}",
        nonlinear.ln_k().len(),
        1.0 / EMULATOR_LIMITS.a_min - 1.0
    );
    Ok(PowerTables { linear, nonlinear })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSet;

    fn params(raw: ParameterSet) -> CosmologicalParameters {
        CosmologicalParameters::try_from(raw).unwrap()
    }

    fn base() -> ParameterSet {
        let mut raw = ParameterSet::lcdm(0.25, 0.05, 0.7, 0.96, 0.8);
        raw.n_nu_rel = 3.04;
        raw
    }

    #[test]
    fn test_massless_cosmology_accepted() {
        assert_eq!(check_cosmology(&params(base()), EmulatorNeutrinos::Strict), Ok(0.0));
    }

    #[test]
    fn test_hubble_out_of_range() {
        let mut raw = base();
        raw.h = 0.5;
        let err = check_cosmology(&params(raw), EmulatorNeutrinos::Strict).unwrap_err();
        assert!(matches!(err, PowerError::EmulatorBounds(_)));
    }

    #[test]
    fn test_phantom_crossing_rejected() {
        let mut raw = base();
        raw.w0 = -0.5;
        raw.wa = 0.495;
        assert!(check_cosmology(&params(raw), EmulatorNeutrinos::Strict).is_err());
    }

    #[test]
    fn test_wrong_neff_rejected() {
        let mut raw = base();
        raw.n_nu_rel = 3.046;
        assert!(matches!(
            check_cosmology(&params(raw), EmulatorNeutrinos::Strict),
            Err(PowerError::EmulatorBounds(_))
        ));
    }

    #[test]
    fn test_unequal_masses() {
        let mut raw = base();
        raw.m_nu = vec![0.01, 0.02, 0.03];
        let p = params(raw);
        assert!(check_cosmology(&p, EmulatorNeutrinos::Strict).is_err());

        let omega_nu = check_cosmology(&p, EmulatorNeutrinos::Equalize).unwrap();
        let expected = omega_nu_h2(1.0, &[0.02; 3], p.t_cmb).unwrap();
        approx::assert_relative_eq!(omega_nu, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_input_order() {
        let p = params(base());
        let inputs = emulator_inputs(&p, 0.8, 0.0, 0.5);
        approx::assert_relative_eq!(inputs[0], 0.30 * 0.49, epsilon = 1e-12);
        approx::assert_relative_eq!(inputs[1], 0.05 * 0.49, epsilon = 1e-12);
        assert_eq!(&inputs[2..], &[0.8, 0.7, 0.96, -1.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_early_times_rejected() {
        assert!(check_scale_factor(0.3).is_err());
        assert!(check_scale_factor(0.5).is_ok());
    }
}
