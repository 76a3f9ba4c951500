//! Boltzmann solver backend.
//!
//! Marshals the cosmology into the solver's parameter dictionary, runs the
//! staged pipeline and resamples the solver's P(k, z) onto the (ln k, a)
//! grid of the tables. With sigma8 normalization the solver first runs a
//! cheap trial at a guessed amplitude, and A_s is rescaled once from the
//! sigma8 that trial produced.

use log::info;

use super::{BackendContext, PowerTables};
use crate::config::{MatterPowerMethod, PowerConfig};
use crate::error::PowerError;
use crate::params::{CosmologicalParameters, Normalization};
use crate::power::normalize::{amplitude_guess, corrected_amplitude};
use crate::power::table::{a_grid, ln_k_grid, PowerSpectrumTable};
use crate::solver::{BoltzmannSolver, SolverError, SolverParameters, SolverRun, PARSER_LENGTH};

/// Slot of P_k_max_1/Mpc in the dictionary
pub const K_MAX_SLOT: usize = 2;
/// Slot of the amplitude, always the last one
pub const A_S_SLOT: usize = PARSER_LENGTH - 1;
/// Wavenumber cutoff of the sigma8 trial run (1/Mpc)
pub const TRIAL_K_MAX: f64 = 10.0;
/// N_ur below this counts as no massless species
const MIN_N_UR: f64 = 1e-4;

fn number(value: f64) -> String {
    format!("{value:.15e}")
}

/// Fill the dictionary with everything except the amplitude.
pub fn solver_parameters(params: &CosmologicalParameters, config: &PowerConfig) -> Result<SolverParameters, PowerError> {
    let mut dict = SolverParameters::new();
    let non_linear = if config.matter_power == MatterPowerMethod::Halofit {
        "Halofit"
    } else {
        "none"
    };

    dict.set(0, "output", "mPk")?;
    dict.set(1, "non linear", non_linear)?;
    dict.set(K_MAX_SLOT, "P_k_max_1/Mpc", number(config.spline.k_max_spline))?;
    dict.set(3, "z_max_pk", number(1.0 / config.spline.a_min_log - 1.0))?;
    dict.set(4, "modes", "s")?;
    dict.set(5, "lensing", "no")?;
    dict.set(6, "h", number(params.h))?;
    dict.set(7, "Omega_cdm", number(params.omega_c))?;
    dict.set(8, "Omega_b", number(params.omega_b))?;
    dict.set(9, "Omega_k", number(params.omega_k))?;
    dict.set(10, "n_s", number(params.n_s))?;

    // Dark energy as a fluid; the solver closes the budget with it
    if !params.is_lambda() {
        dict.set(11, "Omega_Lambda", number(0.0))?;
        dict.set(12, "w0_fld", number(params.w0))?;
        dict.set(13, "wa_fld", number(params.wa))?;
    }

    let n_ur = if params.n_nu_rel > MIN_N_UR { params.n_nu_rel } else { 0.0 };
    dict.set(14, "N_ur", number(n_ur))?;
    if params.n_nu_mass() > 0 {
        dict.set(15, "N_ncdm", params.n_nu_mass().to_string())?;
        let masses: Vec<String> = params.m_nu.iter().map(|m| format!("{m:.6}")).collect();
        dict.set(16, "m_ncdm", masses.join(", "))?;
    }
    dict.set(17, "T_cmb", number(params.t_cmb))?;
    Ok(dict)
}

/// A_s to run the solver with.
fn resolve_amplitude(
    solver: &mut dyn BoltzmannSolver,
    dict: &mut SolverParameters,
    params: &CosmologicalParameters,
) -> Result<f64, PowerError> {
    match params.normalization {
        Normalization::As(a_s) => Ok(a_s),
        Normalization::Sigma8(sigma8) => trial_amplitude(solver, dict, sigma8),
    }
}

/// Run the solver once at a guessed amplitude and rescale it to `sigma8`.
///
/// The wavenumber cutoff is lowered for the trial and restored afterwards,
/// whether or not the trial succeeded.
fn trial_amplitude(solver: &mut dyn BoltzmannSolver, dict: &mut SolverParameters, sigma8: f64) -> Result<f64, PowerError> {
    let (name, saved) = dict
        .entry(K_MAX_SLOT)
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .ok_or_else(|| PowerError::Configuration("solver dictionary has no P_k_max slot".into()))?;
    let guess = amplitude_guess(sigma8);
    dict.set(K_MAX_SLOT, &name, number(TRIAL_K_MAX))?;
    dict.set(A_S_SLOT, "A_s", number(guess))?;

    let trial = solver_sigma8(solver, dict);
    dict.set(K_MAX_SLOT, &name, saved)?;

    let obtained = trial?;
    let a_s = corrected_amplitude(guess, sigma8, obtained)?;
    info!("Trial run gave sigma8 = {obtained:.6} at A_s = {guess:.4e}; using A_s = {a_s:.6e}");
    Ok(a_s)
}

fn solver_sigma8(solver: &mut dyn BoltzmannSolver, dict: &SolverParameters) -> Result<f64, PowerError> {
    let run = SolverRun::start(solver, dict)?;
    let sigma8 = run.solver().sigma8().map_err(spectra_error)?;
    run.finish()?;
    Ok(sigma8)
}

fn spectra_error(err: SolverError) -> PowerError {
    PowerError::Backend {
        stage: "spectra".into(),
        message: err.0,
    }
}

/// Natural log of a solver power, rejecting non-positive values.
fn ln_solver_power(result: Result<f64, SolverError>, k: f64, z: f64) -> Result<f64, PowerError> {
    let p = result.map_err(spectra_error)?;
    if !(p.is_finite() && p > 0.0) {
        return Err(spectra_error(SolverError(format!(
            "power {p} at k = {k:e}, z = {z} is not positive"
        ))));
    }
    Ok(p.ln())
}

/// Resample the solver's spectra onto the table grid.
///
/// Both tables start at twice the solver's first wavenumber and end at the
/// configured spline limit. Non-linear power needs the configured k_min to
/// lie inside the solver's range.
fn tabulate(
    solver: &dyn BoltzmannSolver,
    config: &PowerConfig,
    with_nonlinear: bool,
) -> Result<(PowerSpectrumTable, Option<PowerSpectrumTable>), PowerError> {
    let solver_k_min = solver
        .ln_k()
        .first()
        .map(|lk| lk.exp())
        .ok_or_else(|| spectra_error("solver returned an empty k grid".into()))?;
    let k_min = 2.0 * solver_k_min;
    let ln_k = ln_k_grid(&config.spline, k_min, config.spline.k_max_spline)?;
    let a = a_grid(&config.spline)?;

    let linear = PowerSpectrumTable::tabulate(ln_k.clone(), a.clone(), |lk, a| {
        let (k, z) = (lk.exp(), 1.0 / a - 1.0);
        ln_solver_power(solver.pk_linear(k, z), k, z)
    })?;

    if !with_nonlinear {
        return Ok((linear, None));
    }

    let requested_k_min = config.spline.k_min;
    if requested_k_min < solver_k_min {
        return Err(spectra_error(SolverError(format!(
            "k_min = {requested_k_min:e} is below the solver's k_min = {solver_k_min:e}, \
             not supported for non-linear power"
        ))));
    }
    let nonlinear = match config.matter_power {
        MatterPowerMethod::Halofit => PowerSpectrumTable::tabulate(ln_k, a, |lk, a| {
            let (k, z) = (lk.exp(), 1.0 / a - 1.0);
            ln_solver_power(solver.pk_nonlinear(k, z), k, z)
        })?,
        _ => linear.clone(),
    };
    Ok((linear, Some(nonlinear)))
}

/// Run the solver and resample its output.
///
/// With `with_nonlinear` false only the linear table is built.
pub(crate) fn run(
    ctx: &mut BackendContext<'_>,
    with_nonlinear: bool,
) -> Result<(PowerSpectrumTable, Option<PowerSpectrumTable>), PowerError> {
    let mut dict = solver_parameters(ctx.params, ctx.config)?;
    let a_s = resolve_amplitude(&mut *ctx.solver, &mut dict, ctx.params)?;
    dict.set(A_S_SLOT, "A_s", number(a_s))?;

    let run = SolverRun::start(&mut *ctx.solver, &dict)?;
    let tables = tabulate(run.solver(), ctx.config, with_nonlinear)?;
    run.finish()?;
    Ok(tables)
}

pub(crate) fn build(ctx: &mut BackendContext<'_>) -> Result<PowerTables, PowerError> {
    let (linear, nonlinear) = run(ctx, true)?;
    let nonlinear = nonlinear.unwrap_or_else(|| linear.clone());
    Ok(PowerTables { linear, nonlinear })
}
