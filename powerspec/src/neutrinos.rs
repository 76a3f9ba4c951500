//! Massive neutrino energy densities.
//!
//! The Fermi–Dirac phase-space integral
//!
//! F(μ) = (15/π⁴) ∫₀^∞ x² √(x² + μ²) / (eˣ + 1) dx,   μ = m / T_ν
//!
//! is tabulated once per process in ln μ and reused by every density
//! evaluation. F → 7/8 for relativistic species and F ≈ 0.2777 μ for
//! non-relativistic ones.

use once_cell::sync::Lazy;
use std::convert::Infallible;
use std::f64::consts::PI;

use crate::algo::quadrature::{integrate, QuadratureOptions};
use crate::algo::spacing::linear_spacing;
use crate::algo::spline::{CubicSpline, SplineError};
use crate::constants::{SI, T_NCDM};
use crate::error::PowerError;

/// Lower end of the tabulated m/T range
pub const MNU_T_MIN: f64 = 1e-4;
/// Upper end of the tabulated m/T range
pub const MNU_T_MAX: f64 = 500.0;
/// Number of tabulated points
pub const MNU_T_POINTS: usize = 1000;

/// Relativistic limit of the normalized phase-space integral
const RELATIVISTIC_LIMIT: f64 = 7.0 / 8.0;
/// Slope of the normalized integral in the non-relativistic limit, 45 ζ(3) / (2 π⁴)
const NON_RELATIVISTIC_SLOPE: f64 = 0.277_656_633_7;

/// 8π⁵ k⁴ / (15 h³ c³) × 8πG / (3 (100 km/s/Mpc)² c²): turns T_ν⁴ F into Ω_ν h².
static NU_CONST: Lazy<f64> = Lazy::new(|| {
    let h100 = 100.0 * 1000.0 / SI::MPC;
    8.0 * PI.powi(5) * (SI::BOLTZMANN / SI::PLANCK).powi(3) * SI::BOLTZMANN
        / (15.0 * SI::SPEED_OF_LIGHT.powi(3))
        * (8.0 * PI * SI::GRAVITATION)
        / (3.0 * h100 * h100 * SI::SPEED_OF_LIGHT * SI::SPEED_OF_LIGHT)
});

/// F(μ) tabulated against ln μ.
static PHASE_SPACE: Lazy<Result<CubicSpline, SplineError>> = Lazy::new(build_phase_space);

fn build_phase_space() -> Result<CubicSpline, SplineError> {
    let ln_mu = linear_spacing(MNU_T_MIN.ln(), MNU_T_MAX.ln(), MNU_T_POINTS).ok_or(SplineError::TooFewPoints {
        axis: "ln(m/T)",
        len: 0,
        required: 2,
    })?;
    let values: Vec<f64> = ln_mu.iter().map(|&l| phase_space_integral(l.exp())).collect();
    CubicSpline::new(ln_mu, values)
}

fn phase_space_integral(mu: f64) -> f64 {
    let options = QuadratureOptions {
        epsabs: 0.0,
        epsrel: 1e-9,
        limit: 1000,
    };
    // The integrand is below 1e-40 beyond x = 100 for every tabulated mass
    let result = integrate(
        |x: f64| -> Result<f64, Infallible> {
            Ok(x * x * (x * x + mu * mu).sqrt() / (x.exp() + 1.0))
        },
        0.0,
        100.0,
        &options,
    );
    match result {
        Ok(r) => 15.0 / PI.powi(4) * r.value,
        Err(never) => match never {},
    }
}

/// Normalized phase-space integral F(m/T).
///
/// # Errors
/// `PowerError::SplineConstruction` if the process-wide table could not be
/// built.
pub fn phase_space(mass_over_temperature: f64) -> Result<f64, PowerError> {
    if mass_over_temperature < MNU_T_MIN {
        return Ok(RELATIVISTIC_LIMIT);
    }
    if mass_over_temperature > MNU_T_MAX {
        return Ok(NON_RELATIVISTIC_SLOPE * mass_over_temperature);
    }
    let table = PHASE_SPACE
        .as_ref()
        .map_err(|e| PowerError::SplineConstruction(e.clone()))?;
    let ln_mu = mass_over_temperature.ln().clamp(table.x_min(), table.x_max());
    table.evaluate(ln_mu).map_err(PowerError::evaluation)
}

/// Ω_ν h² of a set of massive neutrinos at scale factor `a`.
///
/// # Arguments
/// * `a` - Scale factor
/// * `masses` - Neutrino masses in eV; zero entries contribute nothing
/// * `t_cmb` - CMB temperature in K
pub fn omega_nu_h2(a: f64, masses: &[f64], t_cmb: f64) -> Result<f64, PowerError> {
    let t_nu_eff = t_cmb * T_NCDM;
    let prefactor = *NU_CONST * t_nu_eff.powi(4) / a.powi(4);

    masses
        .iter()
        .filter(|&&m| m > 0.0)
        .map(|&m| {
            let mass_over_t = m * SI::EV / (SI::BOLTZMANN * t_nu_eff / a);
            phase_space(mass_over_t).map(|f| prefactor * f)
        })
        .sum()
}

/// Three equal masses with the same sum as `masses`.
pub fn equalized_masses(masses: &[f64]) -> [f64; 3] {
    let mean = masses.iter().sum::<f64>() / 3.0;
    [mean; 3]
}
