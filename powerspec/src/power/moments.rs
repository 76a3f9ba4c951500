//! Spectral moments of the linear power spectrum.
//!
//! σ²(R) = (1 / 2π²) ∫ P(k) k³ W²(kR) d ln k
//!
//! integrated in log10 k over the linear table's k range, with the
//! velocity analogue weighting P(k) k / 3 instead of P(k) k³.

use std::f64::consts::{LN_10, PI};

use log::warn;

use super::extrapolation::ln_power;
use super::table::PowerSpectrumTable;
use crate::algo::quadrature::{integrate, QuadratureOptions, QuadratureResult};
use crate::error::{ComputationStatus, PowerError};

/// Which moment of the smoothed field to integrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentKind {
    /// Density variance, weight k³
    Density,
    /// Displacement variance, weight k / 3
    Velocity,
}

impl MomentKind {
    pub fn name(self) -> &'static str {
        match self {
            MomentKind::Density => "sigma_R",
            MomentKind::Velocity => "sigma_V",
        }
    }

    fn weight(self, k: f64) -> f64 {
        match self {
            MomentKind::Density => k * k * k,
            MomentKind::Velocity => k / 3.0,
        }
    }
}

/// Fourier transform of a spherical top-hat, W(x) = 3 (sin x − x cos x) / x³.
///
/// Below x = 0.1 the closed form loses precision to cancellation, so its
/// Maclaurin series to O(x⁸) is used instead.
pub fn w_tophat(x: f64) -> f64 {
    let x2 = x * x;
    if x < 0.1 {
        1.0 + x2 * (-0.1 + x2 * (0.003_561_429 + x2 * (-6.613_76e-5 + x2 * 7.515_63e-7)))
    } else {
        3.0 * (x.sin() - x * x.cos()) / (x2 * x)
    }
}

/// Integrate the moment at a = 1 and return the raw quadrature result.
///
/// Convert with [`sigma_from_integral`]; non-convergence is reported through
/// `converged` and left to the caller.
pub fn moment_integral(
    table: &PowerSpectrumTable,
    n_s: f64,
    radius: f64,
    kind: MomentKind,
    options: &QuadratureOptions,
) -> Result<QuadratureResult, PowerError> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(PowerError::Configuration(format!(
            "smoothing radius must be positive, got {radius}"
        )));
    }
    let lower = table.k_min().log10();
    let upper = table.k_max().log10();

    integrate(
        |log10_k: f64| -> Result<f64, PowerError> {
            let k = 10f64.powf(log10_k);
            let power = ln_power(table, k.ln(), 1.0, n_s)?.exp();
            let w = w_tophat(k * radius);
            Ok(power * kind.weight(k) * w * w)
        },
        lower,
        upper,
        options,
    )
}

/// σ at a = 1 from the log10-k integral.
pub fn sigma_from_integral(integral: f64) -> f64 {
    (integral * LN_10 / (2.0 * PI * PI)).sqrt()
}

/// σ at a = 1 for smoothing radius `radius` (Mpc).
///
/// A quadrature that misses its tolerance still yields its best estimate
/// and is counted as an integration warning.
pub(crate) fn sigma_today(
    table: &PowerSpectrumTable,
    n_s: f64,
    radius: f64,
    kind: MomentKind,
    options: &QuadratureOptions,
    status: &mut ComputationStatus,
) -> Result<f64, PowerError> {
    let result = moment_integral(table, n_s, radius, kind, options)?;
    if !result.converged {
        let message = format!(
            "{} integral at R = {radius:.3} Mpc stopped at {} intervals with relative error {:.2e}",
            kind.name(),
            result.intervals,
            result.abs_error / result.value.abs()
        );
        warn!("{message}");
        status.integration_warning(message);
    }
    Ok(sigma_from_integral(result.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn closed_form(x: f64) -> f64 {
        3.0 * (x.sin() - x * x.cos()) / (x * x * x)
    }

    #[test]
    fn test_window_at_origin() {
        assert_eq!(w_tophat(0.0), 1.0);
    }

    #[test]
    fn test_series_matches_closed_form_at_switch() {
        assert_relative_eq!(w_tophat(0.1 - 1e-12), closed_form(0.1), epsilon = 1e-6);
        assert_relative_eq!(w_tophat(0.1), closed_form(0.1), epsilon = 1e-12);
        assert_relative_eq!(w_tophat(0.05), closed_form(0.05), epsilon = 1e-6);
    }

    #[test]
    fn test_window_first_zero() {
        // tan x = x at x ≈ 4.4934
        assert!(w_tophat(4.4934).abs() < 1e-4);
    }

    #[test]
    fn test_power_law_moment() {
        // P = k^-3 turns the density integrand into W²(kR) alone
        let ln_k: Vec<f64> = (0..=400).map(|i| (-4.0 + 0.02 * i as f64) * LN_10).collect();
        let table = PowerSpectrumTable::tabulate(ln_k, vec![0.5, 1.0], |lk, _| Ok(-3.0 * lk)).unwrap();
        let options = QuadratureOptions {
            epsrel: 1e-8,
            ..Default::default()
        };

        let result = moment_integral(&table, 0.96, 1.0, MomentKind::Density, &options).unwrap();
        assert!(result.converged);

        // Same integral by brute-force trapezoid in ln k
        let n = 200_000;
        let (lo, hi) = (table.ln_k_min(), table.ln_k_max());
        let step = (hi - lo) / n as f64;
        let trapezoid: f64 = (0..=n)
            .map(|i| {
                let w = w_tophat((lo + step * i as f64).exp());
                let edge = if i == 0 || i == n { 0.5 } else { 1.0 };
                edge * w * w * step
            })
            .sum();
        assert_relative_eq!(result.value * LN_10, trapezoid, max_relative = 1e-5);
    }

    #[test]
    fn test_rejects_bad_radius() {
        let table = PowerSpectrumTable::tabulate(vec![0.0, 1.0], vec![0.5, 1.0], |_, _| Ok(0.0)).unwrap();
        let options = QuadratureOptions::default();
        assert!(moment_integral(&table, 1.0, 0.0, MomentKind::Velocity, &options).is_err());
    }
}
