//! Halofit non-linear power spectrum with the Takahashi et al. (2012) fit.
//!
//! The non-linear scale, effective index and curvature come from the
//! Gaussian-smoothed variance of the linear spectrum today,
//!
//! σ²(R) = ∫ Δ²_L(k) exp(−k²R²) d ln k,
//!
//! tabulated once as a spline of ln σ² in ln R. At other epochs σ² scales
//! with the square of the growth factor.

use std::convert::Infallible;
use std::f64::consts::PI;

use crate::algo::quadrature::{integrate, QuadratureOptions};
use crate::algo::spacing::linear_spacing;
use crate::algo::spline::CubicSpline;
use crate::background::Densities;

use super::SolverError;

/// Smallest smoothing radius in the σ² table (Mpc)
const R_MIN: f64 = 1e-3;
/// Largest smoothing radius in the σ² table (Mpc)
const R_MAX: f64 = 1e2;
const R_POINTS: usize = 200;
/// Lower integration bound in k (1/Mpc)
const K_FLOOR: f64 = 1e-5;
const ROOT_TOLERANCE: f64 = 1e-10;
const MAX_BISECTIONS: usize = 200;

/// Non-linear scale and local shape of σ² at one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearScale {
    /// 1 / R where σ(R) = 1 (1/Mpc)
    pub k_sigma: f64,
    /// Effective spectral index n_eff
    pub n_eff: f64,
    /// Spectral curvature C
    pub curvature: f64,
}

/// Gaussian-filtered variance of a linear spectrum, ready for halofit.
#[derive(Debug, Clone)]
pub struct Halofit {
    ln_sigma2: CubicSpline,
}

impl Halofit {
    /// Tabulate σ²(R) for the linear power today, `linear_power(k)` in Mpc³.
    pub fn new<F>(linear_power: F) -> Result<Self, SolverError>
    where
        F: Fn(f64) -> f64,
    {
        let ln_r = linear_spacing(R_MIN.ln(), R_MAX.ln(), R_POINTS)
            .ok_or_else(|| SolverError::from("invalid halofit radius grid"))?;
        let options = QuadratureOptions {
            epsabs: 0.0,
            epsrel: 1e-7,
            limit: 1000,
        };

        let mut ln_sigma2 = Vec::with_capacity(ln_r.len());
        for &lr in &ln_r {
            let r = lr.exp();
            let result = integrate(
                |ln_k: f64| -> Result<f64, Infallible> {
                    let k = ln_k.exp();
                    let delta2 = k * k * k * linear_power(k) / (2.0 * PI * PI);
                    Ok(delta2 * (-k * k * r * r).exp())
                },
                K_FLOOR.ln(),
                (10.0 / r).ln(),
                &options,
            );
            let sigma2 = match result {
                Ok(r) => r.value,
                Err(never) => match never {},
            };
            if !(sigma2.is_finite() && sigma2 > 0.0) {
                return Err(SolverError(format!("sigma²(R = {r:.3e} Mpc) = {sigma2} is not positive")));
            }
            ln_sigma2.push(sigma2.ln());
        }

        let ln_sigma2 = CubicSpline::new(ln_r, ln_sigma2).map_err(|e| SolverError(e.to_string()))?;
        Ok(Self { ln_sigma2 })
    }

    fn ln_sigma2(&self, ln_r: f64) -> Result<f64, SolverError> {
        self.ln_sigma2.evaluate(ln_r).map_err(|e| SolverError(e.to_string()))
    }

    /// Non-linear scale when linear power is scaled by `growth²`.
    ///
    /// `None` when σ stays below one on every tabulated scale, in which
    /// case the spectrum is linear.
    pub fn scale(&self, growth: f64) -> Result<Option<NonlinearScale>, SolverError> {
        let offset = 2.0 * growth.ln();
        let (mut lo, mut hi) = (self.ln_sigma2.x_min(), self.ln_sigma2.x_max());
        if self.ln_sigma2(lo)? + offset < 0.0 {
            return Ok(None);
        }
        if self.ln_sigma2(hi)? + offset > 0.0 {
            return Err(SolverError(format!(
                "non-linear scale beyond R = {R_MAX} Mpc (growth {growth:.4})"
            )));
        }

        // ln σ² decreases with R
        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if self.ln_sigma2(mid)? + offset > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < ROOT_TOLERANCE {
                break;
            }
        }
        let ln_r = 0.5 * (lo + hi);

        let slope = self.ln_sigma2.derivative(ln_r).map_err(|e| SolverError(e.to_string()))?;
        let curvature = self
            .ln_sigma2
            .second_derivative(ln_r)
            .map_err(|e| SolverError(e.to_string()))?;

        Ok(Some(NonlinearScale {
            k_sigma: (-ln_r).exp(),
            n_eff: -3.0 - slope,
            curvature: -curvature,
        }))
    }

    /// Non-linear power at `k` (1/Mpc) from the linear power `p_linear` at
    /// the same k and epoch.
    ///
    /// # Arguments
    /// * `growth` - D(a) / D(1), fixes the non-linear scale
    /// * `densities` - Density parameters today
    /// * `a` - Scale factor, for Ω_m(a), Ω_de(a) and w(a)
    pub fn nonlinear_power(
        &self,
        k: f64,
        p_linear: f64,
        growth: f64,
        densities: &Densities,
        a: f64,
    ) -> Result<f64, SolverError> {
        let Some(scale) = self.scale(growth)? else {
            return Ok(p_linear);
        };
        let delta2_linear = k * k * k * p_linear / (2.0 * PI * PI);
        let delta2 = takahashi(
            delta2_linear,
            k / scale.k_sigma,
            &scale,
            densities.omega_m_at(a),
            densities.omega_de_at(a),
            densities.w(a),
        );
        Ok(2.0 * PI * PI * delta2 / (k * k * k))
    }
}

/// Δ²_NL = Δ²_Q + Δ²_H from the Takahashi et al. (2012) coefficients.
fn takahashi(delta2_linear: f64, y: f64, scale: &NonlinearScale, omega_m: f64, omega_de: f64, w: f64) -> f64 {
    let n = scale.n_eff;
    let c = scale.curvature;
    let de = omega_de * (1.0 + w);

    let an = 10f64.powf(
        1.5222 + 2.8553 * n + 2.3706 * n * n + 0.9903 * n.powi(3) + 0.2250 * n.powi(4) - 0.6038 * c + 0.1749 * de,
    );
    let bn = 10f64.powf(-0.5642 + 0.5864 * n + 0.5716 * n * n - 1.5474 * c + 0.2279 * de);
    let cn = 10f64.powf(0.3698 + 2.0404 * n + 0.8161 * n * n + 0.5869 * c);
    let gamma = 0.1971 - 0.0843 * n + 0.8460 * c;
    let alpha = (6.0835 + 1.3373 * n - 0.1959 * n * n - 5.5274 * c).abs();
    let beta = 2.0379 - 0.7354 * n + 0.3157 * n * n + 1.2490 * n.powi(3) + 0.3980 * n.powi(4) - 0.1682 * c;
    let nu = 10f64.powf(5.2105 + 3.6902 * n);

    let f1 = omega_m.powf(-0.0307);
    let f2 = omega_m.powf(-0.0585);
    let f3 = omega_m.powf(0.0743);

    // Two-halo term
    let fy = y / 4.0 + y * y / 8.0;
    let quasi_linear = delta2_linear * (1.0 + delta2_linear).powf(beta) / (1.0 + alpha * delta2_linear) * (-fy).exp();

    // One-halo term
    let halo_prime = an * y.powf(3.0 * f1) / (1.0 + bn * y.powf(f2) + (cn * f3 * y).powf(3.0 - gamma));
    let halo = halo_prime / (1.0 + nu / (y * y));

    quasi_linear + halo
}
