//! Background cosmology: expansion history and linear growth.
//!
//! The power spectrum engine only needs the linear growth factor, so the
//! collaborator is the small [`Background`] trait. [`LinearGrowth`] is the
//! built-in implementation; it integrates the growth equation once for a
//! w0–wa dark energy model with curvature and keeps a spline of ln D(ln a).

use log::debug;

use crate::algo::spacing::linear_spacing;
use crate::algo::spline::CubicSpline;
use crate::error::PowerError;
use crate::params::CosmologicalParameters;

/// Supplies the linear growth factor.
pub trait Background {
    /// Growth factor normalized to 1 at a = 1.
    fn growth_factor(&self, a: f64) -> Result<f64, PowerError>;

    /// Growth factor normalized to D = a deep in matter domination.
    fn growth_factor_unnormalized(&self, a: f64) -> Result<f64, PowerError>;
}

/// Density parameters today that fix the late-time expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Densities {
    /// Total matter, including massive neutrinos
    pub omega_m: f64,
    pub omega_k: f64,
    pub omega_de: f64,
    pub w0: f64,
    pub wa: f64,
}

impl From<&CosmologicalParameters> for Densities {
    fn from(params: &CosmologicalParameters) -> Self {
        Self {
            omega_m: params.omega_m,
            omega_k: params.omega_k,
            omega_de: params.omega_de(),
            w0: params.w0,
            wa: params.wa,
        }
    }
}

impl Densities {
    /// Dark energy equation of state w(a) = w0 + wa (1 - a).
    pub fn w(&self, a: f64) -> f64 {
        self.w0 + self.wa * (1.0 - a)
    }

    fn dark_energy_scaling(&self, a: f64) -> f64 {
        a.powf(-3.0 * (1.0 + self.w0 + self.wa)) * (-3.0 * self.wa * (1.0 - a)).exp()
    }

    /// E²(a) = H²(a) / H0².
    pub fn e2(&self, a: f64) -> f64 {
        self.omega_m / (a * a * a)
            + self.omega_k / (a * a)
            + self.omega_de * self.dark_energy_scaling(a)
    }

    /// d ln E² / d ln a
    fn dln_e2(&self, a: f64) -> f64 {
        let de = self.omega_de * self.dark_energy_scaling(a);
        (-3.0 * self.omega_m / (a * a * a) - 2.0 * self.omega_k / (a * a) - 3.0 * (1.0 + self.w(a)) * de)
            / self.e2(a)
    }

    /// Matter density parameter at scale factor `a`.
    pub fn omega_m_at(&self, a: f64) -> f64 {
        self.omega_m / (a * a * a) / self.e2(a)
    }

    /// Dark energy density parameter at scale factor `a`.
    pub fn omega_de_at(&self, a: f64) -> f64 {
        self.omega_de * self.dark_energy_scaling(a) / self.e2(a)
    }
}

/// Scale factor where the growth integration starts
const A_START: f64 = 1e-4;
/// RK4 steps between A_START and a = 1
const GROWTH_STEPS: usize = 2000;

/// Linear growth factor from direct integration of
///
/// D'' + (2 + ½ d ln E²/d ln a) D' = (3/2) Ω_m(a) D,   ' = d/d ln a
///
/// starting from the matter-dominated solution D = a.
#[derive(Debug, Clone)]
pub struct LinearGrowth {
    densities: Densities,
    ln_growth: CubicSpline,
    growth_today: f64,
}

impl LinearGrowth {
    /// Integrate the growth equation for the given parameters.
    pub fn new(params: &CosmologicalParameters) -> Result<Self, PowerError> {
        Self::from_densities(Densities::from(params))
    }

    /// Integrate the growth equation for explicit density parameters.
    pub fn from_densities(densities: Densities) -> Result<Self, PowerError> {
        let ln_a = linear_spacing(A_START.ln(), 0.0, GROWTH_STEPS + 1)
            .ok_or_else(|| PowerError::Background("invalid growth grid".into()))?;

        for &x in &ln_a {
            let e2 = densities.e2(x.exp());
            if !(e2.is_finite() && e2 > 0.0) {
                return Err(PowerError::Background(format!(
                    "H²(a) is not positive at a = {:.4e}",
                    x.exp()
                )));
            }
        }

        let rhs = |x: f64, d: f64, dp: f64| -> (f64, f64) {
            let a = x.exp();
            let friction = 2.0 + 0.5 * densities.dln_e2(a);
            (dp, -friction * dp + 1.5 * densities.omega_m_at(a) * d)
        };

        let mut d = A_START;
        let mut dp = A_START;
        let mut ln_d = Vec::with_capacity(ln_a.len());
        ln_d.push(d.ln());

        for window in ln_a.windows(2) {
            let (x, step) = (window[0], window[1] - window[0]);
            let (k1d, k1p) = rhs(x, d, dp);
            let (k2d, k2p) = rhs(x + 0.5 * step, d + 0.5 * step * k1d, dp + 0.5 * step * k1p);
            let (k3d, k3p) = rhs(x + 0.5 * step, d + 0.5 * step * k2d, dp + 0.5 * step * k2p);
            let (k4d, k4p) = rhs(x + step, d + step * k3d, dp + step * k3p);
            d += step / 6.0 * (k1d + 2.0 * k2d + 2.0 * k3d + k4d);
            dp += step / 6.0 * (k1p + 2.0 * k2p + 2.0 * k3p + k4p);

            if !(d.is_finite() && d > 0.0) {
                return Err(PowerError::Background(format!(
                    "growth factor became non-positive at a = {:.4e}",
                    (x + step).exp()
                )));
            }
            ln_d.push(d.ln());
        }

        let growth_today = d;
        let ln_growth = CubicSpline::new(ln_a, ln_d)?;
        debug!(
            "Linear growth integrated: D(a=1) = {growth_today:.6} (Ω_m = {:.4})",
            densities.omega_m
        );

        Ok(Self {
            densities,
            ln_growth,
            growth_today,
        })
    }

    /// Density parameters this growth history was integrated for.
    pub fn densities(&self) -> &Densities {
        &self.densities
    }
}

impl Background for LinearGrowth {
    fn growth_factor(&self, a: f64) -> Result<f64, PowerError> {
        Ok(self.growth_factor_unnormalized(a)? / self.growth_today)
    }

    fn growth_factor_unnormalized(&self, a: f64) -> Result<f64, PowerError> {
        if !(a > 0.0 && a <= 1.0) {
            return Err(PowerError::Background(format!(
                "scale factor {a} outside (0, 1]"
            )));
        }
        if a < A_START {
            return Ok(a);
        }
        let ln_d = self
            .ln_growth
            .evaluate(a.ln())
            .map_err(|e| PowerError::Background(e.to_string()))?;
        Ok(ln_d.exp())
    }
}
