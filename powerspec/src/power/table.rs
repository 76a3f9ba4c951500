//! Interpolation tables of ln P over (ln k, a).

use log::debug;
use ndarray::Array2;

use crate::algo::bicubic::BicubicSpline;
use crate::algo::spacing::{linear_spacing, linlog_spacing, log_spacing, points_for_decades};
use crate::config::SplineConfig;
use crate::error::{try_with_capacity, PowerError};

/// Bicubic table of ln P(k, a) in ln k and a.
///
/// Built once and never modified. Evaluation outside the sampled range is
/// an error; the extrapolation rules live in [`super::extrapolation`].
#[derive(Debug, Clone)]
pub struct PowerSpectrumTable {
    spline: BicubicSpline,
}

impl PowerSpectrumTable {
    /// Build a table from `values[[j, i]] = ln P(k_i, a_j)`.
    pub fn new(ln_k: Vec<f64>, a: Vec<f64>, values: Array2<f64>) -> Result<Self, PowerError> {
        let spline = BicubicSpline::new(ln_k, a, values)?;
        Ok(Self { spline })
    }

    /// Build a table from a flat buffer where sample (i, j) sits at `j * nk + i`.
    pub fn from_flat(ln_k: Vec<f64>, a: Vec<f64>, values: Vec<f64>) -> Result<Self, PowerError> {
        let shape = (a.len(), ln_k.len());
        let data_len = values.len();
        let values = Array2::from_shape_vec(shape, values).map_err(|_| {
            crate::algo::spline::SplineError::DimensionMismatch {
                nx: shape.1,
                ny: shape.0,
                data_len,
            }
        })?;
        Self::new(ln_k, a, values)
    }

    /// Sample `ln_power(ln_k, a)` on the grid and build the table.
    pub fn tabulate<F>(ln_k: Vec<f64>, a: Vec<f64>, mut ln_power: F) -> Result<Self, PowerError>
    where
        F: FnMut(f64, f64) -> Result<f64, PowerError>,
    {
        let (nk, na) = (ln_k.len(), a.len());
        let mut values = try_with_capacity("power spectrum samples", nk * na)?;
        for &aj in &a {
            for &lk in &ln_k {
                values.push(ln_power(lk, aj)?);
            }
        }
        debug!("Tabulated ln P on {nk} x {na} grid");
        Self::from_flat(ln_k, a, values)
    }

    /// Build a table whose samples separate as `ln_p[i] + ln_growth_sq[j]`.
    ///
    /// This is the shape of every analytic spectrum: a fixed ln P(k) moved
    /// up and down by 2 ln D(a).
    pub fn from_separable(
        ln_k: Vec<f64>,
        a: Vec<f64>,
        ln_p: &[f64],
        ln_growth_sq: &[f64],
    ) -> Result<Self, PowerError> {
        let (nk, na) = (ln_k.len(), a.len());
        if ln_p.len() != nk || ln_growth_sq.len() != na {
            return Err(crate::algo::spline::SplineError::DimensionMismatch {
                nx: nk,
                ny: na,
                data_len: ln_p.len() * ln_growth_sq.len(),
            }
            .into());
        }
        let mut values = try_with_capacity("power spectrum samples", nk * na)?;
        for g2 in ln_growth_sq {
            values.extend(ln_p.iter().map(|lp| lp + g2));
        }
        Self::from_flat(ln_k, a, values)
    }

    /// ln P at a grid-interior point.
    pub fn evaluate(&self, ln_k: f64, a: f64) -> Result<f64, PowerError> {
        self.spline.evaluate(ln_k, a).map_err(PowerError::evaluation)
    }

    /// ∂ ln P / ∂ ln k
    pub fn deriv_ln_k(&self, ln_k: f64, a: f64) -> Result<f64, PowerError> {
        self.spline.deriv_x(ln_k, a).map_err(PowerError::evaluation)
    }

    /// ∂² ln P / ∂ ln k²
    pub fn deriv2_ln_k(&self, ln_k: f64, a: f64) -> Result<f64, PowerError> {
        self.spline.deriv_xx(ln_k, a).map_err(PowerError::evaluation)
    }

    pub fn ln_k_min(&self) -> f64 {
        self.spline.bounds().0
    }

    pub fn ln_k_max(&self) -> f64 {
        self.spline.bounds().1
    }

    /// Lowest tabulated wavenumber in 1/Mpc
    pub fn k_min(&self) -> f64 {
        self.ln_k_min().exp()
    }

    /// Highest tabulated wavenumber in 1/Mpc
    pub fn k_max(&self) -> f64 {
        self.ln_k_max().exp()
    }

    pub fn a_min(&self) -> f64 {
        self.spline.bounds().2
    }

    pub fn a_max(&self) -> f64 {
        self.spline.bounds().3
    }

    /// Tabulated ln k knots
    pub fn ln_k(&self) -> &[f64] {
        self.spline.x_coords()
    }

    /// Tabulated scale factors
    pub fn scale_factors(&self) -> &[f64] {
        self.spline.y_coords()
    }

    /// Raw ln P samples indexed `[a_index, k_index]`
    pub fn values(&self) -> &Array2<f64> {
        self.spline.data()
    }
}

/// ln k knots spanning `[k_min, k_max]` at the configured density per decade.
pub fn ln_k_grid(config: &SplineConfig, k_min: f64, k_max: f64) -> Result<Vec<f64>, PowerError> {
    let nk = points_for_decades(k_min, k_max, config.n_k);
    let k = log_spacing(k_min, k_max, nk).ok_or_else(|| {
        PowerError::Configuration(format!(
            "cannot sample {nk} wavenumbers in [{k_min:e}, {k_max:e}]"
        ))
    })?;
    let mut ln_k = try_with_capacity("k grid", k.len())?;
    ln_k.extend(k.iter().map(|v| v.ln()));
    Ok(ln_k)
}

/// Scale factor knots: a logarithmic early segment joined to a linear late one.
pub fn a_grid(config: &SplineConfig) -> Result<Vec<f64>, PowerError> {
    linlog_spacing(
        config.a_min_log,
        config.a_min_lin,
        config.a_max,
        config.a_n_log,
        config.a_n_lin,
    )
    .ok_or_else(|| PowerError::Configuration("invalid scale factor grid settings".into()))
}

/// `n` scale factors spaced linearly in `[a_min, a_max]`.
pub fn linear_a_grid(a_min: f64, a_max: f64, n: usize) -> Result<Vec<f64>, PowerError> {
    linear_spacing(a_min, a_max, n)
        .ok_or_else(|| PowerError::Configuration(format!("invalid scale factor range [{a_min}, {a_max}]")))
}
