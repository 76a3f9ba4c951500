//! Continuation of a power spectrum table beyond its k range.
//!
//! Below k_min the spectrum follows the primordial tilt, P ∝ k^{n_s}. Above
//! k_max it follows a second-order Taylor expansion of ln P in ln k. Both
//! anchor slightly inside the table: spline derivatives at the very edge are
//! dominated by the natural end conditions.

use super::table::PowerSpectrumTable;
use crate::error::PowerError;

/// Offset in ln k from k_min to the low-k anchor
pub const LOW_K_OFFSET: f64 = 1e-2;
/// Step in ln k; the high-k anchor sits two steps inside k_max
pub const HIGH_K_STEP: f64 = 1e-2;

/// ln P below the table, linear in ln k with slope `n_s`.
pub fn low_k(table: &PowerSpectrumTable, ln_k: f64, a: f64, n_s: f64) -> Result<f64, PowerError> {
    let anchor = table.ln_k_min() + LOW_K_OFFSET;
    let ln_p = table.evaluate(anchor, a)?;
    Ok(ln_p + n_s * (ln_k - anchor))
}

/// ln P above the table from the local slope and curvature.
pub fn high_k(table: &PowerSpectrumTable, ln_k: f64, a: f64) -> Result<f64, PowerError> {
    let anchor = table.ln_k_max() - 2.0 * HIGH_K_STEP;
    let ln_p = table.evaluate(anchor, a)?;
    let slope = table.deriv_ln_k(anchor, a)?;
    let curvature = table.deriv2_ln_k(anchor, a)?;
    let dx = ln_k - anchor;
    Ok(ln_p + slope * dx + 0.5 * curvature * dx * dx)
}

/// ln P at any ln k: the table inside its range, the continuations outside.
pub fn ln_power(table: &PowerSpectrumTable, ln_k: f64, a: f64, n_s: f64) -> Result<f64, PowerError> {
    if ln_k <= table.ln_k_min() {
        low_k(table, ln_k, a, n_s)
    } else if ln_k < table.ln_k_max() {
        table.evaluate(ln_k, a)
    } else {
        high_k(table, ln_k, a)
    }
}
