//! Baryonic correction model of Schneider & Teyssier (2015).
//!
//! Gas ejection suppresses the non-linear power around k ~ 1 h/Mpc and
//! stellar cooling enhances it at k ≳ k_s. The correction multiplies the
//! non-linear spectrum only.

use crate::error::PowerError;
use crate::params::BcmParameters;

/// Multiplicative correction G(k, z) S(k) for wavenumber `k` in 1/Mpc.
///
/// # Errors
/// `Configuration` if any model parameter is not finite.
pub fn bcm_correction(bcm: &BcmParameters, h: f64, k: f64, a: f64) -> Result<f64, PowerError> {
    if !(bcm.log10_mc.is_finite() && bcm.eta_b.is_finite() && bcm.k_s.is_finite()) {
        return Err(PowerError::Configuration(format!(
            "non-finite baryonic correction parameters: {bcm:?}"
        )));
    }
    let z = 1.0 / a - 1.0;
    let kh = k / h;

    // Eqs. 4.3 and 4.4
    let b0 = 0.105 * bcm.log10_mc - 1.27;
    let b = b0 / (1.0 + (z / 2.3).powf(2.5));
    let k_g = 0.7 * (1.0 - b).powi(4) * bcm.eta_b.powf(-1.6);

    // Eq. 4.2
    let gas = b / (1.0 + (kh / k_g).powi(3)) + 1.0 - b;
    // Eq. 4.5
    let stars = 1.0 + (kh / bcm.k_s).powi(2);

    Ok(gas * stars)
}
