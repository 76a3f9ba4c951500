//! Bardeen, Bond, Kaiser & Szalay (1986) transfer function with the
//! Sugiyama (1995) baryon correction to the shape parameter.

use crate::params::CosmologicalParameters;

/// T²(k) for `k` in 1/Mpc.
pub fn transfer_squared(params: &CosmologicalParameters, k: f64) -> f64 {
    let omega_m = params.omega_m;
    let h = params.h;
    let shape = omega_m * h * h * (-params.omega_b * (1.0 + (2.0 * h).sqrt() / omega_m)).exp();
    let q = k / shape;

    let log_term = (1.0 + 2.34 * q).ln() / (2.34 * q);
    let polynomial = 1.0 + 3.89 * q + (16.1 * q).powi(2) + (5.46 * q).powi(3) + (6.71 * q).powi(4);
    log_term * log_term / polynomial.sqrt()
}

/// Unnormalized linear power k^{n_s} T²(k).
pub fn power(params: &CosmologicalParameters, k: f64) -> f64 {
    k.powf(params.n_s) * transfer_squared(params, k)
}
