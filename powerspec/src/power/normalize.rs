//! Amplitude normalization.
//!
//! With A_s given the amplitude is used as is. With sigma8 given, the
//! spectrum is built once at an arbitrary amplitude, its sigma8 measured, and
//! ln P shifted by 2 ln(σ8_target / σ8_measured). P is linear in the
//! amplitude, so one correction suffices.

use log::info;

use super::moments::{sigma_today, MomentKind};
use super::table::PowerSpectrumTable;
use crate::algo::quadrature::QuadratureOptions;
use crate::error::{ComputationStatus, PowerError};

/// Reference A_s per unit sigma8 used for the Boltzmann trial run
pub const A_S_PER_SIGMA8: f64 = 2.43e-9 / 0.876_59;

/// Shift to add to ln P so that sigma8 moves from `measured` to `target`.
pub fn log_correction(target: f64, measured: f64) -> Result<f64, PowerError> {
    if !(target > 0.0 && measured > 0.0 && target.is_finite() && measured.is_finite()) {
        return Err(PowerError::Configuration(format!(
            "cannot normalize sigma8 {measured} to {target}"
        )));
    }
    Ok(2.0 * (target.ln() - measured.ln()))
}

/// First A_s guess for a Boltzmann run targeting `sigma8`.
pub fn amplitude_guess(sigma8: f64) -> f64 {
    A_S_PER_SIGMA8 * sigma8
}

/// A_s rescaled by the squared ratio of target to obtained sigma8.
pub fn corrected_amplitude(guess: f64, target: f64, obtained: f64) -> Result<f64, PowerError> {
    Ok(guess * log_correction(target, obtained)?.exp())
}

/// sigma8 of a table built for a universe with Hubble parameter `h`.
pub(crate) fn measure_sigma8(
    table: &PowerSpectrumTable,
    h: f64,
    n_s: f64,
    options: &QuadratureOptions,
    status: &mut ComputationStatus,
) -> Result<f64, PowerError> {
    sigma_today(table, n_s, 8.0 / h, MomentKind::Density, options, status)
}

/// ln P(k, a) = ln P(k) + 2 ln D(a) on a fixed grid, before tabulation.
#[derive(Debug, Clone)]
pub(crate) struct SeparableSpectrum {
    pub ln_k: Vec<f64>,
    pub a: Vec<f64>,
    pub ln_p: Vec<f64>,
    pub ln_growth_sq: Vec<f64>,
}

impl SeparableSpectrum {
    pub fn table(&self) -> Result<PowerSpectrumTable, PowerError> {
        PowerSpectrumTable::from_separable(self.ln_k.clone(), self.a.clone(), &self.ln_p, &self.ln_growth_sq)
    }

    /// Tabulate, measure sigma8, shift ln P once and tabulate again.
    pub fn normalize_sigma8(
        mut self,
        h: f64,
        n_s: f64,
        sigma8: f64,
        options: &QuadratureOptions,
        status: &mut ComputationStatus,
    ) -> Result<PowerSpectrumTable, PowerError> {
        let measured = measure_sigma8(&self.table()?, h, n_s, options, status)?;
        let shift = log_correction(sigma8, measured)?;
        info!("Rescaling linear power: sigma8 {measured:.6} -> {sigma8:.6}");

        for value in self.ln_p.iter_mut() {
            *value += shift;
        }
        self.table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_correction_is_quadratic() {
        let shift = log_correction(0.8, 0.4).unwrap();
        assert_relative_eq!(shift.exp(), 4.0, epsilon = 1e-12);
        assert!(log_correction(0.8, 0.0).is_err());
        assert!(log_correction(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_amplitude_guess() {
        assert_relative_eq!(amplitude_guess(0.87659), 2.43e-9, max_relative = 1e-12);
        let corrected = corrected_amplitude(2e-9, 0.8, 0.9).unwrap();
        assert_relative_eq!(corrected, 2e-9 * (0.8f64 / 0.9).powi(2), max_relative = 1e-12);
    }

    #[test]
    fn test_single_pass_hits_target() {
        let ln_k: Vec<f64> = (0..=300).map(|i| (1e-4f64).ln() + i as f64 * 0.05).collect();
        let ln_p: Vec<f64> = ln_k
            .iter()
            .map(|&lk| {
                let k = lk.exp();
                k.ln() - 2.0 * (1.0 + (k / 0.02).powi(2)).ln()
            })
            .collect();
        let options = QuadratureOptions::default();
        let mut status = ComputationStatus::default();

        let spectrum = SeparableSpectrum {
            ln_k,
            a: vec![0.5, 1.0],
            ln_p,
            ln_growth_sq: vec![2.0 * 0.5f64.ln(), 0.0],
        };
        let table = spectrum.normalize_sigma8(0.7, 1.0, 0.8, &options, &mut status).unwrap();
        let sigma8 = measure_sigma8(&table, 0.7, 1.0, &options, &mut status).unwrap();
        assert_relative_eq!(sigma8, 0.8, max_relative = 1e-5);
        assert!(status.is_ok());
    }
}
