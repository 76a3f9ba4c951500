//! Linear transfer function backends.
//!
//! Each backend turns a set of cosmological parameters into the linear and
//! non-linear ln P tables of one cosmology. The analytic fits tabulate
//! k^{n_s} T²(k) once, move it in time with the growth factor and normalize
//! to sigma8; the Boltzmann and emulator backends delegate to external
//! collaborators.

pub mod bbks;
pub mod boltzmann;
pub mod eisenstein_hu;
pub mod emulator;

use log::{debug, info};

use crate::algo::spline::SplineError;
use crate::background::Background;
use crate::config::{PowerConfig, TransferFunctionMethod};
use crate::error::{try_with_capacity, ComputationStatus, PowerError};
use crate::params::CosmologicalParameters;
use crate::power::normalize::SeparableSpectrum;
use crate::power::table::{a_grid, ln_k_grid, PowerSpectrumTable};
use crate::solver::BoltzmannSolver;

use eisenstein_hu::EisensteinHuParameters;
use emulator::Emulator;

/// Linear and non-linear tables of one cosmology.
#[derive(Debug, Clone)]
pub struct PowerTables {
    pub linear: PowerSpectrumTable,
    pub nonlinear: PowerSpectrumTable,
}

/// Everything a backend may touch while building tables.
pub(crate) struct BackendContext<'a> {
    pub params: &'a CosmologicalParameters,
    pub config: &'a PowerConfig,
    pub background: &'a dyn Background,
    pub solver: &'a mut dyn BoltzmannSolver,
    pub emulator: Option<&'a dyn Emulator>,
    pub status: &'a mut ComputationStatus,
}

/// Strategy producing the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferBackend {
    Bbks,
    EisensteinHu { wiggles: bool },
    Boltzmann,
    Emulator,
}

impl From<TransferFunctionMethod> for TransferBackend {
    fn from(method: TransferFunctionMethod) -> Self {
        match method {
            TransferFunctionMethod::Bbks => TransferBackend::Bbks,
            TransferFunctionMethod::EisensteinHu => TransferBackend::EisensteinHu { wiggles: true },
            TransferFunctionMethod::EisensteinHuNoWiggles => TransferBackend::EisensteinHu { wiggles: false },
            TransferFunctionMethod::Boltzmann => TransferBackend::Boltzmann,
            TransferFunctionMethod::Emulator => TransferBackend::Emulator,
        }
    }
}

impl TransferBackend {
    pub fn name(self) -> &'static str {
        match self {
            TransferBackend::Bbks => "BBKS",
            TransferBackend::EisensteinHu { wiggles: true } => "Eisenstein & Hu",
            TransferBackend::EisensteinHu { wiggles: false } => "Eisenstein & Hu (no wiggles)",
            TransferBackend::Boltzmann => "Boltzmann solver",
            TransferBackend::Emulator => "emulator",
        }
    }

    /// Build both tables. Nothing is retained on failure.
    pub(crate) fn build(self, ctx: &mut BackendContext<'_>) -> Result<PowerTables, PowerError> {
        debug!("Computing power spectrum tables with the {} backend", self.name());
        let params = ctx.params;
        let tables = match self {
            TransferBackend::Bbks => analytic(ctx, |k| bbks::power(params, k))?,
            TransferBackend::EisensteinHu { wiggles } => {
                let eh = EisensteinHuParameters::new(params);
                analytic(ctx, |k| eh.power(k, wiggles))?
            }
            TransferBackend::Boltzmann => boltzmann::build(ctx)?,
            TransferBackend::Emulator => emulator::build(ctx)?,
        };
        info!(
            "{} tables ready: linear k in [{:.3e}, {:.3e}], non-linear k in [{:.3e}, {:.3e}] 1/Mpc",
            self.name(),
            tables.linear.k_min(),
            tables.linear.k_max(),
            tables.nonlinear.k_min(),
            tables.nonlinear.k_max()
        );
        Ok(tables)
    }
}

/// Tabulate an analytic k^{n_s} T²(k) shape and normalize it to sigma8.
///
/// The non-linear table is a copy of the linear one.
fn analytic<F>(ctx: &mut BackendContext<'_>, raw_power: F) -> Result<PowerTables, PowerError>
where
    F: Fn(f64) -> f64,
{
    let params = ctx.params;
    let sigma8 = params.sigma8().ok_or_else(|| {
        PowerError::Configuration("sigma8 not set, required for analytic transfer functions".into())
    })?;
    let spline = &ctx.config.spline;

    let ln_k = ln_k_grid(spline, spline.k_min, spline.k_max)?;
    let a = a_grid(spline)?;

    let mut ln_p = try_with_capacity("linear power", ln_k.len())?;
    for (index, &lk) in ln_k.iter().enumerate() {
        let p = raw_power(lk.exp());
        if !(p.is_finite() && p > 0.0) {
            return Err(SplineError::NonFinite { what: "ln P", index }.into());
        }
        ln_p.push(p.ln());
    }

    let mut ln_growth_sq = try_with_capacity("growth factors", a.len())?;
    for &aj in &a {
        ln_growth_sq.push(2.0 * ctx.background.growth_factor(aj)?.ln());
    }

    let spectrum = SeparableSpectrum {
        ln_k,
        a,
        ln_p,
        ln_growth_sq,
    };
    let options = ctx.config.integration.quadrature();
    let linear = spectrum.normalize_sigma8(params.h, params.n_s, sigma8, &options, ctx.status)?;

    Ok(PowerTables {
        nonlinear: linear.clone(),
        linear,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::LinearGrowth;
    use crate::params::ParameterSet;
    use crate::solver::ReferenceSolver;

    #[test]
    fn test_method_mapping() {
        assert_eq!(
            TransferBackend::from(TransferFunctionMethod::EisensteinHuNoWiggles),
            TransferBackend::EisensteinHu { wiggles: false }
        );
        assert_eq!(TransferBackend::from(TransferFunctionMethod::Bbks).name(), "BBKS");
    }

    #[test]
    fn test_analytic_requires_sigma8() {
        let mut raw = ParameterSet::lcdm(0.25, 0.05, 0.7, 0.96, 0.8);
        raw.sigma8 = None;
        raw.a_s = Some(2.1e-9);
        let params = CosmologicalParameters::try_from(raw).unwrap();
        let config = PowerConfig::default();
        let growth = LinearGrowth::new(&params).unwrap();
        let mut solver = ReferenceSolver::new();
        let mut status = ComputationStatus::default();

        let mut ctx = BackendContext {
            params: &params,
            config: &config,
            background: &growth,
            solver: &mut solver,
            emulator: None,
            status: &mut status,
        };
        let err = TransferBackend::Bbks.build(&mut ctx).unwrap_err();
        assert!(matches!(err, PowerError::Configuration(_)));
    }
}
