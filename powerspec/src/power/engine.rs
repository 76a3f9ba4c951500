//! Per-cosmology power spectrum engine.
//!
//! A [`Cosmology`] owns its parameters, configuration and collaborators,
//! builds its linear and non-linear tables on first use and answers every
//! query from them. Construction is all-or-nothing: either both tables are
//! stored or the error is, and neither is ever recomputed.

use std::io::Write;

use log::{debug, info};

use super::baryons::bcm_correction;
use super::extrapolation::ln_power;
use super::moments::{sigma_today, MomentKind};
use super::table::PowerSpectrumTable;
use crate::background::{Background, LinearGrowth};
use crate::config::{BaryonModel, MatterPowerMethod, PowerConfig, TransferFunctionMethod};
use crate::error::{ComputationStatus, PowerError};
use crate::params::CosmologicalParameters;
use crate::solver::{BoltzmannSolver, ReferenceSolver};
use crate::transfer::emulator::{check_scale_factor, Emulator};
use crate::transfer::{BackendContext, PowerTables, TransferBackend};

enum PowerState {
    Uncomputed,
    Computed(PowerTables),
    Failed(PowerError),
}

impl PowerState {
    /// Stored tables, or the stored error once construction has failed.
    fn tables(&self) -> Result<&PowerTables, PowerError> {
        match self {
            PowerState::Computed(tables) => Ok(tables),
            PowerState::Failed(err) => Err(err.clone()),
            PowerState::Uncomputed => Err(PowerError::Configuration("power spectrum not computed".into())),
        }
    }
}

/// One cosmology and its memoized power spectrum tables.
///
/// Not meant to be shared between threads while tables are being built;
/// every method that may compute takes `&mut self`.
pub struct Cosmology {
    params: CosmologicalParameters,
    config: PowerConfig,
    background: Box<dyn Background>,
    solver: Box<dyn BoltzmannSolver>,
    emulator: Option<Box<dyn Emulator>>,
    state: PowerState,
    status: ComputationStatus,
}

impl Cosmology {
    /// Cosmology with the built-in growth integrator and reference solver.
    ///
    /// # Errors
    /// `PowerError::Configuration` for an inconsistent method combination,
    /// `PowerError::Background` if the growth history cannot be integrated.
    pub fn new(params: CosmologicalParameters, config: PowerConfig) -> Result<Self, PowerError> {
        config.validate()?;
        let background = LinearGrowth::new(&params)?;
        Ok(Self {
            params,
            config,
            background: Box::new(background),
            solver: Box::new(ReferenceSolver::new()),
            emulator: None,
            state: PowerState::Uncomputed,
            status: ComputationStatus::default(),
        })
    }

    /// Replace the growth factor source. Discards computed tables.
    pub fn with_background(mut self, background: impl Background + 'static) -> Self {
        self.background = Box::new(background);
        self.reset();
        self
    }

    /// Replace the Boltzmann solver. Discards computed tables.
    pub fn with_solver(mut self, solver: impl BoltzmannSolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self.reset();
        self
    }

    /// Attach the emulator used by the emulator methods. Discards computed tables.
    pub fn with_emulator(mut self, emulator: impl Emulator + 'static) -> Self {
        self.emulator = Some(Box::new(emulator));
        self.reset();
        self
    }

    fn reset(&mut self) {
        self.state = PowerState::Uncomputed;
        self.status = ComputationStatus::default();
    }

    pub fn params(&self) -> &CosmologicalParameters {
        &self.params
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    pub fn status(&self) -> &ComputationStatus {
        &self.status
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.state, PowerState::Computed(_))
    }

    /// Build the tables if that has not been attempted yet.
    ///
    /// Repeated calls return the outcome of the first attempt.
    pub fn compute_power(&mut self) -> Result<(), PowerError> {
        match &self.state {
            PowerState::Computed(_) => return Ok(()),
            PowerState::Failed(err) => return Err(err.clone()),
            PowerState::Uncomputed => {}
        }

        let backend = TransferBackend::from(self.config.transfer_function);
        let mut ctx = BackendContext {
            params: &self.params,
            config: &self.config,
            background: &*self.background,
            solver: &mut *self.solver,
            emulator: self.emulator.as_deref(),
            status: &mut self.status,
        };
        match backend.build(&mut ctx) {
            Ok(tables) => {
                self.state = PowerState::Computed(tables);
                Ok(())
            }
            Err(err) => {
                self.status.fail(&err);
                self.state = PowerState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// The linear and non-linear tables, computing them first if needed.
    pub fn tables(&mut self) -> Result<&PowerTables, PowerError> {
        self.compute_power()?;
        self.computed()
    }

    fn computed(&self) -> Result<&PowerTables, PowerError> {
        self.state.tables()
    }

    /// Keep a failed query's message without touching the tables.
    fn record<T>(&mut self, result: Result<T, PowerError>) -> Result<T, PowerError> {
        if let Err(err) = &result {
            self.status.note(err.to_string());
        }
        result
    }

    /// Linear matter power in Mpc³ at wavenumber `k` (1/Mpc) and scale factor `a`.
    pub fn linear_power(&mut self, k: f64, a: f64) -> Result<f64, PowerError> {
        self.compute_power()?;
        let result = self.evaluate_linear(k, a);
        self.record(result)
    }

    /// Non-linear matter power in Mpc³ at wavenumber `k` (1/Mpc) and scale factor `a`.
    pub fn nonlinear_power(&mut self, k: f64, a: f64) -> Result<f64, PowerError> {
        self.compute_power()?;
        let result = self.evaluate_nonlinear(k, a);
        self.record(result)
    }

    /// RMS linear density contrast in spheres of 8 Mpc/h today.
    pub fn sigma8(&mut self) -> Result<f64, PowerError> {
        let radius = 8.0 / self.params.h;
        self.sigma_r(radius, 1.0)
    }

    /// RMS linear density contrast in top-hat spheres of radius `radius` (Mpc).
    pub fn sigma_r(&mut self, radius: f64, a: f64) -> Result<f64, PowerError> {
        self.sigma(MomentKind::Density, radius, a)
    }

    /// RMS linear displacement in top-hat spheres of radius `radius` (Mpc).
    pub fn sigma_v(&mut self, radius: f64, a: f64) -> Result<f64, PowerError> {
        self.sigma(MomentKind::Velocity, radius, a)
    }

    fn sigma(&mut self, kind: MomentKind, radius: f64, a: f64) -> Result<f64, PowerError> {
        self.compute_power()?;
        let result = self.integrate_sigma(kind, radius, a);
        self.record(result)
    }

    fn integrate_sigma(&mut self, kind: MomentKind, radius: f64, a: f64) -> Result<f64, PowerError> {
        check_scale_factor_range(a)?;
        let growth = self.background.growth_factor(a)?;
        let options = self.config.integration.quadrature();
        let tables = self.state.tables()?;
        let sigma = sigma_today(&tables.linear, self.params.n_s, radius, kind, &options, &mut self.status)?;
        debug!("{} at R = {radius:.4} Mpc, a = {a:.4}: {:.6}", kind.name(), sigma * growth);
        Ok(sigma * growth)
    }

    /// Write `k P(k)` lines for the linear spectrum at redshift `z`, one per
    /// wavenumber knot of the linear table.
    pub fn write_linear_power<W: Write>(&mut self, z: f64, writer: &mut W) -> Result<(), PowerError> {
        self.compute_power()?;
        let result = self.dump_linear(z, writer);
        self.record(result)
    }

    fn dump_linear<W: Write>(&self, z: f64, writer: &mut W) -> Result<(), PowerError> {
        if !(z.is_finite() && z >= 0.0) {
            return Err(PowerError::Configuration(format!("invalid redshift {z}")));
        }
        let a = 1.0 / (1.0 + z);
        let tables = self.computed()?;
        for &lk in tables.linear.ln_k() {
            let k = lk.exp();
            let p = self.evaluate_linear(k, a)?;
            writeln!(writer, "{k:e} {p:e}")?;
        }
        info!(
            "Wrote {} linear power samples at z = {z}",
            tables.linear.ln_k().len()
        );
        Ok(())
    }

    fn evaluate_linear(&self, k: f64, a: f64) -> Result<f64, PowerError> {
        check_query(k, a)?;
        let tables = self.computed()?;
        if self.config.transfer_function == TransferFunctionMethod::Emulator {
            check_scale_factor(a)?;
        }
        let (a_eval, growth_sq) = self.evaluation_epoch(&tables.linear, a)?;
        Ok(ln_power(&tables.linear, k.ln(), a_eval, self.params.n_s)?.exp() * growth_sq)
    }

    fn evaluate_nonlinear(&self, k: f64, a: f64) -> Result<f64, PowerError> {
        check_query(k, a)?;
        let tables = self.computed()?;
        match self.config.matter_power {
            MatterPowerMethod::Linear => self.evaluate_linear(k, a),
            MatterPowerMethod::Halofit => {
                let (a_eval, growth_sq) = self.evaluation_epoch(&tables.nonlinear, a)?;
                let mut p = ln_power(&tables.nonlinear, k.ln(), a_eval, self.params.n_s)?.exp();
                if self.config.baryons == BaryonModel::Bcm {
                    p *= bcm_correction(&self.params.bcm, self.params.h, k, a_eval)?;
                }
                Ok(p * growth_sq)
            }
            MatterPowerMethod::Emulator => {
                check_scale_factor(a)?;
                Ok(ln_power(&tables.nonlinear, k.ln(), a, self.params.n_s)?.exp())
            }
        }
    }

    /// Scale factor to evaluate `table` at and the growth rescaling to apply.
    ///
    /// Before the table's first epoch the spectrum is evaluated there and
    /// moved back with (D(a) / D(a_min))².
    fn evaluation_epoch(&self, table: &PowerSpectrumTable, a: f64) -> Result<(f64, f64), PowerError> {
        let a_min = table.a_min();
        if a >= a_min {
            return Ok((a, 1.0));
        }
        let ratio = self.background.growth_factor(a)? / self.background.growth_factor(a_min)?;
        Ok((a_min, ratio * ratio))
    }
}

fn check_scale_factor_range(a: f64) -> Result<(), PowerError> {
    if !(a > 0.0 && a <= 1.0) {
        return Err(PowerError::Configuration(format!("scale factor {a} outside (0, 1]")));
    }
    Ok(())
}

fn check_query(k: f64, a: f64) -> Result<(), PowerError> {
    if !(k.is_finite() && k > 0.0) {
        return Err(PowerError::Configuration(format!("wavenumber must be positive, got {k}")));
    }
    check_scale_factor_range(a)
}
