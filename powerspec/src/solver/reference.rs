//! Built-in staged solver.
//!
//! Implements the [`BoltzmannSolver`] contract from closed-form physics so
//! the Boltzmann code path runs end to end without external code: the
//! Eisenstein & Hu transfer function, a power-law primordial spectrum, the
//! Poisson equation for the matter power and halofit for non-linear scales.
//!
//! P(k, z) = 2π²/k³ · A_s (k/k_pivot)^(n_s−1) · [2k² / (5 Ω_m H0²)]² · T²(k) · D²(a)
//!
//! with D normalized to a deep in matter domination.

use log::{debug, info};
use std::convert::Infallible;
use std::f64::consts::PI;

use super::halofit::Halofit;
use super::{BoltzmannSolver, SolverError, SolverParameters, SolverStage};
use crate::algo::quadrature::{integrate, QuadratureOptions};
use crate::algo::spacing::log_spacing;
use crate::background::{Background, Densities, LinearGrowth};
use crate::constants::HUBBLE_DISTANCE_MPC;
use crate::params::{CosmologicalParameters, ParameterSet};
use crate::power::moments::w_tophat;
use crate::transfer::eisenstein_hu::EisensteinHuParameters;

/// Pivot scale of the primordial spectrum (1/Mpc)
pub const K_PIVOT: f64 = 0.05;
/// First wavenumber of the output grid (1/Mpc)
pub const K_MIN_SOLVER: f64 = 1e-5;
/// Output grid density
const K_PER_DECADE: usize = 20;
/// Slack on grid edges before a query counts as out of range
const EDGE_TOLERANCE: f64 = 1e-9;

/// Settings read from the parameter dictionary.
#[derive(Debug, Clone)]
struct RunInput {
    params: CosmologicalParameters,
    a_s: f64,
    k_max: f64,
    z_max: f64,
    halofit: bool,
}

#[derive(Debug, Clone, Copy)]
struct Primordial {
    a_s: f64,
    n_s: f64,
}

impl Primordial {
    /// Dimensionless curvature power Δ²_R(k)
    fn curvature_power(&self, k: f64) -> f64 {
        self.a_s * (k / K_PIVOT).powf(self.n_s - 1.0)
    }
}

/// Solver backed by analytic fits.
#[derive(Debug, Default)]
pub struct ReferenceSolver {
    input: Option<RunInput>,
    growth: Option<LinearGrowth>,
    thermo: Option<EisensteinHuParameters>,
    ln_k: Option<Vec<f64>>,
    primordial: Option<Primordial>,
    halofit: Option<Option<Halofit>>,
    /// [2 / (5 Ω_m H0²)]² in Mpc⁴
    poisson: Option<f64>,
    sigma8: Option<f64>,
}

fn missing(what: &str) -> SolverError {
    SolverError(format!("{what} not initialized"))
}

fn parse_value(parameters: &SolverParameters, name: &str) -> Result<Option<f64>, SolverError> {
    parameters
        .get(name)
        .map(|raw| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| SolverError(format!("could not parse {name} = '{raw}'")))
        })
        .transpose()
}

fn require(parameters: &SolverParameters, name: &str) -> Result<f64, SolverError> {
    parse_value(parameters, name)?.ok_or_else(|| SolverError(format!("missing parameter {name}")))
}

impl ReferenceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn input(&self) -> Result<&RunInput, SolverError> {
        self.input.as_ref().ok_or_else(|| missing("input"))
    }

    fn growth(&self) -> Result<&LinearGrowth, SolverError> {
        self.growth.as_ref().ok_or_else(|| missing("background"))
    }

    /// Linear power today without the growth factor, from raw stage data.
    fn linear_power_today(
        thermo: &EisensteinHuParameters,
        primordial: &Primordial,
        poisson: f64,
        h: f64,
        k: f64,
    ) -> f64 {
        let k2 = k * k;
        2.0 * PI * PI / (k2 * k) * primordial.curvature_power(k) * poisson * k2 * k2 * thermo.transfer_squared(k / h, true)
    }

    fn poisson_factor(params: &CosmologicalParameters) -> f64 {
        let h0 = params.h / HUBBLE_DISTANCE_MPC;
        (2.0 / (5.0 * params.omega_m * h0 * h0)).powi(2)
    }

    fn check_range(&self, k: f64, z: f64) -> Result<f64, SolverError> {
        let input = self.input()?;
        let k_max = input.k_max * (1.0 + EDGE_TOLERANCE);
        let k_min = K_MIN_SOLVER * (1.0 - EDGE_TOLERANCE);
        if !(k >= k_min && k <= k_max) {
            return Err(SolverError(format!(
                "k = {k:e} outside the computed range [{K_MIN_SOLVER:e}, {:e}]",
                input.k_max
            )));
        }
        if !(z >= 0.0 && z <= input.z_max * (1.0 + EDGE_TOLERANCE)) {
            return Err(SolverError(format!(
                "z = {z} outside the computed range [0, {}]",
                input.z_max
            )));
        }
        Ok(1.0 / (1.0 + z))
    }

    fn read(parameters: &SolverParameters) -> Result<RunInput, SolverError> {
        match parameters.get("output").map(str::trim) {
            Some(output) if output.contains("mPk") => {}
            _ => return Err("matter power spectrum (mPk) output not requested".into()),
        }

        let halofit = match parameters.get("non linear").map(str::trim) {
            None | Some("none") => false,
            Some("Halofit") | Some("halofit") => true,
            Some(other) => return Err(SolverError(format!("unknown non-linear method '{other}'"))),
        };

        let m_nu = match parameters.get("m_ncdm") {
            Some(list) => list
                .split(',')
                .map(|m| {
                    m.trim()
                        .parse::<f64>()
                        .map_err(|_| SolverError(format!("could not parse m_ncdm entry '{m}'")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let n_ncdm = parse_value(parameters, "N_ncdm")?.unwrap_or(0.0);
        if n_ncdm != m_nu.len() as f64 {
            return Err(SolverError(format!(
                "N_ncdm = {n_ncdm} does not match {} m_ncdm entries",
                m_nu.len()
            )));
        }

        let a_s = require(parameters, "A_s")?;
        let raw = ParameterSet {
            h: require(parameters, "h")?,
            omega_c: require(parameters, "Omega_cdm")?,
            omega_b: require(parameters, "Omega_b")?,
            omega_k: parse_value(parameters, "Omega_k")?.unwrap_or(0.0),
            n_s: require(parameters, "n_s")?,
            a_s: Some(a_s),
            sigma8: None,
            w0: parse_value(parameters, "w0_fld")?.unwrap_or(-1.0),
            wa: parse_value(parameters, "wa_fld")?.unwrap_or(0.0),
            t_cmb: require(parameters, "T_cmb")?,
            n_nu_rel: parse_value(parameters, "N_ur")?.unwrap_or(0.0),
            m_nu,
            bcm: Default::default(),
        };
        let params = CosmologicalParameters::try_from(raw).map_err(|e| SolverError(e.to_string()))?;

        let k_max = require(parameters, "P_k_max_1/Mpc")?;
        if !(k_max > K_MIN_SOLVER) {
            return Err(SolverError(format!("P_k_max_1/Mpc = {k_max} is below {K_MIN_SOLVER:e}")));
        }
        let z_max = parse_value(parameters, "z_max_pk")?.unwrap_or(0.0);
        if !(z_max >= 0.0) {
            return Err(SolverError(format!("z_max_pk = {z_max} is negative")));
        }

        Ok(RunInput {
            params,
            a_s,
            k_max,
            z_max,
            halofit,
        })
    }

    fn init(&mut self, stage: SolverStage) -> Result<(), SolverError> {
        match stage {
            SolverStage::Background => {
                let growth = LinearGrowth::new(&self.input()?.params).map_err(|e| SolverError(e.to_string()))?;
                self.growth = Some(growth);
            }
            SolverStage::Thermodynamics => {
                self.growth()?;
                self.thermo = Some(EisensteinHuParameters::new(&self.input()?.params));
            }
            SolverStage::Perturbations => {
                let thermo = self.thermo.as_ref().ok_or_else(|| missing("thermodynamics"))?;
                let k_max = self.input()?.k_max;
                let decades = (k_max / K_MIN_SOLVER).log10();
                let nk = (decades * K_PER_DECADE as f64).ceil() as usize + 1;
                let k = log_spacing(K_MIN_SOLVER, k_max, nk.max(2))
                    .ok_or_else(|| SolverError(format!("cannot sample k up to {k_max:e}")))?;
                debug!(
                    "Reference solver k grid: {} points, sound horizon {:.2} Mpc/h",
                    k.len(),
                    thermo.rsound
                );
                self.ln_k = Some(k.iter().map(|k| k.ln()).collect());
            }
            SolverStage::Primordial => {
                self.ln_k.as_ref().ok_or_else(|| missing("perturbations"))?;
                let input = self.input()?;
                self.primordial = Some(Primordial {
                    a_s: input.a_s,
                    n_s: input.params.n_s,
                });
            }
            SolverStage::Nonlinear => {
                let input = self.input()?;
                let thermo = self.thermo.as_ref().ok_or_else(|| missing("thermodynamics"))?;
                let primordial = self.primordial.as_ref().ok_or_else(|| missing("primordial"))?;
                let halofit = if input.halofit {
                    let poisson = Self::poisson_factor(&input.params);
                    let h = input.params.h;
                    let growth_today = self.growth()?.growth_factor_unnormalized(1.0).map_err(|e| SolverError(e.to_string()))?;
                    let g2 = growth_today * growth_today;
                    Some(Halofit::new(|k| {
                        g2 * Self::linear_power_today(thermo, primordial, poisson, h, k)
                    })?)
                } else {
                    None
                };
                self.halofit = Some(halofit);
            }
            SolverStage::Transfer => {
                self.halofit.as_ref().ok_or_else(|| missing("nonlinear"))?;
                self.poisson = Some(Self::poisson_factor(&self.input()?.params));
            }
            SolverStage::Spectra => {
                let poisson = self.poisson.ok_or_else(|| missing("transfer"))?;
                let sigma8 = self.integrate_sigma8(poisson)?;
                info!("Reference solver sigma8 = {sigma8:.6}");
                self.sigma8 = Some(sigma8);
            }
        }
        Ok(())
    }

    fn integrate_sigma8(&self, poisson: f64) -> Result<f64, SolverError> {
        let input = self.input()?;
        let thermo = self.thermo.as_ref().ok_or_else(|| missing("thermodynamics"))?;
        let primordial = self.primordial.as_ref().ok_or_else(|| missing("primordial"))?;
        let growth_today = self
            .growth()?
            .growth_factor_unnormalized(1.0)
            .map_err(|e| SolverError(e.to_string()))?;
        let h = input.params.h;
        let radius = 8.0 / h;

        let result = integrate(
            |ln_k: f64| -> Result<f64, Infallible> {
                let k = ln_k.exp();
                let p = Self::linear_power_today(thermo, primordial, poisson, h, k);
                let w = w_tophat(k * radius);
                Ok(p * k * k * k * w * w)
            },
            K_MIN_SOLVER.ln(),
            input.k_max.ln(),
            &QuadratureOptions {
                epsabs: 0.0,
                epsrel: 1e-7,
                limit: 1000,
            },
        );
        let integral = match result {
            Ok(r) => r.value,
            Err(never) => match never {},
        };
        Ok(growth_today * (integral / (2.0 * PI * PI)).sqrt())
    }
}

impl BoltzmannSolver for ReferenceSolver {
    fn read_input(&mut self, parameters: &SolverParameters) -> Result<(), SolverError> {
        if self.growth.is_some() || self.sigma8.is_some() {
            return Err("previous run was not freed".into());
        }
        self.input = Some(Self::read(parameters)?);
        Ok(())
    }

    fn init_stage(&mut self, stage: SolverStage) -> Result<(), SolverError> {
        self.init(stage)
    }

    fn free_stage(&mut self, stage: SolverStage) -> Result<(), SolverError> {
        let released = match stage {
            SolverStage::Background => self.growth.take().is_some(),
            SolverStage::Thermodynamics => self.thermo.take().is_some(),
            SolverStage::Perturbations => self.ln_k.take().is_some(),
            SolverStage::Primordial => self.primordial.take().is_some(),
            SolverStage::Nonlinear => self.halofit.take().is_some(),
            SolverStage::Transfer => self.poisson.take().is_some(),
            SolverStage::Spectra => self.sigma8.take().is_some(),
        };
        if !released {
            return Err(SolverError(format!("{stage} was never initialized")));
        }
        Ok(())
    }

    fn ln_k(&self) -> &[f64] {
        self.ln_k.as_deref().unwrap_or(&[])
    }

    fn pk_linear(&self, k: f64, z: f64) -> Result<f64, SolverError> {
        let a = self.check_range(k, z)?;
        self.sigma8.ok_or_else(|| missing("spectra"))?;
        let input = self.input()?;
        let thermo = self.thermo.as_ref().ok_or_else(|| missing("thermodynamics"))?;
        let primordial = self.primordial.as_ref().ok_or_else(|| missing("primordial"))?;
        let poisson = self.poisson.ok_or_else(|| missing("transfer"))?;
        let d = self
            .growth()?
            .growth_factor_unnormalized(a)
            .map_err(|e| SolverError(e.to_string()))?;
        Ok(d * d * Self::linear_power_today(thermo, primordial, poisson, input.params.h, k))
    }

    fn pk_nonlinear(&self, k: f64, z: f64) -> Result<f64, SolverError> {
        let p_linear = self.pk_linear(k, z)?;
        let halofit = match self.halofit.as_ref() {
            Some(Some(halofit)) => halofit,
            Some(None) => return Err("non-linear power was not requested".into()),
            None => return Err(missing("nonlinear")),
        };
        let a = 1.0 / (1.0 + z);
        let growth = self.growth()?;
        let g = growth.growth_factor(a).map_err(|e| SolverError(e.to_string()))?;
        let densities: &Densities = growth.densities();
        halofit.nonlinear_power(k, p_linear, g, densities, a)
    }

    fn sigma8(&self) -> Result<f64, SolverError> {
        self.sigma8.ok_or_else(|| missing("spectra"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverRun;
    use approx::assert_relative_eq;

    fn parameters(a_s: f64, halofit: bool) -> SolverParameters {
        let mut p = SolverParameters::new();
        let entries = [
            ("output", "mPk".to_string()),
            ("non linear", if halofit { "Halofit" } else { "none" }.to_string()),
            ("P_k_max_1/Mpc", format!("{:.15e}", 50.0)),
            ("z_max_pk", format!("{:.15e}", 99.0)),
            ("h", "0.7".to_string()),
            ("Omega_cdm", "0.25".to_string()),
            ("Omega_b", "0.05".to_string()),
            ("n_s", "0.96".to_string()),
            ("N_ur", "3.046".to_string()),
            ("T_cmb", "2.725".to_string()),
        ];
        for (slot, (name, value)) in entries.into_iter().enumerate() {
            p.set(slot, name, value).unwrap();
        }
        p.set(19, "A_s", format!("{a_s:.15e}")).unwrap();
        p
    }

    #[test]
    fn test_sigma8_scales_with_root_amplitude() {
        let mut solver = ReferenceSolver::new();
        let run = SolverRun::start(&mut solver, &parameters(2.1e-9, false)).unwrap();
        let low = run.solver().sigma8().unwrap();
        run.finish().unwrap();

        let run = SolverRun::start(&mut solver, &parameters(4.2e-9, false)).unwrap();
        let high = run.solver().sigma8().unwrap();
        run.finish().unwrap();

        assert!(low > 0.6 && low < 1.1, "sigma8 = {low}");
        assert_relative_eq!(high / low, 2f64.sqrt(), max_relative = 1e-9);
    }

    #[test]
    fn test_power_grows_with_time() {
        let mut solver = ReferenceSolver::new();
        let run = SolverRun::start(&mut solver, &parameters(2.1e-9, true)).unwrap();
        let s = run.solver();
        let today = s.pk_linear(0.1, 0.0).unwrap();
        let earlier = s.pk_linear(0.1, 1.0).unwrap();
        assert!(today > earlier);
        assert!(s.pk_nonlinear(1.0, 0.0).unwrap() > s.pk_linear(1.0, 0.0).unwrap());
        assert!(s.pk_linear(100.0, 0.0).is_err());
        run.finish().unwrap();
    }

    #[test]
    fn test_stage_prerequisites() {
        let mut solver = ReferenceSolver::new();
        solver.read_input(&parameters(2.1e-9, false)).unwrap();
        assert!(solver.init_stage(SolverStage::Spectra).is_err());
        assert!(solver.free_stage(SolverStage::Background).is_err());
        assert!(solver.pk_linear(0.1, 0.0).is_err());
    }

    #[test]
    fn test_missing_amplitude_fails_input() {
        let mut params = parameters(2.1e-9, false);
        params.set(19, " ", " ").unwrap();
        let mut solver = ReferenceSolver::new();
        let err = SolverRun::start(&mut solver, &params).err().unwrap();
        assert!(matches!(err, crate::error::PowerError::Backend { ref stage, .. } if stage == "input"));
    }

    #[test]
    fn test_nonlinear_requires_halofit() {
        let mut solver = ReferenceSolver::new();
        let run = SolverRun::start(&mut solver, &parameters(2.1e-9, false)).unwrap();
        assert!(run.solver().pk_nonlinear(1.0, 0.0).is_err());
        run.finish().unwrap();
    }
}
