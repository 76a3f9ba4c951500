//! Emulator backend with a closed-form stand-in emulator.

mod common;

use approx::assert_relative_eq;
use common::{cosmology_from, standard_parameters, ToyEmulator};
use powerspec::transfer::emulator::emulator_inputs;
use powerspec::{EmulatorNeutrinos, MatterPowerMethod, ParameterSet, PowerConfig, PowerError, TransferFunctionMethod};

fn emulator_config() -> PowerConfig {
    PowerConfig::new(TransferFunctionMethod::Emulator, MatterPowerMethod::Emulator)
}

fn emulator_parameters() -> ParameterSet {
    let mut raw = standard_parameters();
    raw.n_nu_rel = 3.04;
    raw
}

#[test]
fn test_nonlinear_power_from_emulator() {
    test_helpers::init_logging();
    let mut cosmo = cosmology_from(emulator_parameters(), emulator_config()).with_emulator(ToyEmulator::new());
    let k_modes: Vec<f64> = {
        let tables = cosmo.tables().unwrap();
        assert_relative_eq!(tables.nonlinear.a_min(), 1.0 / 3.0, max_relative = 1e-12);
        assert_eq!(tables.nonlinear.scale_factors().len(), 40);
        tables.nonlinear.ln_k().iter().map(|lk| lk.exp()).collect()
    };

    let inputs = emulator_inputs(cosmo.params(), 0.8, 0.0, 0.0);
    for &k in &k_modes[5..10] {
        let p = cosmo.nonlinear_power(k, 1.0).unwrap();
        assert_relative_eq!(p, ToyEmulator::expected(k, &inputs), max_relative = 1e-10);
    }

    // Linear side comes from the Boltzmann path
    assert_relative_eq!(cosmo.sigma8().unwrap(), 0.8, max_relative = 1e-3);
}

#[test]
fn test_early_queries_rejected() {
    let mut cosmo = cosmology_from(emulator_parameters(), emulator_config()).with_emulator(ToyEmulator::new());
    assert!(matches!(cosmo.nonlinear_power(0.1, 0.3), Err(PowerError::EmulatorBounds(_))));
    assert!(matches!(cosmo.linear_power(0.1, 0.3), Err(PowerError::EmulatorBounds(_))));

    // The tables survive a bad query
    assert!(cosmo.status().is_ok());
    assert!(cosmo.nonlinear_power(0.1, 0.5).is_ok());
}

#[test]
fn test_missing_emulator() {
    let mut cosmo = cosmology_from(emulator_parameters(), emulator_config());
    assert!(matches!(cosmo.compute_power(), Err(PowerError::Configuration(_))));
}

#[test]
fn test_requires_sigma8() {
    let mut raw = emulator_parameters();
    raw.sigma8 = None;
    raw.a_s = Some(2.1e-9);
    let mut cosmo = cosmology_from(raw, emulator_config()).with_emulator(ToyEmulator::new());
    assert!(matches!(cosmo.compute_power(), Err(PowerError::Configuration(_))));
}

#[test]
fn test_out_of_range_cosmologies() {
    let mut low_h = emulator_parameters();
    low_h.h = 0.5;
    let mut unequal = emulator_parameters();
    unequal.m_nu = vec![0.01, 0.02, 0.03];
    unequal.n_nu_rel = 0.00641;
    let mut heavy = emulator_parameters();
    heavy.m_nu = vec![0.4, 0.4, 0.4];

    for raw in [low_h, unequal, heavy] {
        let mut cosmo = cosmology_from(raw.clone(), emulator_config()).with_emulator(ToyEmulator::new());
        let err = cosmo.compute_power().unwrap_err();
        assert!(matches!(err, PowerError::EmulatorBounds(_)), "{raw:?}: {err}");
    }
}

#[test]
fn test_equalize_override_accepts_unequal_masses() {
    let mut raw = emulator_parameters();
    raw.m_nu = vec![0.01, 0.02, 0.03];
    raw.n_nu_rel = 0.00641;
    let mut config = emulator_config();
    config.emulator_neutrinos = EmulatorNeutrinos::Equalize;
    let mut cosmo = cosmology_from(raw, config).with_emulator(ToyEmulator::new());
    assert!(cosmo.nonlinear_power(0.5, 1.0).unwrap() > 0.0);
}

#[test]
fn test_short_prediction_is_emulator_error() {
    let mut emulator = ToyEmulator::new();
    emulator.truncate = Some(10);
    let mut cosmo = cosmology_from(emulator_parameters(), emulator_config()).with_emulator(emulator);
    assert!(matches!(cosmo.compute_power(), Err(PowerError::Emulator(_))));
}
