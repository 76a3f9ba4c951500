//! Analytic transfer functions end to end: normalization, table shape,
//! extrapolation and the diagnostic dump.

mod common;

use approx::assert_relative_eq;
use common::{standard_cosmology, standard_parameters, cosmology_from};
use powerspec::config::SplineConfig;
use powerspec::power::moments::w_tophat;
use powerspec::power::table::{a_grid, ln_k_grid};
use powerspec::{MatterPowerMethod, PowerConfig, PowerError, PowerSpectrumTable, TransferFunctionMethod};

const ANALYTIC: [TransferFunctionMethod; 3] = [
    TransferFunctionMethod::Bbks,
    TransferFunctionMethod::EisensteinHu,
    TransferFunctionMethod::EisensteinHuNoWiggles,
];

#[test]
fn test_sigma8_round_trip() {
    test_helpers::init_logging();
    for method in ANALYTIC {
        let mut cosmo = standard_cosmology(method, MatterPowerMethod::Linear);
        let sigma8 = cosmo.sigma8().unwrap();
        assert_relative_eq!(sigma8, 0.8, max_relative = 1e-4);
        assert!(cosmo.status().is_ok(), "{method:?}: {:?}", cosmo.status());
    }
}

#[test]
fn test_sigma8_round_trip_other_amplitude() {
    let mut raw = standard_parameters();
    raw.sigma8 = Some(0.65);
    raw.h = 0.67;
    let mut cosmo = cosmology_from(
        raw,
        PowerConfig::new(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Halofit),
    );
    assert_relative_eq!(cosmo.sigma8().unwrap(), 0.65, max_relative = 1e-4);
}

#[test]
fn test_grids_strictly_increasing() {
    let config = SplineConfig::default();
    let ln_k = ln_k_grid(&config, config.k_min, config.k_max).unwrap();
    assert!(ln_k.windows(2).all(|w| w[1] > w[0]));

    let a = a_grid(&config).unwrap();
    assert!(a.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(a.len(), config.a_n_log + config.a_n_lin - 1);
}

#[test]
fn test_non_monotonic_grid_rejected() {
    let ln_k = vec![0.0, 1.0, 0.5, 2.0];
    let a = vec![0.5, 1.0];
    let err = PowerSpectrumTable::tabulate(ln_k, a, |lk, _| Ok(lk)).unwrap_err();
    assert!(matches!(err, PowerError::SplineConstruction(_)));

    let err = PowerSpectrumTable::tabulate(vec![0.0, 1.0, 2.0], vec![1.0, 0.5], |lk, _| Ok(lk)).unwrap_err();
    assert!(matches!(err, PowerError::SplineConstruction(_)));
}

#[test]
fn test_continuity_at_table_edges() {
    let mut cosmo = standard_cosmology(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Linear);
    let (k_min, k_max) = {
        let tables = cosmo.tables().unwrap();
        (tables.linear.k_min(), tables.linear.k_max())
    };
    let eps = 1e-6;
    for a in [0.3, 1.0] {
        for edge in [k_min, k_max] {
            let inside_outside = (
                cosmo.linear_power(edge * (1.0 - eps), a).unwrap(),
                cosmo.linear_power(edge * (1.0 + eps), a).unwrap(),
            );
            assert_relative_eq!(inside_outside.0, inside_outside.1, max_relative = 1e-3);
        }
    }
}

#[test]
fn test_extrapolated_tails_are_power_laws() {
    let mut cosmo = standard_cosmology(TransferFunctionMethod::Bbks, MatterPowerMethod::Linear);
    let k_min = cosmo.tables().unwrap().linear.k_min();

    // Below the table P ∝ k^{n_s}
    let p1 = cosmo.linear_power(k_min / 10.0, 1.0).unwrap();
    let p2 = cosmo.linear_power(k_min / 100.0, 1.0).unwrap();
    assert_relative_eq!(p1 / p2, 10f64.powf(0.96), max_relative = 1e-10);

    // Above the table the spectrum keeps falling
    let k_max = cosmo.tables().unwrap().linear.k_max();
    assert!(cosmo.linear_power(2.0 * k_max, 1.0).unwrap() < cosmo.linear_power(k_max, 1.0).unwrap());
}

#[test]
fn test_window_function() {
    assert_eq!(w_tophat(0.0), 1.0);
    let x: f64 = 0.1;
    let closed = 3.0 * (x.sin() - x * x.cos()) / x.powi(3);
    let series = 1.0 - x * x / 10.0 + 0.003_561_429 * x.powi(4);
    assert!((w_tophat(x) - closed).abs() < 1e-6);
    assert!((series - closed).abs() < 1e-6);
}

#[test]
fn test_bbks_and_eisenstein_hu_agree() {
    let mut bbks = standard_cosmology(TransferFunctionMethod::Bbks, MatterPowerMethod::Linear);
    let mut eh = standard_cosmology(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Linear);

    for i in 0..=50 {
        // 0.02 to 1 per Mpc
        let k = 0.02 * 50f64.powf(i as f64 / 50.0);
        let ratio = bbks.linear_power(k, 1.0).unwrap() / eh.linear_power(k, 1.0).unwrap();
        assert!((ratio - 1.0).abs() < 0.1, "k = {k}: BBKS / EH = {ratio}");
    }
}

#[test]
fn test_power_grows_with_scale_factor() {
    let mut cosmo = standard_cosmology(TransferFunctionMethod::EisensteinHuNoWiggles, MatterPowerMethod::Linear);
    let mut previous = 0.0;
    for a in [0.005, 0.01, 0.05, 0.2, 0.5, 1.0] {
        let p = cosmo.linear_power(0.1, a).unwrap();
        assert!(p > previous, "a = {a}");
        previous = p;
    }
}

#[test]
fn test_halofit_with_analytic_transfer_is_linear() {
    let mut cosmo = standard_cosmology(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Halofit);
    for k in [1e-3, 0.1, 5.0] {
        assert_eq!(cosmo.nonlinear_power(k, 0.7).unwrap(), cosmo.linear_power(k, 0.7).unwrap());
    }
}

#[test]
fn test_deterministic_tables() {
    let mut first = standard_cosmology(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Linear);
    let mut second = standard_cosmology(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Linear);
    let a = first.tables().unwrap().clone();
    let b = second.tables().unwrap();

    assert_eq!(a.linear.ln_k(), b.linear.ln_k());
    assert_eq!(a.linear.scale_factors(), b.linear.scale_factors());
    assert_eq!(a.linear.values(), b.linear.values());
    assert_eq!(a.nonlinear.values(), b.nonlinear.values());
}

#[test]
fn test_unconverged_sigma_integral_only_warns() {
    test_helpers::init_logging();
    let mut config = PowerConfig::new(TransferFunctionMethod::Bbks, MatterPowerMethod::Linear);
    config.integration.limit = 1;
    config.integration.epsrel = 1e-14;
    let mut cosmo = cosmology_from(standard_parameters(), config);

    cosmo.compute_power().unwrap();
    assert!(cosmo.status().is_ok());
    let after_normalization = cosmo.status().integration_warnings();
    assert!(after_normalization > 0);

    let sigma = cosmo.sigma_r(10.0, 1.0).unwrap();
    assert!(sigma.is_finite() && sigma > 0.0);
    assert!(cosmo.status().is_ok());
    assert!(cosmo.status().integration_warnings() > after_normalization);
}

#[test]
fn test_missing_sigma8_is_configuration_error() {
    let mut raw = standard_parameters();
    raw.sigma8 = None;
    raw.a_s = Some(2.1e-9);
    let mut cosmo = cosmology_from(raw, PowerConfig::new(TransferFunctionMethod::Bbks, MatterPowerMethod::Linear));
    assert!(matches!(cosmo.sigma8(), Err(PowerError::Configuration(_))));
    assert!(!cosmo.status().is_ok());
}

#[test]
fn test_dump_to_file() {
    let mut cosmo = standard_cosmology(TransferFunctionMethod::EisensteinHu, MatterPowerMethod::Linear);
    let path = test_helpers::output_path("linear_power_eh_z1.txt");
    let mut file = std::fs::File::create(&path).unwrap();
    cosmo.write_linear_power(1.0, &mut file).unwrap();
    drop(file);

    let text = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<(f64, f64)> = text
        .lines()
        .map(|line| {
            let mut fields = line.split_whitespace().map(|v| v.parse::<f64>().unwrap());
            (fields.next().unwrap(), fields.next().unwrap())
        })
        .collect();
    assert_eq!(rows.len(), cosmo.tables().unwrap().linear.ln_k().len());
    assert!(rows.windows(2).all(|w| w[1].0 > w[0].0));
    assert!(rows.iter().all(|&(_, p)| p > 0.0));

    let (k, p) = rows[rows.len() / 2];
    assert_relative_eq!(p, cosmo.linear_power(k, 0.5).unwrap(), max_relative = 1e-12);
}
