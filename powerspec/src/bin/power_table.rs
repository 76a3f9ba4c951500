//! Dump the linear matter power spectrum of one cosmology.
//!
//! Writes two columns, k in 1/Mpc and P(k) in Mpc³, on the wavenumber knots
//! of the linear table at the requested redshift.
//!
//! Usage:
//! ```text
//! cargo run --release --bin power_table -- --transfer bbks --redshift 1.0
//! cargo run --release --bin power_table -- --params cosmo.json --config power.json -o pk.txt
//! ```

use clap::Parser;
use log::info;
use powerspec::{
    CosmologicalParameters, Cosmology, MatterPowerMethod, ParameterSet, PowerConfig, TransferFunctionMethod,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tabulate the linear matter power spectrum of a cosmology")]
struct Args {
    /// JSON parameter file; overrides the individual parameter flags
    #[arg(long)]
    params: Option<PathBuf>,

    /// JSON power configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cold dark matter density
    #[arg(long, default_value_t = 0.25)]
    omega_c: f64,

    /// Baryon density
    #[arg(long, default_value_t = 0.05)]
    omega_b: f64,

    /// Dimensionless Hubble parameter
    #[arg(long, default_value_t = 0.7)]
    h: f64,

    /// Primordial spectral index
    #[arg(long, default_value_t = 0.96)]
    n_s: f64,

    /// Amplitude as sigma8 (ignored when --a-s is given)
    #[arg(long, default_value_t = 0.8)]
    sigma8: f64,

    /// Amplitude as the primordial A_s
    #[arg(long)]
    a_s: Option<f64>,

    /// Transfer function (bbks, eisenstein_hu, eisenstein_hu_no_wiggles, boltzmann)
    #[arg(long)]
    transfer: Option<TransferFunctionMethod>,

    /// Non-linear method (linear, halofit)
    #[arg(long)]
    matter_power: Option<MatterPowerMethod>,

    /// Redshift of the dump
    #[arg(short, long, default_value_t = 0.0)]
    redshift: f64,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parameter_set(args: &Args) -> Result<ParameterSet, Box<dyn std::error::Error>> {
    if let Some(path) = &args.params {
        return Ok(ParameterSet::from_json_file(path)?);
    }
    let mut raw = ParameterSet::lcdm(args.omega_c, args.omega_b, args.h, args.n_s, args.sigma8);
    if args.a_s.is_some() {
        raw.a_s = args.a_s;
        raw.sigma8 = None;
    }
    Ok(raw)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PowerConfig::from_json_file(path)?,
        None => PowerConfig::default(),
    };
    if let Some(transfer) = args.transfer {
        config.transfer_function = transfer;
    }
    if let Some(matter_power) = args.matter_power {
        config.matter_power = matter_power;
    }

    let params = CosmologicalParameters::try_from(parameter_set(&args)?)?;
    let mut cosmo = Cosmology::new(params, config)?;
    cosmo.compute_power()?;
    info!("sigma8 = {:.6}", cosmo.sigma8()?);

    match &args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            cosmo.write_linear_power(args.redshift, &mut writer)?;
            writer.flush()?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut writer = io::stdout().lock();
            cosmo.write_linear_power(args.redshift, &mut writer)?;
        }
    }

    if cosmo.status().integration_warnings() > 0 {
        info!(
            "{} integrals stopped short of their tolerance",
            cosmo.status().integration_warnings()
        );
    }
    Ok(())
}
