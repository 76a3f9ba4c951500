//! Physical constants used by the background and neutrino calculations.

/// Physical constants in SI units.
///
/// Values follow CODATA 2014 so that neutrino densities reproduce the
/// commonly quoted m_ν / (Ω_ν h²) ≈ 93.14 eV.
pub struct SI {}

impl SI {
    /// Speed of light
    /// Units: m/s
    pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

    /// Boltzmann constant
    /// Units: J/K
    pub const BOLTZMANN: f64 = 1.380_648_52e-23;

    /// Planck constant
    /// Units: J⋅s
    pub const PLANCK: f64 = 6.626_070_040e-34;

    /// Newton's gravitational constant
    /// Units: m³ kg⁻¹ s⁻²
    pub const GRAVITATION: f64 = 6.674_08e-11;

    /// One megaparsec
    /// Units: m
    pub const MPC: f64 = 3.085_677_581_49e22;

    /// One electron volt
    /// Units: J
    pub const EV: f64 = 1.602_176_620_8e-19;
}

/// c / (100 km/s), so that H0 = h / HUBBLE_DISTANCE_MPC in 1/Mpc.
pub const HUBBLE_DISTANCE_MPC: f64 = 2997.924_58;

/// Effective temperature of non-cold dark matter species in units of T_CMB.
///
/// Matches the Boltzmann-code convention that gives m_ν / Ω_ν h² = 93.14 eV.
pub const T_NCDM: f64 = 0.716_11;

/// Default CMB temperature in K.
pub const T_CMB_DEFAULT: f64 = 2.725;
