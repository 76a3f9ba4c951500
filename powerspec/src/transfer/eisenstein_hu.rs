//! Eisenstein & Hu (1998) fitting formulae for the matter transfer function
//!
//! Equation numbers refer to astro-ph/9709112. Internally every scale is in
//! h/Mpc; [`EisensteinHuParameters::power`] takes k in 1/Mpc and converts.

use std::f64::consts::E;

use crate::params::CosmologicalParameters;

/// Derived scales and coefficients of the Eisenstein & Hu fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EisensteinHuParameters {
    /// Θ_2.7 = T_CMB / 2.7 K
    pub th2p7: f64,
    /// Redshift of matter-radiation equality
    pub zeq: f64,
    /// Horizon scale at equality (h/Mpc)
    pub keq: f64,
    /// Drag epoch redshift
    pub zdrag: f64,
    /// Sound horizon at the drag epoch (Mpc/h)
    pub rsound: f64,
    /// Silk damping scale (h/Mpc)
    pub k_silk: f64,
    pub alpha_c: f64,
    pub beta_c: f64,
    pub alpha_b: f64,
    pub beta_b: f64,
    /// Node shift
    pub beta_node: f64,
    /// Approximate sound horizon used by the no-wiggle shape (Mpc/h)
    pub rsound_approx: f64,
    /// Ω_b / Ω_m
    baryon_fraction: f64,
    /// Ω_m h
    omega_m_h: f64,
    /// Ω_m h²
    omh2: f64,
    n_s: f64,
    h: f64,
}

impl EisensteinHuParameters {
    pub fn new(params: &CosmologicalParameters) -> Self {
        let h = params.h;
        let omh2 = params.omega_m * h * h;
        let obh2 = params.omega_b * h * h;
        let th2p7 = params.t_cmb / 2.7;
        let th4 = th2p7.powi(4);

        let zeq = 2.5e4 * omh2 / th4; // Eq. 2
        let keq = 0.0746 * omh2 / (h * th2p7 * th2p7); // Eq. 3

        // Eq. 4
        let b1 = 0.313 * omh2.powf(-0.419) * (1.0 + 0.607 * omh2.powf(0.674));
        let b2 = 0.238 * omh2.powf(0.223);
        let zdrag = 1291.0 * omh2.powf(0.251) * (1.0 + b1 * obh2.powf(b2))
            / (1.0 + 0.659 * omh2.powf(0.828));

        // Baryon-to-photon momentum ratios at equality and drag, Eq. 5
        let req = 31.5 * obh2 * 1000.0 / (zeq * th4);
        let rd = 31.5 * obh2 * 1000.0 / ((1.0 + zdrag) * th4);
        let rsound = 2.0 / (3.0 * keq)
            * (6.0 / req).sqrt()
            * (((1.0 + rd).sqrt() + (rd + req).sqrt()) / (1.0 + req.sqrt())).ln();

        // Eq. 7
        let k_silk = 1.6 * obh2.powf(0.52) * omh2.powf(0.73) * (1.0 + (10.4 * omh2).powf(-0.95)) / h;

        // Eq. 11
        let a1 = (46.9 * omh2).powf(0.670) * (1.0 + (32.1 * omh2).powf(-0.532));
        let a2 = (12.0 * omh2).powf(0.424) * (1.0 + (45.0 * omh2).powf(-0.582));
        let fb = obh2 / omh2;
        let alpha_c = a1.powf(-fb) * a2.powf(-fb * fb * fb);

        // Eq. 12
        let bb1 = 0.944 / (1.0 + (458.0 * omh2).powf(-0.708));
        let bb2 = (0.395 * omh2).powf(-0.0266);
        let beta_c = 1.0 / (1.0 + bb1 * ((1.0 - fb).powf(bb2) - 1.0));

        // Eqs. 14 and 15
        let y = zeq / (1.0 + zdrag);
        let sqy = (1.0 + y).sqrt();
        let gy = y * (-6.0 * sqy + (2.0 + 3.0 * y) * ((sqy + 1.0) / (sqy - 1.0)).ln());
        let alpha_b = 2.07 * keq * rsound * (1.0 + rd).powf(-0.75) * gy;

        let beta_b = 0.5 + fb + (3.0 - 2.0 * fb) * ((17.2 * omh2).powi(2) + 1.0).sqrt(); // Eq. 24
        let beta_node = 8.41 * omh2.powf(0.435); // Eq. 23
        let rsound_approx = h * 44.5 * (9.83 / omh2).ln() / (1.0 + 10.0 * obh2.powf(0.75)).sqrt(); // Eq. 26

        Self {
            th2p7,
            zeq,
            keq,
            zdrag,
            rsound,
            k_silk,
            alpha_c,
            beta_c,
            alpha_b,
            beta_b,
            beta_node,
            rsound_approx,
            baryon_fraction: params.omega_b / params.omega_m,
            omega_m_h: params.omega_m * h,
            omh2,
            n_s: params.n_s,
            h,
        }
    }

    /// Pressureless transfer function T̃_0, Eq. 19, with q from Eq. 10.
    fn t0(&self, k: f64, alpha: f64, beta: f64) -> f64 {
        let q = k / (13.41 * self.keq);
        let c = 14.2 / alpha + 386.0 / (1.0 + 69.9 * q.powf(1.08)); // Eq. 20
        let l = (E + 1.8 * beta * q).ln();
        l / (l + c * q * q)
    }

    /// CDM transfer function, Eqs. 17 and 18.
    fn t_cdm(&self, k: f64) -> f64 {
        let f = 1.0 / (1.0 + (k * self.rsound / 5.4).powi(4));
        f * self.t0(k, 1.0, self.beta_c) + (1.0 - f) * self.t0(k, self.alpha_c, self.beta_c)
    }

    /// Baryon transfer function, Eq. 21.
    fn t_baryon(&self, k: f64) -> f64 {
        let x = k * self.rsound;
        let (x_tilde, damped) = if k == 0.0 {
            (0.0, 0.0)
        } else {
            let shifted = x * (1.0 + self.beta_node.powi(3) / (x * x * x)).powf(-1.0 / 3.0);
            let damped = self.alpha_b / (1.0 + (self.beta_b / x).powi(3)) * (-(k / self.k_silk).powf(1.4)).exp();
            (shifted, damped)
        };
        let undamped = self.t0(k, 1.0, 1.0) / (1.0 + (x / 5.2).powi(2));
        spherical_j0(x_tilde) * (undamped + damped)
    }

    /// Zero-baryon-wiggle shape T_0, Eqs. 28 to 31.
    fn t_no_wiggle(&self, k: f64) -> f64 {
        let fb = self.baryon_fraction;
        let alpha_gamma = 1.0 - 0.328 * (431.0 * self.omh2).ln() * fb + 0.38 * (22.3 * self.omh2).ln() * fb * fb;
        let gamma_eff = self.omega_m_h
            * (alpha_gamma + (1.0 - alpha_gamma) / (1.0 + (0.43 * k * self.rsound_approx).powi(4)));
        let q = k * self.th2p7 * self.th2p7 / gamma_eff;
        let l0 = (2.0 * E + 1.8 * q).ln();
        let c0 = 14.2 + 731.0 / (1.0 + 62.5 * q);
        l0 / (l0 + c0 * q * q)
    }

    /// T²(k) for `k` in h/Mpc.
    pub fn transfer_squared(&self, k: f64, wiggles: bool) -> f64 {
        let t = if wiggles {
            let fb = self.baryon_fraction;
            fb * self.t_baryon(k) + (1.0 - fb) * self.t_cdm(k) // Eq. 8
        } else {
            self.t_no_wiggle(k)
        };
        t * t
    }

    /// Unnormalized linear power k^{n_s} T²(k) for `k` in 1/Mpc.
    pub fn power(&self, k: f64, wiggles: bool) -> f64 {
        k.powf(self.n_s) * self.transfer_squared(k / self.h, wiggles)
    }
}

fn spherical_j0(x: f64) -> f64 {
    let x2 = x * x;
    if x2 < 1e-4 {
        1.0 - x2 * (1.0 - x2 / 20.0) / 6.0
    } else {
        x.sin() / x
    }
}
