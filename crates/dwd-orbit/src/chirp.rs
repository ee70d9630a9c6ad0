//! Chirp mass and frequency drift of circular inspirals.

use std::f64::consts::PI;

use dwd_core::constants::{C, G, M_SUN_KG};

/// Chirp mass in M☉.
pub fn chirp_mass(mass_1: f64, mass_2: f64) -> f64 {
    (mass_1 * mass_2).powf(0.6) / (mass_1 + mass_2).powf(0.2)
}

/// Gravitational-wave frequency drift ḟ in Hz s⁻¹ for an orbital frequency in Hz.
pub fn chirp_fdot(mass_1: f64, mass_2: f64, f_orb: f64) -> f64 {
    let mc = chirp_mass(mass_1, mass_2) * M_SUN_KG;
    let f_orb_dot =
        96.0 / 5.0 * PI.powf(8.0 / 3.0) * (G * mc / C.powi(3)).powf(5.0 / 3.0) * f_orb.powf(11.0 / 3.0);
    2.0 * f_orb_dot
}

/// Whether the drift is measurable over an observation of `t_obs_s` seconds.
pub fn is_chirping(fdot: f64, t_obs_s: f64) -> bool {
    fdot > 1.0 / (t_obs_s * t_obs_s)
}
