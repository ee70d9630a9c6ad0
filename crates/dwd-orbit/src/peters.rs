//! Gravitational-wave driven decay of circular orbits (Peters 1964).

use std::f64::consts::PI;

use dwd_core::constants::{C, G, M_SUN_KG, R_SUN_M, SECONDS_PER_DAY, SECONDS_PER_MYR};
use dwd_core::{BinaryRecord, Evolution};

/// Decay constant β = (64/5) G³ m1 m2 (m1 + m2) / c⁵ in m⁴ s⁻¹.
///
/// Masses are given in solar masses.
pub fn gw_decay_rate(mass_1: f64, mass_2: f64) -> f64 {
    let m1 = mass_1 * M_SUN_KG;
    let m2 = mass_2 * M_SUN_KG;
    64.0 / 5.0 * G.powi(3) * m1 * m2 * (m1 + m2) / C.powi(5)
}

fn beta(binary: &BinaryRecord) -> f64 {
    gw_decay_rate(binary.mass_1, binary.mass_2)
}

/// Separation in R☉ after `t_myr` of inspiral from the formation separation.
///
/// Yields NaN once the system has merged; compare against
/// [`time_to_merger`] before calling.
pub fn separation_at_time(binary: &BinaryRecord, t_myr: f64) -> f64 {
    let a_i = binary.sep * R_SUN_M;
    let t = t_myr * SECONDS_PER_MYR;
    (a_i.powi(4) - 4.0 * beta(binary) * t).powf(0.25) / R_SUN_M
}

/// Keplerian orbital period in days for a separation in R☉.
pub fn period_from_separation(binary: &BinaryRecord, sep_rsun: f64) -> f64 {
    let a = sep_rsun * R_SUN_M;
    let total_mass = (binary.mass_1 + binary.mass_2) * M_SUN_KG;
    2.0 * PI * (a.powi(3) / (G * total_mass)).sqrt() / SECONDS_PER_DAY
}

/// Time in Myr for the orbit to shrink from its formation separation to `sep_rsun`.
pub fn time_to_reach_separation(binary: &BinaryRecord, sep_rsun: f64) -> f64 {
    let a_i = binary.sep * R_SUN_M;
    let a = sep_rsun * R_SUN_M;
    (a_i.powi(4) - a.powi(4)) / (4.0 * beta(binary)) / SECONDS_PER_MYR
}

/// Merger time in Myr measured from DWD formation.
pub fn time_to_merger(binary: &BinaryRecord) -> f64 {
    let a_i = binary.sep * R_SUN_M;
    a_i.powi(4) / (4.0 * beta(binary)) / SECONDS_PER_MYR
}

/// Gravitational-wave frequency in Hz for an orbital period in days.
pub fn gw_frequency(porb_days: f64) -> f64 {
    2.0 / (porb_days * SECONDS_PER_DAY)
}

/// Present-day orbit after `t_evol_myr` of inspiral.
pub fn evolve(binary: &BinaryRecord, t_evol_myr: f64) -> Evolution {
    let sep_f = separation_at_time(binary, t_evol_myr);
    let porb_f = period_from_separation(binary, sep_f);
    Evolution {
        t_evol: t_evol_myr,
        sep_f,
        porb_f,
        f_gw: gw_frequency(porb_f),
    }
}
