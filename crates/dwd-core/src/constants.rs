//! Physical and survey constants used throughout the pipeline.
//!
//! Values follow CODATA 2018 / IAU 2015 nominal values. The solar
//! galactocentric position is the Galactocentric frame evaluated for the Sun
//! on 2021-04-23; it is frozen here so no coordinate transform is needed at
//! runtime.

/// Newtonian constant of gravitation in m^3 kg^-1 s^-2.
pub const G: f64 = 6.674_30e-11;

/// Speed of light in m s^-1.
pub const C: f64 = 299_792_458.0;

/// Nominal solar mass in kg.
pub const M_SUN_KG: f64 = 1.988_409_870_698_051e30;

/// Nominal solar radius in m.
pub const R_SUN_M: f64 = 6.957e8;

/// Seconds in one megayear (Julian years).
pub const SECONDS_PER_MYR: f64 = 3.155_76e13;

/// Seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Seconds in one Julian year.
pub const SECONDS_PER_YEAR: f64 = 3.155_76e7;

/// Metres in one kiloparsec.
pub const M_PER_KPC: f64 = 3.085_677_581_491_367e19;

/// Solar metallicity used to convert star-particle metallicities.
pub const Z_SUN: f64 = 0.02;

/// Galactocentric y coordinate of the Sun in kpc.
pub const SUN_Y_GX_KPC: f64 = 8.122;

/// Galactocentric z coordinate of the Sun in kpc.
pub const SUN_Z_GX_KPC: f64 = 0.0208;

/// Mass of a single galaxy-simulation star particle in solar masses.
pub const STAR_PARTICLE_MASS: f64 = 7070.0;

/// Lower edge of the detector band in Hz (inclusive).
pub const BAND_FLOOR_HZ: f64 = 1e-4;

/// Megayears per gigayear, used for star particle ages.
pub const MYR_PER_GYR: f64 = 1000.0;
