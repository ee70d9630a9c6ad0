//! Closed-form physics for double white dwarf binaries.
//!
//! Everything in this crate is stateless. Separations are in solar radii,
//! masses in solar masses, periods in days and times in Myr at the public
//! boundary; SI units are used internally.

pub mod chirp;
pub mod peters;
pub mod placement;
pub mod roche;
pub mod white_dwarf;

pub use chirp::{chirp_fdot, chirp_mass, is_chirping};
pub use peters::{
    evolve, gw_decay_rate, gw_frequency, period_from_separation, separation_at_time,
    time_to_merger, time_to_reach_separation,
};
pub use placement::{place, sample_unit_sphere_offsets};
pub use roche::{roche_lobe_fraction, roche_lobe_separation, time_to_roche_contact};
pub use white_dwarf::{apply_wd_radii, wd_radius, CHANDRASEKHAR_MASS, NEUTRON_STAR_RADIUS};
