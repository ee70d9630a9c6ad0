//! Zero-temperature white dwarf mass–radius relation (Tout et al. 1997).

use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::BinaryRecord;

/// Chandrasekhar mass in M☉.
pub const CHANDRASEKHAR_MASS: f64 = 1.44;

/// Radius floor in R☉, reached at and above the Chandrasekhar mass.
pub const NEUTRON_STAR_RADIUS: f64 = 1.4e-5;

/// White dwarf radius in R☉ for a mass in M☉.
pub fn wd_radius(mass: f64) -> Result<f64, DwdError> {
    if mass.is_nan() || mass <= 0.0 {
        return Err(DwdError::Physics(
            ErrorInfo::new("wd-mass-domain", "white dwarf mass must be positive")
                .with_context("mass", mass.to_string()),
        ));
    }
    if mass >= CHANDRASEKHAR_MASS {
        return Ok(NEUTRON_STAR_RADIUS);
    }
    let ratio = CHANDRASEKHAR_MASS / mass;
    let radius = 0.0115 * (ratio.powf(2.0 / 3.0) - ratio.powf(-2.0 / 3.0)).sqrt();
    Ok(radius.max(NEUTRON_STAR_RADIUS))
}

/// Replaces both component radii of `binary` with the mass–radius relation.
pub fn apply_wd_radii(binary: &mut BinaryRecord) -> Result<(), DwdError> {
    binary.rad_1 = wd_radius(binary.mass_1)?;
    binary.rad_2 = wd_radius(binary.mass_2)?;
    Ok(())
}
