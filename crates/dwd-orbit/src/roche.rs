//! Roche-lobe contact of the secondary (Eggleton 1983 fit).

use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::BinaryRecord;

use crate::peters::time_to_reach_separation;

/// Roche-lobe radius of the secondary in units of the separation, for `q = m2 / m1`.
pub fn roche_lobe_fraction(q: f64) -> f64 {
    let q_23 = q.powf(2.0 / 3.0);
    0.49 * q_23 / (0.6 * q_23 + (1.0 + q.cbrt()).ln())
}

/// Separation in R☉ at which the secondary fills its Roche lobe.
pub fn roche_lobe_separation(binary: &BinaryRecord) -> Result<f64, DwdError> {
    if binary.mass_1 <= 0.0 || binary.mass_2 <= 0.0 {
        return Err(DwdError::Physics(
            ErrorInfo::new("roche-mass-domain", "Roche-lobe fit needs positive masses")
                .with_context("bin_num", binary.bin_num.to_string())
                .with_context("mass_1", binary.mass_1.to_string())
                .with_context("mass_2", binary.mass_2.to_string()),
        ));
    }
    let q = binary.mass_2 / binary.mass_1;
    Ok(binary.rad_2 / roche_lobe_fraction(q))
}

/// Time in Myr from formation until the secondary fills its Roche lobe.
///
/// Negative when the secondary already overflows at formation.
pub fn time_to_roche_contact(binary: &BinaryRecord) -> Result<f64, DwdError> {
    let contact = roche_lobe_separation(binary)?;
    Ok(time_to_reach_separation(binary, contact))
}
