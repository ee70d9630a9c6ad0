//! Uniform jitter of binaries inside their host particle's smoothing kernel.

use dwd_core::constants::{SUN_Y_GX_KPC, SUN_Z_GX_KPC};
use dwd_core::{HostParticle, Placement};
use rand::Rng;

/// Cube draws per accepted point; 6/π rounded up.
const DRAWS_PER_ACCEPT: f64 = 1.91;

/// Draws exactly `n` points uniformly inside the unit ball.
///
/// Points are rejection sampled from the enclosing cube. Each round draws
/// enough candidates to cover the remaining deficit on average, so the loop
/// terminates after a handful of rounds even for very large `n`.
pub fn sample_unit_sphere_offsets<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<[f64; 3]> {
    let mut accepted = Vec::with_capacity(n);
    while accepted.len() < n {
        let deficit = n - accepted.len();
        let draws = (deficit as f64 * DRAWS_PER_ACCEPT).ceil() as usize + 1;
        for _ in 0..draws {
            let point = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            let norm_sq: f64 = point.iter().map(|c| c * c).sum();
            if norm_sq <= 1.0 {
                accepted.push(point);
                if accepted.len() == n {
                    break;
                }
            }
        }
    }
    accepted
}

/// Offsets the host position by `offset` scaled with the smoothing length.
pub fn place(host: &HostParticle, offset: [f64; 3]) -> Placement {
    let x = host.x_gx + offset[0] * host.kern_len;
    let y = host.y_gx + offset[1] * host.kern_len;
    let z = host.z_gx + offset[2] * host.kern_len;
    let dist_sun = (x * x + (y - SUN_Y_GX_KPC).powi(2) + (z - SUN_Z_GX_KPC).powi(2)).sqrt();
    Placement { x, y, z, dist_sun }
}
