//! Metallicity grid, binary fractions and singles-to-binaries mass ratios.
//!
//! The grid belongs to one population-synthesis study: 15 log-spaced
//! metallicities between 1e-4 and 0.03 (rounded to 8 decimals) preceded by
//! zero, with a binary fraction and a ratio of mass in singles to mass in
//! binaries for every interval. Values are reference constants and must not
//! be recomputed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::Z_SUN;
use crate::errors::{DwdError, ErrorInfo};

/// Number of metallicity intervals in the reference grid.
pub const NUM_BINS: usize = 15;

const BOUNDARIES: [f64; NUM_BINS + 1] = [
    0.0, 0.0001, 0.00015029, 0.00022588, 0.00033948, 0.00051021, 0.00076681, 0.00115245,
    0.00173205, 0.00260314, 0.00391233, 0.00587993, 0.0088371, 0.01328149, 0.01996108, 0.03,
];

const BINARY_FRACTIONS: [f64; NUM_BINS] = [
    0.4847, 0.4732, 0.4618, 0.4503, 0.4388, 0.4274, 0.4159, 0.4044, 0.3776, 0.3426, 0.3076,
    0.2726, 0.2376, 0.2027, 0.1677,
];

const MASS_RATIOS: [f64; NUM_BINS] = [
    0.68, 0.71, 0.74, 0.78, 0.82, 0.86, 0.9, 0.94, 1.05, 1.22, 1.44, 1.7, 2.05, 2.51, 3.17,
];

const FIXED_BINARY_FRACTION: f64 = 0.5;
const FIXED_MASS_RATIO: f64 = 0.64;

static REFERENCE: MetallicityGrid = MetallicityGrid {
    boundaries: BOUNDARIES,
    binary_fractions: BINARY_FRACTIONS,
    mass_ratios: MASS_RATIOS,
    fixed_binary_fraction: FIXED_BINARY_FRACTION,
    fixed_mass_ratio: FIXED_MASS_RATIO,
};

/// Read-only lookup of metallicity boundaries and per-bin population constants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetallicityGrid {
    boundaries: [f64; NUM_BINS + 1],
    binary_fractions: [f64; NUM_BINS],
    mass_ratios: [f64; NUM_BINS],
    fixed_binary_fraction: f64,
    fixed_mass_ratio: f64,
}

impl MetallicityGrid {
    /// Returns the process-wide reference grid.
    pub fn reference() -> &'static MetallicityGrid {
        &REFERENCE
    }

    /// Returns the 16 metallicity boundaries.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Returns the number of intervals.
    pub fn len(&self) -> usize {
        NUM_BINS
    }

    /// The reference grid is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the descriptor of interval `index`.
    pub fn bin(&self, index: usize) -> Result<MetallicityBin, DwdError> {
        if index >= NUM_BINS {
            return Err(DwdError::Lookup(
                ErrorInfo::new("grid-bin-range", "metallicity bin index out of range")
                    .with_context("index", index.to_string())
                    .with_context("bins", NUM_BINS.to_string()),
            ));
        }
        Ok(MetallicityBin {
            index,
            met_start: self.boundaries[index],
            met_end: self.boundaries[index + 1],
            last: index + 1 == NUM_BINS,
            binary_fraction: self.binary_fractions[index],
            mass_ratio: self.mass_ratios[index],
        })
    }

    /// Iterates every interval in ascending metallicity.
    pub fn bins(&self) -> impl Iterator<Item = MetallicityBin> + '_ {
        (0..NUM_BINS).filter_map(move |index| self.bin(index).ok())
    }

    /// Returns the bin hosting a star particle of metallicity `met_solar` (Z☉ units).
    pub fn bin_for_host(&self, met_solar: f64) -> Option<MetallicityBin> {
        self.bins().find(|bin| bin.contains_host(met_solar))
    }

    /// Binary fraction assigned to `bin` by `model`.
    pub fn binary_fraction(&self, bin: &MetallicityBin, model: BinaryFractionModel) -> f64 {
        match model {
            BinaryFractionModel::Variable => self.binary_fractions[bin.index],
            BinaryFractionModel::Fixed50 => self.fixed_binary_fraction,
        }
    }

    /// Singles-to-binaries mass ratio assigned to `bin` by `model`.
    pub fn mass_ratio(&self, bin: &MetallicityBin, model: BinaryFractionModel) -> f64 {
        match model {
            BinaryFractionModel::Variable => self.mass_ratios[bin.index],
            BinaryFractionModel::Fixed50 => self.fixed_mass_ratio,
        }
    }
}

/// One metallicity interval of the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetallicityBin {
    /// Position of the interval within the grid.
    pub index: usize,
    /// Lower boundary (absolute metallicity, inclusive).
    pub met_start: f64,
    /// Upper boundary (absolute metallicity, exclusive unless `last`).
    pub met_end: f64,
    /// Whether this is the final, upward-unbounded interval.
    pub last: bool,
    /// Metallicity-dependent binary fraction.
    pub binary_fraction: f64,
    /// Metallicity-dependent singles-to-binaries mass ratio.
    pub mass_ratio: f64,
}

impl MetallicityBin {
    /// Metallicity used to name population tables and result bundles.
    pub fn label_met(&self) -> f64 {
        self.met_end
    }

    /// Membership test for a host whose metallicity is in solar units.
    ///
    /// Intervals are left-inclusive and right-exclusive; the last interval
    /// accepts everything at or above its lower edge.
    pub fn contains_host(&self, met_solar: f64) -> bool {
        let start = self.met_start / Z_SUN;
        if self.last {
            return met_solar >= start;
        }
        let end = self.met_end / Z_SUN;
        met_solar >= start && met_solar < end
    }
}

/// Binary-fraction model applied when normalising a population table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryFractionModel {
    /// Metallicity-dependent binary fraction (`FZ`).
    Variable,
    /// Constant 50% binary fraction (`F50`).
    Fixed50,
}

impl BinaryFractionModel {
    /// All supported models.
    pub const ALL: [BinaryFractionModel; 2] =
        [BinaryFractionModel::Variable, BinaryFractionModel::Fixed50];

    /// Short label used in aggregate file names.
    pub fn label(&self) -> &'static str {
        match self {
            BinaryFractionModel::Variable => "FZ",
            BinaryFractionModel::Fixed50 => "F50",
        }
    }
}

impl fmt::Display for BinaryFractionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Formats a grid value (metallicity or binary fraction) for file names.
///
/// Uses the shortest representation that round-trips, so `0.00015029`
/// stays `0.00015029` and `0.5` stays `0.5`.
pub fn format_grid_value(value: f64) -> String {
    format!("{value}")
}
