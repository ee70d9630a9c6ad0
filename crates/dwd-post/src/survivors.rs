//! Band survivors read back from result bundles.

use std::path::Path;

use dwd_core::errors::DwdError;
use dwd_core::{BinaryFractionModel, BinaryType, LbandRow, MetallicityGrid};
use dwd_galaxy::ResultBundle;

use crate::report::DatasetGap;

/// Survivors of one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleRows {
    /// Binary type of the bundle.
    pub binary_type: BinaryType,
    /// Metallicity bin index.
    pub bin_index: usize,
    /// Result rows in file order.
    pub rows: Vec<LbandRow>,
}

/// Every readable bundle of a model plus the bundles that were missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurvivorSet {
    /// One entry per readable bundle.
    pub bundles: Vec<BundleRows>,
    /// Unreadable bundles.
    pub gaps: Vec<DatasetGap>,
}

impl SurvivorSet {
    /// Rows of one binary type across bins.
    pub fn rows_of(&self, binary_type: BinaryType) -> impl Iterator<Item = &LbandRow> + '_ {
        self.bundles
            .iter()
            .filter(move |bundle| bundle.binary_type == binary_type)
            .flat_map(|bundle| bundle.rows.iter())
    }

    /// Every row, tagged with its binary type.
    pub fn rows(&self) -> impl Iterator<Item = (BinaryType, &LbandRow)> + '_ {
        self.bundles
            .iter()
            .flat_map(|bundle| bundle.rows.iter().map(move |row| (bundle.binary_type, row)))
    }

    /// Number of rows across bundles.
    pub fn len(&self) -> usize {
        self.bundles.iter().map(|bundle| bundle.rows.len()).sum()
    }

    /// Whether no rows were read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads the result table of one bundle.
pub fn read_bundle_rows(
    root: &Path,
    binary_type: BinaryType,
    model: BinaryFractionModel,
    bin_index: usize,
) -> Result<Vec<LbandRow>, DwdError> {
    let grid = MetallicityGrid::reference();
    let bin = grid.bin(bin_index)?;
    let bundle = ResultBundle::open(
        root,
        binary_type,
        bin.label_met(),
        grid.binary_fraction(&bin, model),
    )?;
    bundle.read_rows()
}

/// Reads every (binary type, bin) bundle of `model` under `root`.
pub fn collect_survivors(
    root: &Path,
    binary_types: &[BinaryType],
    model: BinaryFractionModel,
    bins: &[usize],
) -> Result<SurvivorSet, DwdError> {
    let mut set = SurvivorSet::default();
    for &binary_type in binary_types {
        for &bin_index in bins {
            match read_bundle_rows(root, binary_type, model, bin_index) {
                Ok(rows) => set.bundles.push(BundleRows {
                    binary_type,
                    bin_index,
                    rows,
                }),
                Err(err) => set
                    .gaps
                    .push(DatasetGap::capture(binary_type, model, bin_index, err)?),
            }
        }
    }
    Ok(set)
}
