//! DWD formation efficiency per unit simulated stellar mass.

use std::path::Path;

use dwd_core::errors::DwdError;
use dwd_core::{BinaryFractionModel, BinaryType, MetallicityBin, MetallicityGrid};
use dwd_galaxy::codec::{append_csv, truncate};
use dwd_galaxy::{PopulationSource, ResultBundle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::report::{AggregateReport, DatasetGap};

/// Where the mass normalisation is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MassSource {
    /// `mass_total` recorded in the result bundle.
    Bundle,
    /// `mass_binaries × (1 + ratio)` recomputed from the population table.
    Population,
}

/// One metallicity bin of the efficiency table; absent inputs leave the cell empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyRow {
    /// Metallicity bin index.
    pub bin: usize,
    /// Upper metallicity boundary of the bin.
    pub met: f64,
    /// He + He.
    #[serde(rename = "He")]
    pub he: Option<f64>,
    /// CO + He.
    #[serde(rename = "COHe")]
    pub co_he: Option<f64>,
    /// CO + CO.
    #[serde(rename = "CO")]
    pub co: Option<f64>,
    /// ONe + X.
    #[serde(rename = "ONe")]
    pub one: Option<f64>,
}

impl EfficiencyRow {
    fn new(bin: &MetallicityBin) -> Self {
        Self {
            bin: bin.index,
            met: bin.label_met(),
            he: None,
            co_he: None,
            co: None,
            one: None,
        }
    }

    fn cell_mut(&mut self, binary_type: BinaryType) -> &mut Option<f64> {
        match binary_type {
            BinaryType::HeHe => &mut self.he,
            BinaryType::COHe => &mut self.co_he,
            BinaryType::COCO => &mut self.co,
            BinaryType::ONeX => &mut self.one,
        }
    }

    /// Efficiency of `binary_type` in this bin.
    pub fn get(&self, binary_type: BinaryType) -> Option<f64> {
        match binary_type {
            BinaryType::HeHe => self.he,
            BinaryType::COHe => self.co_he,
            BinaryType::COCO => self.co,
            BinaryType::ONeX => self.one,
        }
    }
}

/// Efficiency table of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct FormationEfficiency {
    /// Binary-fraction model.
    pub model: BinaryFractionModel,
    /// One row per requested bin.
    pub rows: Vec<EfficiencyRow>,
    /// Inputs that could not be read.
    pub gaps: Vec<DatasetGap>,
}

fn mass_total(
    source: &dyn PopulationSource,
    bundle_root: &Path,
    binary_type: BinaryType,
    model: BinaryFractionModel,
    bin: &MetallicityBin,
    mass: MassSource,
) -> Result<f64, DwdError> {
    let grid = MetallicityGrid::reference();
    match mass {
        MassSource::Bundle => ResultBundle::open(
            bundle_root,
            binary_type,
            bin.label_met(),
            grid.binary_fraction(bin, model),
        )?
        .read_mass_total(),
        MassSource::Population => {
            let mass_binaries = source.mass_binaries(binary_type, bin.label_met())?;
            Ok(mass_binaries * (1.0 + grid.mass_ratio(bin, model)))
        }
    }
}

/// Number of DWDs formed per solar mass of stars, per binary type and bin.
pub fn formation_efficiency(
    source: &dyn PopulationSource,
    bundle_root: &Path,
    binary_types: &[BinaryType],
    model: BinaryFractionModel,
    bins: &[usize],
    mass: MassSource,
) -> Result<FormationEfficiency, DwdError> {
    let grid = MetallicityGrid::reference();
    let mut rows = Vec::with_capacity(bins.len());
    let mut gaps = Vec::new();
    for &bin_index in bins {
        let bin = grid.bin(bin_index)?;
        let mut row = EfficiencyRow::new(&bin);
        for &binary_type in binary_types {
            let efficiency = source
                .conv(binary_type, bin.label_met())
                .and_then(|conv| {
                    let total = mass_total(source, bundle_root, binary_type, model, &bin, mass)?;
                    Ok(conv.len() as f64 / total)
                });
            match efficiency {
                Ok(value) => {
                    debug!(label = binary_type.label(), bin = bin_index, efficiency = value, "efficiency");
                    *row.cell_mut(binary_type) = Some(value);
                }
                Err(err) => gaps.push(DatasetGap::capture(binary_type, model, bin_index, err)?),
            }
        }
        rows.push(row);
    }
    info!(model = model.label(), bins = rows.len(), gaps = gaps.len(), "formation efficiency");
    Ok(FormationEfficiency { model, rows, gaps })
}

/// Writes `DWDeff_{model}.csv` under `dir` and returns the run summary.
pub fn write_formation_efficiency(
    dir: &Path,
    table: &FormationEfficiency,
) -> Result<AggregateReport, DwdError> {
    let path = dir.join(format!("DWDeff_{}.csv", table.model.label()));
    truncate(&path)?;
    append_csv(&path, &table.rows)?;
    let mut report = AggregateReport::new("formeff", table.model);
    report.outputs.push(path);
    report.gaps = table.gaps.clone();
    Ok(report)
}
