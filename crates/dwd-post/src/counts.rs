//! Band survivors counted in bins of host metallicity.

use std::collections::BTreeMap;
use std::path::Path;

use dwd_core::constants::Z_SUN;
use dwd_core::errors::DwdError;
use dwd_core::{BinaryFractionModel, BinaryType};
use dwd_galaxy::codec::{append_csv, truncate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::report::{AggregateReport, DatasetGap};
use crate::stat::{logspace, Histogram};
use crate::survivors::collect_survivors;

/// Number of metallicity edges.
pub const COUNT_EDGES: usize = 30;
/// Lowest star-particle metallicity in Z☉.
pub const HOST_MET_MIN: f64 = 0.00015;
/// Highest star-particle metallicity in Z☉.
pub const HOST_MET_MAX: f64 = 13.346;

/// Log-spaced absolute-metallicity edges spanning the star-particle catalog.
pub fn metallicity_edges() -> Vec<f64> {
    logspace(HOST_MET_MIN, HOST_MET_MAX, COUNT_EDGES)
        .into_iter()
        .map(|edge| edge * Z_SUN)
        .collect()
}

/// Histograms of one model, keyed by binary type.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCounts {
    /// Binary-fraction model.
    pub model: BinaryFractionModel,
    /// Shared edges.
    pub edges: Vec<f64>,
    /// Counts per binary type; types without readable bundles hold zeros.
    pub histograms: BTreeMap<BinaryType, Histogram>,
    /// Bundles that could not be read.
    pub gaps: Vec<DatasetGap>,
}

impl SourceCounts {
    /// Counts of `binary_type`, zeros when it was not requested.
    pub fn counts(&self, binary_type: BinaryType) -> Vec<u64> {
        self.histograms
            .get(&binary_type)
            .map(|hist| hist.counts.clone())
            .unwrap_or_else(|| vec![0; self.edges.len().saturating_sub(1)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CountRow {
    met_lo: f64,
    met_hi: f64,
    #[serde(rename = "He")]
    he: u64,
    #[serde(rename = "COHe")]
    co_he: u64,
    #[serde(rename = "CO")]
    co: u64,
    #[serde(rename = "ONe")]
    one: u64,
}

/// Histogram of host metallicity (`met × Z☉`) of every band survivor.
pub fn source_counts(
    bundle_root: &Path,
    binary_types: &[BinaryType],
    model: BinaryFractionModel,
    bins: &[usize],
) -> Result<SourceCounts, DwdError> {
    let survivors = collect_survivors(bundle_root, binary_types, model, bins)?;
    let edges = metallicity_edges();
    let histograms: BTreeMap<BinaryType, Histogram> = binary_types
        .iter()
        .map(|&binary_type| {
            let values = survivors.rows_of(binary_type).map(|row| row.host_met * Z_SUN);
            (binary_type, Histogram::from_values(edges.clone(), values))
        })
        .collect();
    info!(
        model = model.label(),
        rows = survivors.len(),
        gaps = survivors.gaps.len(),
        "source counts"
    );
    Ok(SourceCounts {
        model,
        edges,
        histograms,
        gaps: survivors.gaps,
    })
}

/// Writes `numLISA_30bins_{model}.csv` under `dir`.
pub fn write_source_counts(dir: &Path, counts: &SourceCounts) -> Result<AggregateReport, DwdError> {
    let path = dir.join(format!("numLISA_30bins_{}.csv", counts.model.label()));
    let he = counts.counts(BinaryType::HeHe);
    let co_he = counts.counts(BinaryType::COHe);
    let co = counts.counts(BinaryType::COCO);
    let one = counts.counts(BinaryType::ONeX);
    let rows: Vec<CountRow> = counts
        .edges
        .windows(2)
        .enumerate()
        .map(|(idx, pair)| CountRow {
            met_lo: pair[0],
            met_hi: pair[1],
            he: he[idx],
            co_he: co_he[idx],
            co: co[idx],
            one: one[idx],
        })
        .collect();
    truncate(&path)?;
    append_csv(&path, &rows)?;
    let mut report = AggregateReport::new("counts", counts.model);
    report.outputs.push(path);
    report.gaps = counts.gaps.clone();
    Ok(report)
}
