//! Separations and times of the first mass-transfer episodes of band survivors.
//!
//! For every surviving row the evolution history of its binary supplies the
//! first Roche-lobe overflow and the first common-envelope entry. Rows are
//! appended to `{label}_intersep_{model}.csv` bin by bin in fixed-size batches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dwd_core::errors::DwdError;
use dwd_core::{BinaryFractionModel, BinaryType, EvolutionEvent, LbandRow, MetallicityGrid};
use dwd_galaxy::codec::{append_csv, truncate};
use dwd_galaxy::PopulationSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::report::DatasetGap;
use crate::survivors::read_bundle_rows;

/// Rows written per append.
pub const WRITE_BATCH: usize = 100_000;

/// One survivor with its interaction history; absent episodes leave the cells empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRow {
    /// Population-table identifier.
    pub bin_num: u64,
    /// Host particle.
    #[serde(rename = "FIRE_index")]
    pub fire_index: u64,
    /// Progenitor metallicity.
    pub met: f64,
    /// Host metallicity in Z☉.
    pub host_met: f64,
    /// Primary radius in R☉.
    pub rad_1: f64,
    /// Secondary radius in R☉.
    pub rad_2: f64,
    /// Separation at the first common envelope, R☉.
    #[serde(rename = "CEsep")]
    pub ce_sep: Option<f64>,
    /// Time of the first common envelope, Myr.
    #[serde(rename = "CEtime")]
    pub ce_time: Option<f64>,
    /// Separation at the first Roche-lobe overflow, R☉.
    #[serde(rename = "RLOFsep")]
    pub rlof_sep: Option<f64>,
    /// Time of the first Roche-lobe overflow, Myr.
    #[serde(rename = "RLOFtime")]
    pub rlof_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FirstEpisodes {
    rlof: Option<(f64, f64)>,
    ce: Option<(f64, f64)>,
}

/// First RLOF and CE entry per `bin_num`, in history order.
fn first_episodes(history: &[EvolutionEvent]) -> HashMap<u64, FirstEpisodes> {
    let mut episodes: HashMap<u64, FirstEpisodes> = HashMap::new();
    for event in history {
        let episode = (event.sep, event.tphys);
        match event.evol_type {
            EvolutionEvent::RLOF => {
                episodes
                    .entry(event.bin_num)
                    .or_default()
                    .rlof
                    .get_or_insert(episode);
            }
            EvolutionEvent::COMMON_ENVELOPE => {
                episodes
                    .entry(event.bin_num)
                    .or_default()
                    .ce
                    .get_or_insert(episode);
            }
            _ => {}
        }
    }
    episodes
}

/// Joins survivors with the first interaction episodes of their binaries, sorted by `bin_num`.
pub fn join_interactions(rows: &[LbandRow], history: &[EvolutionEvent]) -> Vec<InteractionRow> {
    let episodes = first_episodes(history);
    let mut joined: Vec<InteractionRow> = rows
        .iter()
        .map(|row| {
            let first = episodes.get(&row.bin_num).copied().unwrap_or_default();
            InteractionRow {
                bin_num: row.bin_num,
                fire_index: row.fire_index,
                met: row.met,
                host_met: row.host_met,
                rad_1: row.rad_1,
                rad_2: row.rad_2,
                ce_sep: first.ce.map(|(sep, _)| sep),
                ce_time: first.ce.map(|(_, time)| time),
                rlof_sep: first.rlof.map(|(sep, _)| sep),
                rlof_time: first.rlof.map(|(_, time)| time),
            }
        })
        .collect();
    joined.sort_by_key(|row| row.bin_num);
    joined
}

/// Output of one (binary type, model) pass.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSummary {
    /// Table written.
    pub path: PathBuf,
    /// Rows written.
    pub rows_written: usize,
    /// Bins skipped for missing input.
    pub gaps: Vec<DatasetGap>,
}

/// File name of the interaction table of a binary type and model.
pub fn intersep_file_name(binary_type: BinaryType, model: BinaryFractionModel) -> String {
    format!("{}_intersep_{}.csv", binary_type.label(), model.label())
}

fn bin_interactions(
    source: &dyn PopulationSource,
    bundle_root: &Path,
    binary_type: BinaryType,
    model: BinaryFractionModel,
    bin_index: usize,
) -> Result<Vec<InteractionRow>, DwdError> {
    let rows = read_bundle_rows(bundle_root, binary_type, model, bin_index)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let bin = MetallicityGrid::reference().bin(bin_index)?;
    let history = source.evolution_history(binary_type, bin.label_met())?;
    Ok(join_interactions(&rows, &history))
}

/// Writes the interaction table of one binary type and model under `out_dir`.
pub fn interaction_separations(
    source: &dyn PopulationSource,
    bundle_root: &Path,
    out_dir: &Path,
    binary_type: BinaryType,
    model: BinaryFractionModel,
    bins: &[usize],
) -> Result<InteractionSummary, DwdError> {
    let path = out_dir.join(intersep_file_name(binary_type, model));
    truncate(&path)?;
    let mut rows_written = 0;
    let mut gaps = Vec::new();
    for &bin_index in bins {
        match bin_interactions(source, bundle_root, binary_type, model, bin_index) {
            Ok(rows) => {
                for batch in rows.chunks(WRITE_BATCH) {
                    rows_written += append_csv(&path, batch)?;
                }
                debug!(label = binary_type.label(), bin = bin_index, rows = rows.len(), "intersep bin");
            }
            Err(err) => gaps.push(DatasetGap::capture(binary_type, model, bin_index, err)?),
        }
    }
    info!(
        label = binary_type.label(),
        model = model.label(),
        rows = rows_written,
        gaps = gaps.len(),
        "interaction separations"
    );
    Ok(InteractionSummary {
        path,
        rows_written,
        gaps,
    })
}
