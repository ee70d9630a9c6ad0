//! Per-bin result bundles.
//!
//! One bundle directory exists per (binary type, metallicity, binary
//! fraction). Aggregators rebuild the directory name with [`bundle_name`]
//! from the same three inputs the driver used.

use std::fs;
use std::path::{Path, PathBuf};

use dwd_core::errors::DwdError;
use dwd_core::{format_grid_value, BinaryType, LbandRow, SystemId};
use serde::{Deserialize, Serialize};

use crate::codec::{append_csv, io_error, missing_dataset, read_csv, read_json, truncate, write_json};
use crate::dispatch::BinReport;
use crate::filter::{CheckpointStage, Checkpoints};

const RESULT_FILE: &str = "Lband.csv";
const MASS_TOTAL_FILE: &str = "mass_total.json";
const SEED_FILE: &str = "rand_seed.json";
const REPORT_FILE: &str = "report.json";
const CHECKPOINT_DIR: &str = "inter";

/// Directory name of the bundle for a binary type, metallicity and binary fraction.
pub fn bundle_name(binary_type: BinaryType, met: f64, binary_fraction: f64) -> String {
    format!(
        "Lband_{}_{}_{}",
        binary_type.label(),
        format_grid_value(met),
        format_grid_value(binary_fraction)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct MassTotal {
    mass_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct RandSeed {
    rand_seed: u64,
}

/// Handle on one bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBundle {
    dir: PathBuf,
}

impl ResultBundle {
    /// Handle for the bundle of the given key under `root`; nothing is touched on disk.
    pub fn at(root: &Path, binary_type: BinaryType, met: f64, binary_fraction: f64) -> Self {
        Self {
            dir: root.join(bundle_name(binary_type, met, binary_fraction)),
        }
    }

    /// Creates the bundle directory and truncates every appendable table.
    pub fn create(
        root: &Path,
        binary_type: BinaryType,
        met: f64,
        binary_fraction: f64,
    ) -> Result<Self, DwdError> {
        let bundle = Self::at(root, binary_type, met, binary_fraction);
        fs::create_dir_all(&bundle.dir).map_err(|err| io_error("bundle_dir", &bundle.dir, err))?;
        truncate(&bundle.result_path())?;
        let inter = bundle.dir.join(CHECKPOINT_DIR);
        if inter.exists() {
            for stage in CheckpointStage::ALL {
                let path = bundle.checkpoint_path(stage);
                if path.exists() {
                    truncate(&path)?;
                }
            }
        }
        Ok(bundle)
    }

    /// Opens an existing bundle; an absent directory is a missing dataset.
    pub fn open(
        root: &Path,
        binary_type: BinaryType,
        met: f64,
        binary_fraction: f64,
    ) -> Result<Self, DwdError> {
        let bundle = Self::at(root, binary_type, met, binary_fraction);
        if !bundle.dir.is_dir() {
            return Err(missing_dataset("bundle_missing", &bundle.dir));
        }
        Ok(bundle)
    }

    /// Bundle directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the result table.
    pub fn result_path(&self) -> PathBuf {
        self.dir.join(RESULT_FILE)
    }

    /// Path of a checkpoint table.
    pub fn checkpoint_path(&self, stage: CheckpointStage) -> PathBuf {
        self.dir
            .join(CHECKPOINT_DIR)
            .join(format!("{}.csv", stage.file_stem()))
    }

    /// Appends band survivors to the result table.
    pub fn append_rows(&self, rows: &[LbandRow]) -> Result<usize, DwdError> {
        append_csv(&self.result_path(), rows)
    }

    /// Appends every recorded checkpoint.
    pub fn append_checkpoints(&self, checkpoints: &Checkpoints) -> Result<(), DwdError> {
        for (stage, ids) in checkpoints.iter() {
            append_csv(&self.checkpoint_path(stage), ids)?;
        }
        Ok(())
    }

    /// Reads a checkpoint table.
    pub fn read_checkpoint(&self, stage: CheckpointStage) -> Result<Vec<SystemId>, DwdError> {
        read_csv(&self.checkpoint_path(stage))
    }

    /// Reads the result table; an empty file holds no rows.
    pub fn read_rows(&self) -> Result<Vec<LbandRow>, DwdError> {
        let path = self.result_path();
        match fs::metadata(&path) {
            Ok(meta) if meta.len() == 0 => Ok(Vec::new()),
            _ => read_csv(&path),
        }
    }

    /// Records the mass normalisation.
    pub fn write_mass_total(&self, mass_total: f64) -> Result<(), DwdError> {
        write_json(&self.dir.join(MASS_TOTAL_FILE), &MassTotal { mass_total })
    }

    /// Reads the mass normalisation.
    pub fn read_mass_total(&self) -> Result<f64, DwdError> {
        read_json::<MassTotal>(&self.dir.join(MASS_TOTAL_FILE)).map(|value| value.mass_total)
    }

    /// Records the bin seed.
    pub fn write_seed(&self, seed: u64) -> Result<(), DwdError> {
        write_json(&self.dir.join(SEED_FILE), &RandSeed { rand_seed: seed })
    }

    /// Reads the bin seed.
    pub fn read_seed(&self) -> Result<u64, DwdError> {
        read_json::<RandSeed>(&self.dir.join(SEED_FILE)).map(|value| value.rand_seed)
    }

    /// Records the bin report.
    pub fn write_report(&self, report: &BinReport) -> Result<(), DwdError> {
        write_json(&self.dir.join(REPORT_FILE), report)
    }

    /// Reads the bin report.
    pub fn read_report(&self) -> Result<BinReport, DwdError> {
        read_json(&self.dir.join(REPORT_FILE))
    }
}
