use std::fs;
use std::path::{Path, PathBuf};

use dwd_core::constants::{BAND_FLOOR_HZ, STAR_PARTICLE_MASS};
use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::grid::NUM_BINS;
use dwd_core::{BinaryFractionModel, BinaryType};
use serde::{Deserialize, Serialize};

use crate::codec::{from_yaml_slice, io_error, stable_hash_string, to_yaml_string};
use crate::filter::FilterConfig;

fn plan_error(code: &str, message: impl Into<String>) -> DwdError {
    DwdError::Lookup(ErrorInfo::new(code, message))
}

/// Locations of the inputs and the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsSpec {
    /// Root of the population tables (`{root}/{label}/{met}/*.csv`).
    pub population_root: PathBuf,
    /// Star-particle catalog CSV.
    pub galaxy_catalog: PathBuf,
    /// Directory receiving result bundles and the galaxy report.
    pub output_root: PathBuf,
}

/// Galaxy assembly plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyPlan {
    /// Master seed; every bin seed is derived from it.
    pub seed: u64,
    /// Input and output locations, relative paths resolve against the plan file.
    pub paths: PathsSpec,
    /// Binary types to assemble.
    #[serde(default = "GalaxyPlan::default_binary_types")]
    pub binary_types: Vec<BinaryType>,
    /// Binary-fraction models to assemble.
    #[serde(default = "GalaxyPlan::default_models")]
    pub models: Vec<BinaryFractionModel>,
    /// Subset of metallicity bins; all bins when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<usize>>,
    /// Maximum number of integer-occupation rows per chunk.
    #[serde(default = "GalaxyPlan::default_chunk_rows")]
    pub chunk_rows: u64,
    /// Size of the worker pool.
    #[serde(default = "GalaxyPlan::default_workers")]
    pub workers: usize,
    /// Persist identifier checkpoints after every filter stage.
    #[serde(default)]
    pub interleaved_checkpoints: bool,
    /// Mass of one star particle in M☉.
    #[serde(default = "GalaxyPlan::default_star_particle_mass")]
    pub star_particle_mass: f64,
    /// Lower edge of the detector band in Hz (inclusive).
    #[serde(default = "GalaxyPlan::default_band_floor_hz")]
    pub band_floor_hz: f64,
    /// Directory containing the plan on disk (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl GalaxyPlan {
    fn default_binary_types() -> Vec<BinaryType> {
        BinaryType::ALL.to_vec()
    }

    fn default_models() -> Vec<BinaryFractionModel> {
        BinaryFractionModel::ALL.to_vec()
    }

    fn default_chunk_rows() -> u64 {
        5_000_000
    }

    fn default_workers() -> usize {
        rayon::current_num_threads().max(1)
    }

    fn default_star_particle_mass() -> f64 {
        STAR_PARTICLE_MASS
    }

    fn default_band_floor_hz() -> f64 {
        BAND_FLOOR_HZ
    }

    /// Plan with every default filled in, used to bootstrap a configuration file.
    pub fn template(seed: u64) -> Self {
        Self {
            seed,
            paths: PathsSpec {
                population_root: PathBuf::from("population"),
                galaxy_catalog: PathBuf::from("FIRE.csv"),
                output_root: PathBuf::from("out"),
            },
            binary_types: Self::default_binary_types(),
            models: Self::default_models(),
            bins: None,
            chunk_rows: Self::default_chunk_rows(),
            workers: 4,
            interleaved_checkpoints: false,
            star_particle_mass: Self::default_star_particle_mass(),
            band_floor_hz: Self::default_band_floor_hz(),
            base_dir: PathBuf::new(),
        }
    }

    /// Stable hash of the plan contents.
    pub fn plan_hash(&self) -> Result<String, DwdError> {
        stable_hash_string(self)
    }

    /// YAML representation of the plan.
    pub fn to_yaml_string(&self) -> Result<String, DwdError> {
        to_yaml_string(self)
    }

    /// Metallicity bins to process, ascending.
    pub fn bin_indices(&self) -> Vec<usize> {
        match &self.bins {
            Some(bins) => bins.clone(),
            None => (0..NUM_BINS).collect(),
        }
    }

    /// Filter settings derived from the plan.
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            band_floor_hz: self.band_floor_hz,
            record_checkpoints: self.interleaved_checkpoints,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Resolved population root.
    pub fn population_root(&self) -> PathBuf {
        self.resolve(&self.paths.population_root)
    }

    /// Resolved star-particle catalog path.
    pub fn galaxy_catalog(&self) -> PathBuf {
        self.resolve(&self.paths.galaxy_catalog)
    }

    /// Resolved output root.
    pub fn output_root(&self) -> PathBuf {
        self.resolve(&self.paths.output_root)
    }

    /// Rejects plans that cannot be executed.
    pub fn validate(&self) -> Result<(), DwdError> {
        if self.chunk_rows == 0 {
            return Err(plan_error("plan-chunk-rows", "chunk_rows must be positive"));
        }
        if self.workers == 0 {
            return Err(plan_error("plan-workers", "workers must be positive"));
        }
        if self.star_particle_mass.is_nan() || self.star_particle_mass <= 0.0 {
            return Err(plan_error(
                "plan-particle-mass",
                "star_particle_mass must be positive",
            ));
        }
        if let Some(bad) = self.bin_indices().into_iter().find(|&bin| bin >= NUM_BINS) {
            return Err(DwdError::Lookup(
                ErrorInfo::new("plan-bin-range", "metallicity bin out of range")
                    .with_context("bin", bad.to_string())
                    .with_context("bins", NUM_BINS.to_string()),
            ));
        }
        Ok(())
    }
}

/// Loads a plan from disk, normalising the ordering of types, models and bins.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<GalaxyPlan, DwdError> {
    let plan_path = path.as_ref();
    let bytes = fs::read(plan_path).map_err(|err| io_error("plan_read", plan_path, err))?;
    let mut plan: GalaxyPlan = from_yaml_slice(&bytes)?;
    plan.binary_types.sort_unstable();
    plan.binary_types.dedup();
    plan.models.sort_unstable();
    plan.models.dedup();
    if let Some(bins) = plan.bins.as_mut() {
        bins.sort_unstable();
        bins.dedup();
    }
    plan.base_dir = plan_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    plan.validate()?;
    Ok(plan)
}
