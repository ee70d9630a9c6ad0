//! Population tables and the star-particle catalog.
//!
//! Population-synthesis output is reached through [`PopulationSource`] so the
//! sampler never depends on a storage format. [`CsvPopulationSource`] reads
//! one directory per binary type and metallicity:
//!
//! ```text
//! {root}/{label}/{met}/conv.csv
//! {root}/{label}/{met}/mass_stars.csv      (or mass_binaries.csv)
//! {root}/{label}/{met}/bpp.csv
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use csv::ReaderBuilder;
use dwd_core::constants::Z_SUN;
use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::{
    format_grid_value, BinaryRecord, BinaryType, EvolutionEvent, HostParticle, MetallicityBin,
};
use dwd_orbit::apply_wd_radii;
use tracing::warn;

use crate::codec::{missing_dataset, read_csv};

/// Read-only access to population-synthesis output.
pub trait PopulationSource: Send + Sync {
    /// Evolved binaries that became DWDs of `binary_type` at metallicity `met`.
    fn conv(&self, binary_type: BinaryType, met: f64) -> Result<Vec<BinaryRecord>, DwdError>;

    /// Total mass in binaries simulated to produce the table, in M☉.
    fn mass_binaries(&self, binary_type: BinaryType, met: f64) -> Result<f64, DwdError>;

    /// Evolution history rows for every binary of the table.
    fn evolution_history(
        &self,
        binary_type: BinaryType,
        met: f64,
    ) -> Result<Vec<EvolutionEvent>, DwdError>;
}

/// CSV-backed population source.
#[derive(Debug, Clone)]
pub struct CsvPopulationSource {
    root: PathBuf,
}

impl CsvPopulationSource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the tables of one binary type and metallicity.
    pub fn table_dir(&self, binary_type: BinaryType, met: f64) -> PathBuf {
        self.root
            .join(binary_type.label())
            .join(format_grid_value(met))
    }
}

impl PopulationSource for CsvPopulationSource {
    fn conv(&self, binary_type: BinaryType, met: f64) -> Result<Vec<BinaryRecord>, DwdError> {
        read_csv(&self.table_dir(binary_type, met).join("conv.csv"))
    }

    fn mass_binaries(&self, binary_type: BinaryType, met: f64) -> Result<f64, DwdError> {
        let dir = self.table_dir(binary_type, met);
        let stars = dir.join("mass_stars.csv");
        if stars.exists() {
            return last_mass(&stars);
        }
        let binaries = dir.join("mass_binaries.csv");
        if binaries.exists() {
            warn!(
                label = binary_type.label(),
                met = %format_grid_value(met),
                "mass_stars absent, using mass_binaries"
            );
            return last_mass(&binaries);
        }
        Err(DwdError::Lookup(
            ErrorInfo::new("mass-normalisation", "no mass normalisation table")
                .with_context("dir", dir.display().to_string())
                .with_hint("expected mass_stars.csv or mass_binaries.csv"),
        ))
    }

    fn evolution_history(
        &self,
        binary_type: BinaryType,
        met: f64,
    ) -> Result<Vec<EvolutionEvent>, DwdError> {
        read_csv(&self.table_dir(binary_type, met).join("bpp.csv"))
    }
}

/// Cumulative tables: the last row's first column holds the total.
fn last_mass(path: &Path) -> Result<f64, DwdError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| {
            DwdError::Serde(
                ErrorInfo::new("mass-open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
    let mut last = None;
    for record in reader.records() {
        let record = record.map_err(|err| {
            DwdError::Serde(
                ErrorInfo::new("mass-row", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        last = record.get(0).map(str::to_owned);
    }
    let field = last.ok_or_else(|| {
        DwdError::Lookup(
            ErrorInfo::new("mass-empty", "mass normalisation table has no rows")
                .with_context("path", path.display().to_string()),
        )
    })?;
    field.trim().parse::<f64>().map_err(|err| {
        DwdError::Serde(
            ErrorInfo::new("mass-parse", err.to_string())
                .with_context("path", path.display().to_string())
                .with_context("value", field.clone()),
        )
    })
}

/// Table contents for one (binary type, metallicity) key.
#[derive(Debug, Clone, Default)]
pub struct PopulationTables {
    /// Evolved binaries.
    pub conv: Vec<BinaryRecord>,
    /// Total mass in binaries, if known.
    pub mass_binaries: Option<f64>,
    /// Evolution history rows.
    pub bpp: Vec<EvolutionEvent>,
}

fn poisoned() -> DwdError {
    DwdError::Worker(ErrorInfo::new("population-lock", "population lock poisoned"))
}

/// In-memory population source keyed by binary type and metallicity label.
#[derive(Debug, Default)]
pub struct MemoryPopulationSource {
    tables: RwLock<BTreeMap<(BinaryType, String), PopulationTables>>,
}

impl MemoryPopulationSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the tables for one key, replacing any previous entry.
    pub fn insert(
        &self,
        binary_type: BinaryType,
        met: f64,
        tables: PopulationTables,
    ) -> Result<(), DwdError> {
        let mut guard = self.tables.write().map_err(|_| poisoned())?;
        guard.insert((binary_type, format_grid_value(met)), tables);
        Ok(())
    }

    fn with_tables<T>(
        &self,
        binary_type: BinaryType,
        met: f64,
        read: impl FnOnce(&PopulationTables) -> Result<T, DwdError>,
    ) -> Result<T, DwdError> {
        let label = format_grid_value(met);
        let guard = self.tables.read().map_err(|_| poisoned())?;
        match guard.get(&(binary_type, label.clone())) {
            Some(tables) => read(tables),
            None => Err(missing_dataset(
                "population-missing",
                &Path::new(binary_type.label()).join(label),
            )),
        }
    }
}

impl PopulationSource for MemoryPopulationSource {
    fn conv(&self, binary_type: BinaryType, met: f64) -> Result<Vec<BinaryRecord>, DwdError> {
        self.with_tables(binary_type, met, |tables| Ok(tables.conv.clone()))
    }

    fn mass_binaries(&self, binary_type: BinaryType, met: f64) -> Result<f64, DwdError> {
        self.with_tables(binary_type, met, |tables| {
            tables.mass_binaries.ok_or_else(|| {
                DwdError::Lookup(
                    ErrorInfo::new("mass-normalisation", "no mass normalisation table")
                        .with_context("label", binary_type.label())
                        .with_context("met", format_grid_value(met)),
                )
            })
        })
    }

    fn evolution_history(
        &self,
        binary_type: BinaryType,
        met: f64,
    ) -> Result<Vec<EvolutionEvent>, DwdError> {
        self.with_tables(binary_type, met, |tables| Ok(tables.bpp.clone()))
    }
}

/// Population table of one bin ready for sampling.
#[derive(Debug, Clone)]
pub struct Population {
    /// Binaries with radii rewritten by the WD mass–radius relation.
    pub binaries: Vec<BinaryRecord>,
    /// Total mass in binaries in M☉.
    pub mass_binaries: f64,
}

/// Loads the conv table and mass normalisation, rewriting component radii.
pub fn load_population(
    source: &dyn PopulationSource,
    binary_type: BinaryType,
    met: f64,
) -> Result<Population, DwdError> {
    let mut binaries = source.conv(binary_type, met)?;
    for binary in &mut binaries {
        apply_wd_radii(binary)?;
    }
    let mass_binaries = source.mass_binaries(binary_type, met)?;
    Ok(Population {
        binaries,
        mass_binaries,
    })
}

/// Loads the star-particle catalog.
///
/// `FIRE_index` is the row of each particle as stored; particles are then
/// stable-sorted by metallicity so every bin owns a contiguous slice.
pub fn load_star_particles(path: &Path) -> Result<Vec<HostParticle>, DwdError> {
    let mut hosts: Vec<HostParticle> = read_csv(path)?;
    for (row, host) in hosts.iter_mut().enumerate() {
        host.fire_index = row as u64;
    }
    hosts.sort_by(|a, b| a.met.total_cmp(&b.met));
    Ok(hosts)
}

/// Hosts of `bin`, from a catalog sorted by metallicity.
///
/// Uses the same solar-unit edges as [`MetallicityBin::contains_host`].
pub fn hosts_in_bin<'a>(hosts: &'a [HostParticle], bin: &MetallicityBin) -> &'a [HostParticle] {
    let start = hosts.partition_point(|host| host.met < bin.met_start / Z_SUN);
    let end = if bin.last {
        hosts.len()
    } else {
        hosts.partition_point(|host| host.met < bin.met_end / Z_SUN)
    };
    &hosts[start..end.max(start)]
}
