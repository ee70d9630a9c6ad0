use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc;

use chrono::Utc;
use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::provenance::{RunProvenance, SchemaVersion};
use dwd_core::{
    derive_labelled_seed, derive_substream_seed, BinaryFractionModel, BinaryRecord, BinaryType,
    HostParticle, LbandRow, MetallicityBin, MetallicityGrid, RngHandle, SampledSystem,
};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec::write_json;
use crate::filter::{filter_population, FilterConfig, FilterOutcome, FilterReport, StageCounts};
use crate::plan::{load_plan, GalaxyPlan};
use crate::sampler::{
    mass_total, materialize_chunk, n_astro, ChunkDescriptor, Occupation, OccupationPlan,
};
use crate::source::{
    hosts_in_bin, load_population, load_star_particles, CsvPopulationSource, PopulationSource,
};
use crate::store::{bundle_name, ResultBundle};

/// Substream of a chunk seed used for placement offsets.
const PLACEMENT_STREAM: u64 = 1;

/// File written at the output root after a whole-galaxy run.
pub const GALAXY_REPORT_FILE: &str = "galaxy_report.json";

fn worker_error(code: &str, err: impl ToString) -> DwdError {
    DwdError::Worker(ErrorInfo::new(code, err.to_string()))
}

/// Seed of one (binary type, model, bin) unit, derived from the master seed.
pub fn bin_seed(
    master_seed: u64,
    binary_type: BinaryType,
    model: BinaryFractionModel,
    bin_index: usize,
) -> u64 {
    let label = format!("{}/{}", binary_type.label(), model.label());
    derive_labelled_seed(master_seed, &label, bin_index as u64)
}

/// Comparison of expected and sampled row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    /// Rows the occupation plan called for.
    pub expected: u64,
    /// Rows sampled by chunks that completed.
    pub sampled: u64,
    /// Whether both agree.
    pub ok: bool,
}

impl ConsistencyCheck {
    /// Compares `expected` with `sampled`.
    pub fn new(expected: u64, sampled: u64) -> Self {
        Self {
            expected,
            sampled,
            ok: expected == sampled,
        }
    }
}

/// A chunk whose rows were dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// Chunk index within the bin.
    pub index: u64,
    /// Rows the chunk covered.
    pub rows: u64,
    /// Error raised while sampling or filtering.
    pub error: DwdError,
}

/// Outcome of assembling one (binary type, model, bin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinReport {
    /// Binary type.
    pub binary_type: BinaryType,
    /// Binary-fraction model.
    pub model: BinaryFractionModel,
    /// Metallicity bin index.
    pub bin_index: usize,
    /// Metallicity naming the population table and bundle.
    pub met: f64,
    /// Binary fraction naming the bundle.
    pub binary_fraction: f64,
    /// Bundle directory name.
    pub bundle: String,
    /// Seed of the bin.
    pub seed: u64,
    /// Systems in the population table.
    pub population: usize,
    /// Mass normalisation in M☉.
    pub mass_total: f64,
    /// Expected occupation per host.
    pub occupation: Occupation,
    /// Hosts in the bin.
    pub hosts: usize,
    /// Chunks dispatched.
    pub chunks: usize,
    /// Chunks with no band survivor.
    pub empty_chunks: usize,
    /// Summed per-stage counts of completed chunks.
    pub counts: StageCounts,
    /// Rows appended to the result table.
    pub rows_written: u64,
    /// Chunks whose rows were dropped.
    pub failed_chunks: Vec<ChunkFailure>,
    /// Integer sub-population check, `k × P` against sampled rows.
    pub consistency: ConsistencyCheck,
    /// Decimal sub-population check, Bernoulli winners against sampled rows.
    pub decimal_consistency: ConsistencyCheck,
}

/// Outcome of a whole-galaxy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalaxyReport {
    /// Provenance of the run.
    pub provenance: RunProvenance,
    /// One entry per (binary type, model, bin), in processing order.
    pub bins: Vec<BinReport>,
}

impl GalaxyReport {
    /// Bins whose row counts did not reconcile.
    pub fn inconsistent_bins(&self) -> impl Iterator<Item = &BinReport> {
        self.bins
            .iter()
            .filter(|bin| !bin.consistency.ok || !bin.decimal_consistency.ok)
    }

    /// Total rows written across bundles.
    pub fn rows_written(&self) -> u64 {
        self.bins.iter().map(|bin| bin.rows_written).sum()
    }
}

struct ChunkOutput {
    index: u64,
    rows: u64,
    integer: bool,
    result: Result<FilterReport, DwdError>,
}

/// Samples and filters one chunk; runs on a pool worker.
pub fn process_chunk(
    chunk: &ChunkDescriptor,
    occupation: &Occupation,
    population: &[BinaryRecord],
    hosts: &[HostParticle],
    config: &FilterConfig,
) -> Result<FilterReport, DwdError> {
    let systems = materialize_chunk(chunk, occupation, population, hosts)?;
    let mut rng = RngHandle::from_seed(derive_substream_seed(chunk.seed, PLACEMENT_STREAM));
    filter_population(systems, &mut rng, config)
}

fn to_rows(survivors: &[SampledSystem]) -> Result<Vec<LbandRow>, DwdError> {
    survivors
        .iter()
        .map(|system| {
            system.to_row().ok_or_else(|| {
                DwdError::Worker(
                    ErrorInfo::new("incomplete-row", "band survivor lacks derived fields")
                        .with_context("bin_num", system.binary.bin_num.to_string()),
                )
            })
        })
        .collect()
}

#[derive(Default)]
struct BinTally {
    counts: StageCounts,
    rows_written: u64,
    empty_chunks: usize,
    integer_sampled: u64,
    decimal_sampled: u64,
    failed_chunks: Vec<ChunkFailure>,
}

impl BinTally {
    /// Folds one chunk into the bundle. Only I/O failures are returned.
    fn absorb(&mut self, output: ChunkOutput, bundle: &ResultBundle) -> Result<(), DwdError> {
        let ChunkOutput {
            index,
            rows,
            integer,
            result,
        } = output;
        let prepared = result.and_then(|report| {
            let lband = match &report.outcome {
                FilterOutcome::Survivors(survivors) => to_rows(survivors)?,
                FilterOutcome::Empty => Vec::new(),
            };
            Ok((report, lband))
        });
        let (report, lband) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => {
                warn!(chunk = index, rows, %error, "chunk dropped");
                self.failed_chunks.push(ChunkFailure { index, rows, error });
                return Ok(());
            }
        };

        if integer {
            self.integer_sampled += report.counts.sampled;
        } else {
            self.decimal_sampled += report.counts.sampled;
        }
        self.counts.absorb(&report.counts);
        if let Some(checkpoints) = &report.checkpoints {
            bundle.append_checkpoints(checkpoints)?;
        }
        if report.outcome.is_empty() {
            info!(chunk = index, sampled = report.counts.sampled, "no band survivors");
            self.empty_chunks += 1;
            return Ok(());
        }
        self.rows_written += bundle.append_rows(&lband)? as u64;
        debug!(
            chunk = index,
            sampled = report.counts.sampled,
            in_band = report.counts.in_band,
            "chunk appended"
        );
        Ok(())
    }
}

/// Assembles bins of one galaxy on a fixed worker pool.
pub struct GalaxyRunner<'a> {
    plan: &'a GalaxyPlan,
    source: &'a dyn PopulationSource,
    hosts: Vec<HostParticle>,
    pool: ThreadPool,
    grid: &'static MetallicityGrid,
}

impl<'a> GalaxyRunner<'a> {
    /// Builds the worker pool; `hosts` are re-sorted by metallicity.
    pub fn new(
        plan: &'a GalaxyPlan,
        source: &'a dyn PopulationSource,
        mut hosts: Vec<HostParticle>,
    ) -> Result<Self, DwdError> {
        plan.validate()?;
        hosts.sort_by(|a, b| a.met.total_cmp(&b.met));
        let pool = ThreadPoolBuilder::new()
            .num_threads(plan.workers.max(1))
            .thread_name(|index| format!("dwd-worker-{index}"))
            .build()
            .map_err(|err| worker_error("thread_pool", err))?;
        Ok(Self {
            plan,
            source,
            hosts,
            pool,
            grid: MetallicityGrid::reference(),
        })
    }

    /// Star particles known to the runner, sorted by metallicity.
    pub fn hosts(&self) -> &[HostParticle] {
        &self.hosts
    }

    /// Assembles one (binary type, bin, model) into its result bundle.
    pub fn run_bin(
        &self,
        binary_type: BinaryType,
        bin: &MetallicityBin,
        model: BinaryFractionModel,
    ) -> Result<BinReport, DwdError> {
        let seed = bin_seed(self.plan.seed, binary_type, model, bin.index);
        let met = bin.label_met();
        let binary_fraction = self.grid.binary_fraction(bin, model);
        let ratio = self.grid.mass_ratio(bin, model);

        let population = load_population(self.source, binary_type, met)?;
        let mass_total = mass_total(population.mass_binaries, ratio);
        let occupation = n_astro(
            population.binaries.len(),
            mass_total,
            self.plan.star_particle_mass,
        )?;
        let hosts = hosts_in_bin(&self.hosts, bin);
        let occupation_plan =
            OccupationPlan::new(occupation, hosts.len(), seed, self.plan.chunk_rows);

        let output_root = self.plan.output_root();
        let bundle = ResultBundle::create(&output_root, binary_type, met, binary_fraction)?;
        bundle.write_seed(seed)?;
        bundle.write_mass_total(mass_total)?;

        info!(
            label = binary_type.label(),
            model = model.label(),
            bin = bin.index,
            hosts = hosts.len(),
            n_astro = occupation.n_astro,
            chunks = occupation_plan.chunks.len(),
            "assembling bin"
        );

        let config = self.plan.filter_config();
        let tally = self.dispatch(
            &occupation_plan,
            &population.binaries,
            hosts,
            &config,
            &bundle,
        )?;

        let consistency = ConsistencyCheck::new(
            occupation_plan.expected_integer_rows(),
            tally.integer_sampled,
        );
        let decimal_consistency = ConsistencyCheck::new(
            occupation_plan.decimal_hosts.len() as u64,
            tally.decimal_sampled,
        );
        if !consistency.ok || !decimal_consistency.ok {
            warn!(
                label = binary_type.label(),
                model = model.label(),
                bin = bin.index,
                expected = consistency.expected,
                sampled = consistency.sampled,
                decimal_expected = decimal_consistency.expected,
                decimal_sampled = decimal_consistency.sampled,
                "sampled rows do not match the occupation plan"
            );
        }
        if tally.rows_written == 0 {
            info!(
                label = binary_type.label(),
                model = model.label(),
                bin = bin.index,
                "bin has no band survivors"
            );
        }

        let report = BinReport {
            binary_type,
            model,
            bin_index: bin.index,
            met,
            binary_fraction,
            bundle: bundle_name(binary_type, met, binary_fraction),
            seed,
            population: population.binaries.len(),
            mass_total,
            occupation,
            hosts: hosts.len(),
            chunks: occupation_plan.chunks.len(),
            empty_chunks: tally.empty_chunks,
            counts: tally.counts,
            rows_written: tally.rows_written,
            failed_chunks: tally.failed_chunks,
            consistency,
            decimal_consistency,
        };
        bundle.write_report(&report)?;
        Ok(report)
    }

    /// Fans the chunks out over the pool; this thread is the only writer.
    fn dispatch(
        &self,
        occupation_plan: &OccupationPlan,
        population: &[BinaryRecord],
        hosts: &[HostParticle],
        config: &FilterConfig,
        bundle: &ResultBundle,
    ) -> Result<BinTally, DwdError> {
        let occupation = occupation_plan.occupation;
        let (tx, rx) = mpsc::channel::<ChunkOutput>();
        let mut tally = BinTally::default();
        let mut write_error = None;

        self.pool.in_place_scope(|scope| {
            for chunk in &occupation_plan.chunks {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = process_chunk(chunk, &occupation, population, hosts, config);
                    let _ = tx.send(ChunkOutput {
                        index: chunk.index,
                        rows: chunk.rows(),
                        integer: chunk.is_integer(),
                        result,
                    });
                });
            }
            drop(tx);
            for output in rx {
                if write_error.is_some() {
                    continue;
                }
                if let Err(err) = tally.absorb(output, bundle) {
                    write_error = Some(err);
                }
            }
        });

        match write_error {
            Some(err) => Err(err),
            None => Ok(tally),
        }
    }

    /// Assembles every (binary type, model, bin) of the plan.
    pub fn run(&self) -> Result<GalaxyReport, DwdError> {
        let mut bins = Vec::new();
        for &binary_type in &self.plan.binary_types {
            for &model in &self.plan.models {
                for index in self.plan.bin_indices() {
                    let bin = self.grid.bin(index)?;
                    bins.push(self.run_bin(binary_type, &bin, model)?);
                }
            }
        }
        let report = GalaxyReport {
            provenance: provenance(self.plan)?,
            bins,
        };
        write_json(&self.plan.output_root().join(GALAXY_REPORT_FILE), &report)?;
        info!(
            bins = report.bins.len(),
            rows = report.rows_written(),
            inconsistent = report.inconsistent_bins().count(),
            "galaxy assembled"
        );
        Ok(report)
    }
}

fn provenance(plan: &GalaxyPlan) -> Result<RunProvenance, DwdError> {
    let mut versions = BTreeMap::new();
    versions.insert(
        "dwd-galaxy".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    Ok(RunProvenance {
        schema_version: SchemaVersion::default(),
        plan_hash: plan.plan_hash()?,
        seed: plan.seed,
        created_at: Utc::now().to_rfc3339(),
        tool_versions: versions,
    })
}

/// Loads the star-particle catalog and assembles every bin of the plan.
pub fn run_galaxy(
    plan: &GalaxyPlan,
    source: &dyn PopulationSource,
) -> Result<GalaxyReport, DwdError> {
    let hosts = load_star_particles(&plan.galaxy_catalog())?;
    GalaxyRunner::new(plan, source, hosts)?.run()
}

/// Loads a plan and runs it against CSV population tables.
pub fn run_galaxy_from_path(plan_path: &Path) -> Result<GalaxyReport, DwdError> {
    let plan = load_plan(plan_path)?;
    let source = CsvPopulationSource::new(plan.population_root());
    run_galaxy(&plan, &source)
}
