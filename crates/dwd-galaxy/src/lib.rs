#![deny(missing_docs)]
#![doc = "Sampling, filtering and chunked assembly of the synthetic DWD galaxy catalog."]

/// Canonical JSON, YAML, CSV and hashing helpers.
pub mod codec;
/// Per-bin assembly on a fixed worker pool.
pub mod dispatch;
/// Filter pipeline stages.
pub mod filter;
/// Galaxy plan loading.
pub mod plan;
/// Occupation sampling and chunk descriptors.
pub mod sampler;
/// Population tables and star-particle catalog.
pub mod source;
/// Result bundles.
pub mod store;

pub use dispatch::{
    bin_seed, process_chunk, run_galaxy, run_galaxy_from_path, BinReport, ChunkFailure,
    ConsistencyCheck, GalaxyReport, GalaxyRunner, GALAXY_REPORT_FILE,
};
pub use filter::{
    filter_population, select_band, CheckpointStage, Checkpoints, FilterConfig, FilterOutcome,
    FilterReport, StageCounts,
};
pub use plan::{load_plan, GalaxyPlan, PathsSpec};
pub use sampler::{
    materialize_chunk, n_astro, ChunkDescriptor, ChunkKind, Occupation, OccupationPlan,
};
pub use source::{
    hosts_in_bin, load_population, load_star_particles, CsvPopulationSource,
    MemoryPopulationSource, Population, PopulationSource, PopulationTables,
};
pub use store::{bundle_name, ResultBundle};
