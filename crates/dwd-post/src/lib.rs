#![deny(missing_docs)]
#![doc = "Aggregates computed from DWD galaxy result bundles and population tables."]

/// Band-survivor counts per host metallicity.
pub mod counts;
/// Formation efficiency per unit stellar mass.
pub mod formeff;
/// First interaction episodes of band survivors.
pub mod intersep;
/// Dataset gaps and aggregate summaries.
pub mod report;
/// Foreground fit and resolved-source selection.
pub mod resolved;
/// Histograms, medians and polynomial fits.
pub mod stat;
/// Reading survivors back from result bundles.
pub mod survivors;

pub use counts::{metallicity_edges, source_counts, write_source_counts, SourceCounts};
pub use formeff::{
    formation_efficiency, write_formation_efficiency, EfficiencyRow, FormationEfficiency,
    MassSource,
};
pub use intersep::{interaction_separations, join_interactions, InteractionRow, InteractionSummary};
pub use report::{AggregateReport, DatasetGap};
pub use resolved::{
    fit_confusion, resolve_model, resolve_sources, write_resolved, ConfusionFit,
    ObservationConfig, PowerSpectrum, ResolvedSource, ResolvedSources, StrainModel, StrainSource,
};
pub use survivors::{collect_survivors, SurvivorSet};
