#![deny(missing_docs)]
#![doc = "Core records, reference constants and error types for the DWD galaxy pipeline."]

pub mod constants;
pub mod errors;
pub mod grid;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{DwdError, ErrorInfo};
pub use grid::{format_grid_value, BinaryFractionModel, MetallicityBin, MetallicityGrid};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_labelled_seed, derive_substream_seed, RngHandle};
pub use types::{
    BinaryRecord, BinaryType, Evolution, EvolutionEvent, HostParticle, LbandRow, Placement,
    SampledSystem, SystemId,
};
