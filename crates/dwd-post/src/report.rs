//! Gap records and the summary written next to every aggregate.

use std::path::PathBuf;

use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::{BinaryFractionModel, BinaryType, SchemaVersion};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A (binary type, model, bin) whose input could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetGap {
    /// Binary type of the missing input.
    pub binary_type: BinaryType,
    /// Binary-fraction model of the missing input.
    pub model: BinaryFractionModel,
    /// Metallicity bin index.
    pub bin_index: usize,
    /// Structured description of the failure.
    pub error: ErrorInfo,
}

impl DatasetGap {
    /// Records `err` as a gap when it denotes absent input, logging it; any other error is returned.
    pub fn capture(
        binary_type: BinaryType,
        model: BinaryFractionModel,
        bin_index: usize,
        err: DwdError,
    ) -> Result<Self, DwdError> {
        if !is_gap(&err) {
            return Err(err);
        }
        warn!(
            label = binary_type.label(),
            model = model.label(),
            bin = bin_index,
            error = %err,
            "dataset gap"
        );
        Ok(Self {
            binary_type,
            model,
            bin_index,
            error: err.info().clone(),
        })
    }
}

/// Missing files and absent mass normalisations are gaps; everything else is fatal.
pub fn is_gap(err: &DwdError) -> bool {
    matches!(err, DwdError::MissingDataset(_) | DwdError::Lookup(_))
}

/// Summary of one aggregate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Schema of this report.
    #[serde(default)]
    pub schema_version: SchemaVersion,
    /// Aggregate name (`formeff`, `counts`, `intersep`, `resolved`).
    pub aggregate: String,
    /// Model the aggregate was computed for.
    pub model: BinaryFractionModel,
    /// Files written.
    pub outputs: Vec<PathBuf>,
    /// Inputs that were skipped.
    pub gaps: Vec<DatasetGap>,
}

impl AggregateReport {
    /// Empty report for `aggregate` under `model`.
    pub fn new(aggregate: impl Into<String>, model: BinaryFractionModel) -> Self {
        Self {
            schema_version: SchemaVersion::default(),
            aggregate: aggregate.into(),
            model,
            outputs: Vec::new(),
            gaps: Vec::new(),
        }
    }

    /// Whether every input was present.
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}
