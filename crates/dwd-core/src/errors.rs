//! Structured error types shared across the DWD crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`DwdError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, labels, row counts, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the DWD pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum DwdError {
    /// Filesystem errors (directories, files, appends).
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors (CSV, JSON, YAML).
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// A required key or column could not be resolved in an input table.
    #[error("lookup error: {0}")]
    Lookup(ErrorInfo),
    /// A persisted dataset is missing or unreadable.
    #[error("missing dataset: {0}")]
    MissingDataset(ErrorInfo),
    /// Sampling inputs are inconsistent (empty tables, bad normalisation).
    #[error("sampling error: {0}")]
    Sampling(ErrorInfo),
    /// A physical model was evaluated outside of its domain.
    #[error("physics error: {0}")]
    Physics(ErrorInfo),
    /// Worker pool construction or chunk execution failures.
    #[error("worker error: {0}")]
    Worker(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl DwdError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            DwdError::Io(info)
            | DwdError::Serde(info)
            | DwdError::Lookup(info)
            | DwdError::MissingDataset(info)
            | DwdError::Sampling(info)
            | DwdError::Physics(info)
            | DwdError::Worker(info) => info,
        }
    }

    /// Returns true when the error denotes an absent or unreadable dataset.
    pub fn is_missing_dataset(&self) -> bool {
        matches!(self, DwdError::MissingDataset(_))
    }
}
