//! Encoding helpers: canonical JSON, YAML plans, CSV tables and stable hashes.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::BufWriter;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use dwd_core::errors::{DwdError, ErrorInfo};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

fn serde_error(code: &str, err: impl ToString) -> DwdError {
    DwdError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn csv_error(code: &str, path: &Path, err: impl ToString) -> DwdError {
    DwdError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

pub(crate) fn io_error(code: &str, path: &Path, err: impl ToString) -> DwdError {
    DwdError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

pub(crate) fn missing_dataset(code: &str, path: &Path) -> DwdError {
    DwdError::MissingDataset(
        ErrorInfo::new(code, "dataset not found").with_context("path", path.display().to_string()),
    )
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into JSON bytes with keys sorted at every depth.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, DwdError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer_pretty(&mut bytes, &canonicalize(value))
        .map_err(|err| serde_error("json_write", err))?;
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, DwdError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, DwdError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("yaml_serialize", err))
}

/// Deserializes a YAML payload.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, DwdError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("yaml_deserialize", err))
}

/// SHA256 hex digest of the canonical JSON form of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, DwdError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Writes `value` as canonical JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DwdError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("json_dir", parent, err))?;
    }
    let bytes = to_canonical_json_bytes(value)?;
    fs::write(path, bytes).map_err(|err| io_error("json_write", path, err))
}

/// Reads a JSON dataset; an absent file is a missing dataset.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DwdError> {
    if !path.exists() {
        return Err(missing_dataset("json_missing", path));
    }
    let bytes = fs::read(path).map_err(|err| io_error("json_read", path, err))?;
    from_json_slice(&bytes)
}

/// Reads every row of a headed CSV table; an absent file is a missing dataset.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DwdError> {
    if !path.exists() {
        return Err(missing_dataset("csv_missing", path));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| csv_error("csv_open", path, err))?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|err| csv_error("csv_row", path, err))
}

/// Appends `rows` to a CSV table, writing the header only when the file is new or empty.
pub fn append_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize, DwdError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("csv_dir", parent, err))?;
    }
    let fresh = fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|err| io_error("csv_append_open", path, err))?;
    let mut writer = WriterBuilder::new()
        .has_headers(fresh)
        .from_writer(BufWriter::new(file));
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| csv_error("csv_append_row", path, err))?;
    }
    writer
        .flush()
        .map_err(|err| io_error("csv_append_flush", path, err))?;
    Ok(rows.len())
}

/// Truncates (or creates) a table so the next append starts a fresh file.
pub fn truncate(path: &Path) -> Result<(), DwdError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("truncate_dir", parent, err))?;
    }
    File::create(path)
        .map(|_| ())
        .map_err(|err| io_error("truncate", path, err))
}
