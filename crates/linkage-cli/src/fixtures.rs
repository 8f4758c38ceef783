//! File-backed snapshots of the engine's external collections.
//!
//! The PRIMARY source, SECONDARY source, `linkage_results` store, and
//! `enhanced_associations` store are all external collaborators per the
//! engine's own design (§1, §4.5) — this binary's only addition is
//! reading and writing them as JSON files between invocations, standing
//! in for the document database that a real deployment would use.

use std::path::Path;

use linkage_core::{EnhancedAssociation, LinkageResult, Unit};

use crate::error::{CliError, CliResult};

fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> CliResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).map_err(|source| CliError::WriteFile {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_units(path: &Path) -> CliResult<Vec<Unit>> {
    read_json(path)
}

pub fn load_results(path: &Path) -> CliResult<Vec<LinkageResult>> {
    read_json(path)
}

pub fn save_results(path: &Path, results: &[LinkageResult]) -> CliResult<()> {
    write_json(path, &results)
}

pub fn load_associations(path: &Path) -> CliResult<Vec<EnhancedAssociation>> {
    read_json(path)
}

pub fn save_associations(path: &Path, associations: &[EnhancedAssociation]) -> CliResult<()> {
    write_json(path, &associations)
}
