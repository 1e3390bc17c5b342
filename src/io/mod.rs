//! # IO Module - Pipeline Persistence
//!
//! Disk layout and serialization for the two-stage pipeline: generated
//! scenarios land under `<base>/scenario/`, replay reports under
//! `<base>/run/`. Scenarios travel as pretty JSON so they can be edited by
//! hand between stages; reports are saved both as JSON (for reading) and
//! optionally as bincode (for bulk post-processing).
//!
//! File naming is `{tag}-{id}` with the format extension, so a batch keeps
//! sorted, predictable names.


use crate::scenario::{Scenario, ScenarioReport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Which pipeline stage a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Scenario,
    Run,
}

impl DataKind {
    pub fn folder(&self) -> &'static str {
        match self {
            DataKind::Scenario => "scenario",
            DataKind::Run => "run",
        }
    }
}

/// A record that knows where it lives and what to call itself.
pub trait DataPersistence: Serialize + DeserializeOwned {
    fn data_kind() -> DataKind;
    fn file_stem(&self) -> String;
}

impl DataPersistence for Scenario {
    fn data_kind() -> DataKind {
        DataKind::Scenario
    }

    fn file_stem(&self) -> String {
        format!("{}-{}", self.tag, self.id)
    }
}

impl DataPersistence for ScenarioReport {
    fn data_kind() -> DataKind {
        DataKind::Run
    }

    fn file_stem(&self) -> String {
        format!("{}-{}", self.tag, self.scenario_id)
    }
}

/// Creates the stage directories under `base`.
pub fn ensure_data_directories(base: &Path) -> std::io::Result<()> {
    fs::create_dir_all(base.join(DataKind::Scenario.folder()))?;
    fs::create_dir_all(base.join(DataKind::Run.folder()))?;
    Ok(())
}

fn record_path<T: DataPersistence>(base: &Path, data: &T, ext: &str) -> PathBuf {
    base.join(T::data_kind().folder())
        .join(format!("{}.{}", data.file_stem(), ext))
}

/// Saves a record as pretty JSON; returns the path written.
pub fn save_json<T: DataPersistence>(base: &Path, data: &T) -> Result<PathBuf, Box<dyn Error>> {
    let path = record_path(base, data, "json");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_vec_pretty(data)?)?;
    Ok(path)
}

pub fn load_json<T: DataPersistence>(path: &Path) -> Result<T, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Saves a record in the compact binary format.
pub fn save_bin<T: DataPersistence>(base: &Path, data: &T) -> Result<PathBuf, Box<dyn Error>> {
    let path = record_path(base, data, "bin");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bincode::serialize(data)?)?;
    Ok(path)
}

pub fn load_bin<T: DataPersistence>(path: &Path) -> Result<T, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Lists saved records of `T` with the given extension, sorted by name.
pub fn list_files<T: DataPersistence>(base: &Path, ext: &str) -> std::io::Result<Vec<PathBuf>> {
    let dir = base.join(T::data_kind().folder());
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some(ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
