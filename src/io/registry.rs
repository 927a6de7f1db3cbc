//! Durable experiment registry (`.em.json`).
//!
//! One JSON object mapping experiment name to its lifecycle record. Every
//! operation is an independent open-modify-close cycle against the file, and
//! writes replace it atomically (temp file + rename), so concurrent readers
//! may observe a stale-but-consistent snapshot but never a torn record.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::record::ExperimentRecord;

/// Handle to the registry file. Holds no open state between operations.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create an empty registry file if missing.
    pub fn ensure(&self) -> Result<()> {
        if self.exists() {
            return Ok(());
        }
        self.store(&BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.load()?.remove(name))
    }

    pub fn upsert(&self, name: &str, record: ExperimentRecord) -> Result<()> {
        let mut map = self.load()?;
        map.insert(name.to_string(), record);
        self.store(&map)
    }

    /// Apply `mutate` to an existing record within one open-modify-close
    /// cycle. Returns false (and writes nothing) when the name is absent.
    pub fn update(&self, name: &str, mutate: impl FnOnce(&mut ExperimentRecord)) -> Result<bool> {
        let mut map = self.load()?;
        let Some(record) = map.get_mut(name) else {
            return Ok(false);
        };
        mutate(record);
        self.store(&map)?;
        Ok(true)
    }

    /// Remove an entry. Deleting a nonexistent name is a no-op.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(name).is_none() {
            return Ok(());
        }
        self.store(&map)
    }

    /// Move an entry to a new key within one cycle, record unchanged.
    pub fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        let mut map = self.load()?;
        let record = map
            .remove(name)
            .ok_or_else(|| anyhow!("no registry entry for \"{name}\""))?;
        map.insert(new_name.to_string(), record);
        self.store(&map)
    }

    /// All experiment names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Names whose record's serialized `field` equals `value` exactly.
    pub fn list_filter(&self, field: &str, value: &str) -> Result<Vec<String>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|(_, record)| record.field_matches(field, value))
            .map(|(name, _)| name)
            .collect())
    }

    fn load(&self) -> Result<BTreeMap<String, ExperimentRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read registry {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse registry {}", self.path.display()))
    }

    fn store(&self, map: &BTreeMap<String, ExperimentRecord>) -> Result<()> {
        debug!(path = %self.path.display(), entries = map.len(), "writing registry");
        let mut buf = serde_json::to_string_pretty(map)?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("registry path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp registry {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace registry {}", path.display()))?;
    Ok(())
}
