//! Project configuration stored at `em.toml`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Project configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    pub experiment: ExperimentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExperimentConfig {
    /// File suffixes that make up the reproducible source set.
    pub track_extensions: Vec<String>,

    /// Program to run inside the sandbox.
    pub program: String,

    /// Default arguments; CLI extras are appended after these.
    pub program_args: Vec<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            track_extensions: vec!["py".to_string(), "sh".to_string(), "txt".to_string()],
            program: "python3".to_string(),
            program_args: vec!["main.py".to_string()],
        }
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<()> {
        let exp = &self.experiment;
        if exp.track_extensions.is_empty() {
            return Err(anyhow!("experiment.track_extensions must not be empty"));
        }
        if exp.track_extensions.iter().any(|ext| ext.trim().is_empty()) {
            return Err(anyhow!("experiment.track_extensions must not contain blanks"));
        }
        if exp.program.trim().is_empty() {
            return Err(anyhow!("experiment.program must not be blank"));
        }
        Ok(())
    }
}

impl ExperimentConfig {
    /// Tracked extensions as a set for change classification.
    pub fn tracked_set(&self) -> BTreeSet<String> {
        self.track_extensions.iter().cloned().collect()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ProjectConfig::default()`.
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        let cfg = ProjectConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ProjectConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ProjectConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("em.toml");
        let mut cfg = ProjectConfig::default();
        cfg.experiment.program = "bash".to_string();
        cfg.experiment.program_args = vec!["train.sh".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("em.toml");
        fs::write(&path, "[experiment]\nprogram = \"bash\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.experiment.program, "bash");
        assert_eq!(
            cfg.experiment.track_extensions,
            ExperimentConfig::default().track_extensions
        );
    }

    #[test]
    fn blank_program_is_rejected() {
        let mut cfg = ProjectConfig::default();
        cfg.experiment.program = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_extensions_are_rejected() {
        let mut cfg = ProjectConfig::default();
        cfg.experiment.track_extensions.clear();
        assert!(cfg.validate().is_err());
    }
}
