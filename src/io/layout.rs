//! Canonical on-disk layout for an em project.
//!
//! A project root holds the registry file (`.em.json`, which doubles as the
//! project marker), the optional `em.toml` config, the shared `data/`
//! directory, and one worktree per experiment under `experiments/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::config::{ProjectConfig, write_config};
use super::registry::Registry;

/// Resolved paths for a project root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub registry_path: PathBuf,
    pub config_path: PathBuf,
    pub experiments_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            registry_path: root.join(".em.json"),
            config_path: root.join("em.toml"),
            experiments_dir: root.join("experiments"),
            data_dir: root.join("data"),
            root,
        }
    }

    /// Fail unless `root` is an em project (the registry file exists).
    pub fn ensure_project(&self) -> Result<()> {
        if self.registry_path.exists() {
            return Ok(());
        }
        let shown = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        Err(anyhow!("\"{}\" is not a project directory", shown.display()))
    }

    pub fn registry(&self) -> Registry {
        Registry::new(&self.registry_path)
    }

    /// Worktree root for one experiment.
    pub fn experiment_dir(&self, name: &str) -> PathBuf {
        self.experiments_dir.join(name)
    }

    /// Run-artifacts directory inside an experiment's worktree.
    pub fn run_dir(&self, name: &str) -> PathBuf {
        self.experiment_dir(name).join("run")
    }

    /// Control file the running job polls for commands.
    pub fn ctl_path(&self, name: &str) -> PathBuf {
        self.run_dir(name).join("ctl")
    }

    /// Serialized run options, written by the job program.
    pub fn opts_path(&self, name: &str) -> PathBuf {
        self.run_dir(name).join("opts.json")
    }
}

/// Validate that a name is safe for use as a branch and directory name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("experiment name must not be empty"));
    }
    if name
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
    {
        return Err(anyhow!(
            "experiment name must be [A-Za-z0-9._-] only (got \"{name}\")"
        ));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err(anyhow!("experiment name must not start with '.' or '-'"));
    }
    Ok(())
}

/// Create the minimal project scaffolding in `root`.
///
/// Idempotent: existing directories, config, and registry are left alone.
pub fn init_project(root: &Path) -> Result<ProjectLayout> {
    let layout = ProjectLayout::new(root);
    debug!(root = %layout.root.display(), "initializing project");

    for dir in [&layout.experiments_dir, &layout.data_dir] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    if !layout.config_path.exists() {
        write_config(&layout.config_path, &ProjectConfig::default())?;
    }
    layout.registry().ensure()?;
    Ok(layout)
}
