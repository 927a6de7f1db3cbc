//! Orchestration for `em rename`.
//!
//! Three ordered steps: move the worktree directory, rename the branch,
//! rewrite the registry key. A branch-rename failure rolls the directory
//! move back before reporting; the registry is only touched once both
//! filesystem and branch agree on the new name.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use crate::io::git::Git;
use crate::io::layout::{ProjectLayout, validate_name};

pub fn rename_experiment(root: &Path, name: &str, new_name: &str) -> Result<()> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    validate_name(new_name)?;
    let registry = layout.registry();
    let git = Git::new(&layout.root);

    let record = registry
        .get(name)?
        .ok_or_else(|| anyhow!("no experiment named \"{name}\""))?;
    if record.is_running() {
        bail!("cannot rename running experiment");
    }
    if registry.get(new_name)?.is_some() {
        bail!("experiment named \"{new_name}\" already exists");
    }
    if !git.branch_exists(name)? {
        bail!("no branch for experiment \"{name}\"");
    }
    if git.branch_exists(new_name)? {
        bail!("branch \"{new_name}\" already exists");
    }

    let dir = layout.experiment_dir(name);
    let new_dir = layout.experiment_dir(new_name);
    fs::rename(&dir, &new_dir).context("could not move experiment directory")?;

    if let Err(err) = git.rename_branch(name, new_name) {
        // Roll back the directory move before reporting.
        let _ = fs::rename(&new_dir, &dir);
        return Err(err.context("could not rename branch"));
    }

    registry.rename(name, new_name)?;
    info!(name, new_name, "experiment renamed");
    Ok(())
}
