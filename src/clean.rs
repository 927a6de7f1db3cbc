//! Orchestration for `em clean`: idempotent experiment teardown.

use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::io::git::Git;
use crate::io::layout::ProjectLayout;
use crate::io::registry::Registry;

/// Remove every trace of an experiment.
///
/// Running experiments are refused unless `force`. Idempotent: cleaning an
/// already-cleaned or never-created name succeeds as a no-op.
pub fn clean_experiment(root: &std::path::Path, name: &str, force: bool) -> Result<()> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    let registry = layout.registry();
    let git = Git::new(&layout.root);

    if let Some(record) = registry.get(name)?
        && record.is_running()
        && !force
    {
        bail!("experiment \"{name}\" is running (use --force to remove it)");
    }

    cleanup(&layout, &git, &registry, name)?;
    info!(name, "experiment cleaned");
    Ok(())
}

/// Worktree dir + registration + branch + registry entry, each step tolerant
/// of the piece already being absent.
pub(crate) fn cleanup(
    layout: &ProjectLayout,
    git: &Git,
    registry: &Registry,
    name: &str,
) -> Result<()> {
    teardown_worktree(layout, git, registry, name)?;
    if git.branch_exists(name).unwrap_or(false)
        && let Err(err) = git.delete_branch(name)
    {
        warn!(name, err = %err, "could not delete branch");
    }
    Ok(())
}

/// Remove the worktree directory, prune its registration, and drop the
/// registry entry, but keep the branch. Used on recreate, where the new
/// run may reuse the branch's commit.
pub(crate) fn teardown_worktree(
    layout: &ProjectLayout,
    git: &Git,
    registry: &Registry,
    name: &str,
) -> Result<()> {
    let dir = layout.experiment_dir(name);
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("could not clean up {}", dir.display()))?;
    }
    if let Err(err) = git.worktree_prune() {
        debug!(err = %err, "worktree prune failed");
    }
    registry.delete(name)?;
    Ok(())
}
