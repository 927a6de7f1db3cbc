//! Sandbox allocation: per-experiment branch, isolated worktree, snapshot
//! commits.
//!
//! An experiment owns exactly one branch named after it. The branch tip is
//! either the current HEAD, a fresh snapshot commit on top of HEAD capturing
//! pending tracked-extension changes, or a previously recorded tip being
//! reused. Worktree allocation always originates at HEAD, so reusing an
//! older tip requires temporarily relocating the repository head (the
//! stash/reset/allocate/restore dance below).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::core::changes::{classify, tracked_paths};
use crate::io::config::ProjectConfig;
use crate::io::git::Git;
use crate::io::layout::ProjectLayout;

/// Allocate `experiments/<name>` bound to branch `<name>`.
///
/// With `base_commit`, the existing branch tip is reused verbatim; without
/// it, a fresh branch is created at HEAD (plus a snapshot commit when
/// tracked changes are pending). Returns the worktree directory.
#[instrument(skip_all, fields(name))]
pub fn create_sandbox(
    layout: &ProjectLayout,
    config: &ProjectConfig,
    git: &Git,
    name: &str,
    base_commit: Option<&str>,
    description: Option<&str>,
) -> Result<PathBuf> {
    let head = git.head_commit()?;
    let entries = git.status_porcelain()?;
    let tracked = config.experiment.tracked_set();
    let summary = classify(entries.iter().map(|e| e.path.as_str()), &tracked);
    let dir = layout.experiment_dir(name);

    match base_commit {
        Some(base) => {
            if summary.has_tracked_changes {
                // Reuse is only safe when the pending tracked content is
                // exactly what the branch tip already captured.
                let paths = tracked_paths(entries.iter().map(|e| e.path.as_str()), &tracked);
                let pending_tree = git.snapshot_tree(&head, &paths)?;
                if pending_tree != git.commit_tree_id(base)? {
                    bail!("not updating existing branch with source changes");
                }
            }
            reuse_branch(git, name, base, &head, summary.has_changes, &dir)?;
        }
        None => {
            git.worktree_add(name, &dir)?;
            if summary.has_tracked_changes {
                let paths = tracked_paths(entries.iter().map(|e| e.path.as_str()), &tracked);
                commit_snapshot(git, name, &head, &paths, description, &dir)?;
            }
        }
    }

    link_shared_data(layout, &dir)?;
    let run_dir = layout.run_dir(name);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create run dir {}", run_dir.display()))?;

    info!(name, dir = %dir.display(), "sandbox ready");
    Ok(dir)
}

/// Freeze pending tracked changes as a commit on the experiment branch and
/// force the worktree to match it exactly.
fn commit_snapshot(
    git: &Git,
    name: &str,
    base: &str,
    paths: &[&str],
    description: Option<&str>,
    dir: &Path,
) -> Result<()> {
    let tree = git.snapshot_tree(base, paths)?;
    let message = description.unwrap_or("setup experiment");
    let commit = git.commit_tree(&tree, base, message)?;
    git.update_ref(name, &commit)?;
    // The worktree was checked out before the ref moved; discard its state
    // in favor of the snapshot.
    Git::new(dir).reset_hard("HEAD")?;
    info!(name, commit = %commit, "snapshot commit created");
    Ok(())
}

/// Relocate HEAD to the reused tip so worktree allocation lands on it:
/// stash, reset, delete, allocate, restore, pop. The order is load-bearing;
/// recreating the branch at any other point changes which commit it ends up
/// on. If allocation fails mid-dance the repository is left at the
/// relocated commit with the stash intact (no automatic rollback); the
/// error names the original head so the operator can restore it.
fn reuse_branch(
    git: &Git,
    name: &str,
    base: &str,
    head: &str,
    has_changes: bool,
    dir: &Path,
) -> Result<()> {
    if base == head {
        // Tip already at HEAD; only the branch ref needs recreating.
        git.delete_branch(name)?;
        git.worktree_add(name, dir)?;
        return Ok(());
    }

    debug!(name, base, head, "relocating head to reuse branch tip");
    let stashed = if has_changes {
        git.stash_push_all("em: relocate head")?;
        true
    } else {
        false
    };
    git.reset_hard(base)?;
    git.delete_branch(name)?;
    git.worktree_add(name, dir)
        .with_context(|| format!("allocate worktree (head relocated; original head {head})"))?;
    git.reset_hard(head)?;
    if stashed {
        git.stash_pop()?;
    }
    Ok(())
}

/// Symlink the project's shared data directory into the worktree.
fn link_shared_data(layout: &ProjectLayout, dir: &Path) -> Result<()> {
    // An empty data/ is untracked, so the relocation stash can have swept
    // it away. Recreate it before resolving.
    fs::create_dir_all(&layout.data_dir)
        .with_context(|| format!("create data dir {}", layout.data_dir.display()))?;
    let target = fs::canonicalize(&layout.data_dir)
        .with_context(|| format!("resolve data dir {}", layout.data_dir.display()))?;
    let link = dir.join("data");

    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, &link)
        .with_context(|| format!("link {} -> {}", link.display(), target.display()))?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_dir(&target, &link)
        .with_context(|| format!("link {} -> {}", link.display(), target.display()))?;

    Ok(())
}
