//! Git adapter for experiment sandboxing.
//!
//! em orchestrates branches, isolated worktrees, stashes, and snapshot
//! commits but never touches object storage itself, so we keep a small,
//! explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolve a revision spec to a full object id.
    pub fn rev_parse(&self, spec: &str) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--verify", spec])?;
        Ok(out.trim().to_string())
    }

    /// Current HEAD commit id.
    pub fn head_commit(&self) -> Result<String> {
        self.rev_parse("HEAD")
    }

    /// Tree id of a commit.
    pub fn commit_tree_id(&self, commit: &str) -> Result<String> {
        self.rev_parse(&format!("{commit}^{{tree}}"))
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// Check whether a local branch exists.
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let status = self
            .run(&[
                "show-ref",
                "--verify",
                "--quiet",
                &format!("refs/heads/{branch}"),
            ])?
            .status;
        Ok(status.success())
    }

    /// Commit id at the tip of a local branch.
    pub fn branch_tip(&self, branch: &str) -> Result<String> {
        self.rev_parse(&format!("refs/heads/{branch}"))
    }

    pub fn delete_branch(&self, branch: &str) -> Result<()> {
        self.run_checked(&["branch", "-D", branch])?;
        Ok(())
    }

    pub fn rename_branch(&self, branch: &str, new_name: &str) -> Result<()> {
        self.run_checked(&["branch", "-m", branch, new_name])?;
        Ok(())
    }

    /// True if any worktree (the main one included) has `branch` checked out.
    pub fn is_branch_checked_out(&self, branch: &str) -> Result<bool> {
        let out = self.run_capture(&["worktree", "list", "--porcelain"])?;
        let needle = format!("branch refs/heads/{branch}");
        Ok(out.lines().any(|line| line.trim() == needle))
    }

    /// Allocate an isolated worktree at `path`, creating `branch` at the
    /// current HEAD.
    ///
    /// Allocation always originates at HEAD; callers that need the worktree
    /// rooted elsewhere must relocate HEAD first. Fails if the branch
    /// already exists.
    #[instrument(skip_all, fields(branch))]
    pub fn worktree_add(&self, branch: &str, path: &Path) -> Result<()> {
        debug!(branch, path = %path.display(), "allocating worktree");
        let path_arg = path.to_string_lossy().into_owned();
        self.run_checked(&["worktree", "add", "-b", branch, &path_arg])?;
        Ok(())
    }

    /// Drop stale administrative entries for removed worktree directories.
    pub fn worktree_prune(&self) -> Result<()> {
        self.run_checked(&["worktree", "prune"])?;
        Ok(())
    }

    /// Save all pending changes, untracked files included.
    pub fn stash_push_all(&self, message: &str) -> Result<()> {
        self.run_checked(&["stash", "push", "--include-untracked", "-m", message])?;
        Ok(())
    }

    /// Re-apply and drop the most recent stash entry.
    pub fn stash_pop(&self) -> Result<()> {
        self.run_checked(&["stash", "pop"])?;
        Ok(())
    }

    /// Hard-reset the current checkout to `commit`.
    #[instrument(skip_all, fields(commit))]
    pub fn reset_hard(&self, commit: &str) -> Result<()> {
        debug!(commit, "hard reset");
        self.run_checked(&["reset", "--hard", commit])?;
        Ok(())
    }

    /// Write a tree that is `base`'s tree plus the working-tree content of
    /// every path in `paths`, staged into a scratch index so the repository's
    /// real index is left untouched. Returns the tree id.
    #[instrument(skip_all, fields(base, path_count = paths.len()))]
    pub fn snapshot_tree(&self, base: &str, paths: &[&str]) -> Result<String> {
        let scratch = tempfile::tempdir().context("create scratch index dir")?;
        let index = scratch.path().join("index");

        self.run_index_checked(&["read-tree", base], &index)?;
        let mut args = vec!["add", "--"];
        args.extend(paths);
        self.run_index_checked(&args, &index)?;
        let tree = self.run_index_capture(&["write-tree"], &index)?;
        Ok(tree.trim().to_string())
    }

    /// Create a commit from a tree with a single parent. Moves no refs.
    pub fn commit_tree(&self, tree: &str, parent: &str, message: &str) -> Result<String> {
        let out = self.run_capture(&["commit-tree", tree, "-p", parent, "-m", message])?;
        Ok(out.trim().to_string())
    }

    /// Point a branch ref at a commit.
    pub fn update_ref(&self, branch: &str, commit: &str) -> Result<()> {
        self.run_checked(&["update-ref", &format!("refs/heads/{branch}"), commit])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        check_status(args, &output)?;
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        self.run_inner(args, None)
    }

    fn run_index_capture(&self, args: &[&str], index: &Path) -> Result<String> {
        let output = self.run_index_checked(args, index)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_index_checked(&self, args: &[&str], index: &Path) -> Result<Output> {
        let output = self.run_inner(args, Some(index))?;
        check_status(args, &output)?;
        Ok(output)
    }

    fn run_inner(&self, args: &[&str], index: Option<&Path>) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir);
        if let Some(index) = index {
            cmd.env("GIT_INDEX_FILE", index);
        }
        cmd.output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn check_status(args: &[&str], output: &Output) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
    }
    Ok(())
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
