//! Test fixtures shared by unit and integration tests.
//!
//! Gated behind the `test-support` feature so integration tests can build
//! real git repositories without duplicating setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, ensure};
use tempfile::TempDir;

use crate::io::git::Git;
use crate::io::layout::init_project;

/// A throwaway git repository with one tracked source file and one commit.
pub struct TestRepo {
    // Held for its Drop; the directory is removed when the fixture goes away.
    _dir: TempDir,
    root: PathBuf,
}

impl TestRepo {
    /// Create a repository with `main.py` committed on branch `main`.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let root = dir
            .path()
            .canonicalize()
            .context("canonicalize temp dir")?;

        run_git(&root, &["init", "-b", "main"])?;
        run_git(&root, &["config", "user.name", "tester"])?;
        run_git(&root, &["config", "user.email", "tester@example.com"])?;

        fs::write(root.join("main.py"), "print(\"hello\")\n").context("write main.py")?;
        run_git(&root, &["add", "."])?;
        run_git(&root, &["commit", "-m", "initial"])?;

        Ok(Self { _dir: dir, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn git(&self) -> Git {
        Git::new(&self.root)
    }

    /// Lay out the project structure (`experiments/`, `data/`, registry,
    /// config) inside the repository.
    pub fn init_project(&self) -> Result<()> {
        init_project(&self.root)?;
        Ok(())
    }

    /// Write a file relative to the repository root, creating parents.
    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Stage everything and commit it.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        run_git(&self.root, &["add", "."])?;
        run_git(&self.root, &["commit", "-m", message])?;
        Ok(())
    }
}

/// Run a git command in `dir`, failing loudly with its stderr.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("run git {args:?}"))?;
    ensure!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
