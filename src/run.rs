//! Orchestration for `em run` and `em resume`.
//!
//! `run` decides the branching strategy from the working-tree state, hands
//! sandbox allocation to [`crate::sandbox`], and then supervises the job.
//! `resume` skips allocation and re-runs the job in the existing sandbox.

use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::clean;
use crate::io::config::{ProjectConfig, load_config};
use crate::io::git::Git;
use crate::io::layout::{ProjectLayout, validate_name};
use crate::io::process::{RunOutcome, supervise};
use crate::sandbox::create_sandbox;

/// Supervisor-facing knobs shared by `run` and `resume`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// CSV device ids, exported to the job as `CUDA_VISIBLE_DEVICES`.
    pub gpu: Option<String>,
    /// Detach and supervise in the background.
    pub background: bool,
    /// Commit message for the snapshot commit, if one is created.
    pub description: Option<String>,
    /// Extra arguments appended to the job program.
    pub prog_args: Vec<String>,
}

/// Run an experiment. Returns `None` when the operator declined to recreate
/// an existing one (a successful no-op).
pub fn run_experiment(root: &Path, name: &str, options: &RunOptions) -> Result<Option<RunOutcome>> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    validate_name(name)?;
    let config = load_config(&layout.config_path)?;
    let registry = layout.registry();
    let git = Git::new(&layout.root);

    if let Some(existing) = registry.get(name)? {
        if existing.is_running() {
            bail!("experiment \"{name}\" is already running");
        }
        if !confirm(&format!("Experiment {name} already exists. Recreate? [yN] "))? {
            debug!(name, "recreate declined");
            return Ok(None);
        }
        // Tear down the worktree and record but keep the branch: the new
        // run reuses its commit when the source still matches.
        clean::teardown_worktree(&layout, &git, &registry, name)?;
    }

    let base = if git.branch_exists(name)? {
        if git.is_branch_checked_out(name)? {
            bail!("cannot run experiment on checked out branch");
        }
        Some(git.branch_tip(name)?)
    } else {
        None
    };

    let dir = create_sandbox(
        &layout,
        &config,
        &git,
        name,
        base.as_deref(),
        options.description.as_deref(),
    )?;

    let command = job_command(&config, &options.prog_args);
    let outcome = supervise(
        &registry,
        name,
        command,
        &dir,
        options.gpu.as_deref(),
        options.background,
    )?;
    info!(name, status = outcome.status.as_str(), "run finished");
    Ok(Some(outcome))
}

/// Re-run a stopped experiment in its existing sandbox with `--resume`
/// (plus the epoch, when given) appended to the job arguments.
pub fn resume_experiment(
    root: &Path,
    name: &str,
    epoch: Option<&str>,
    options: &RunOptions,
) -> Result<RunOutcome> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    let config = load_config(&layout.config_path)?;
    let registry = layout.registry();
    let git = Git::new(&layout.root);

    let record = registry
        .get(name)?
        .ok_or_else(|| anyhow!("no experiment named \"{name}\""))?;
    if record.is_running() || record.pid.is_some() {
        bail!("experiment \"{name}\" is already running");
    }
    if !git.branch_exists(name)? {
        bail!("no branch for experiment \"{name}\"");
    }
    let dir = layout.experiment_dir(name);
    if !dir.is_dir() {
        bail!("no worktree for experiment \"{name}\"");
    }

    let mut command = job_command(&config, &options.prog_args);
    command.arg("--resume");
    if let Some(epoch) = epoch {
        command.arg(epoch);
    }
    supervise(
        &registry,
        name,
        command,
        &dir,
        options.gpu.as_deref(),
        options.background,
    )
}

fn job_command(config: &ProjectConfig, extra: &[String]) -> Command {
    let mut cmd = Command::new(&config.experiment.program);
    cmd.args(&config.experiment.program_args);
    cmd.args(extra);
    cmd
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush().context("flush prompt")?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("read answer")?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
