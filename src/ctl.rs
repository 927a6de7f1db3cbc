//! Orchestration for `em ctl`: runtime command delivery to a live job.
//!
//! `stop` becomes a SIGINT to the tracked pid; anything else is appended,
//! space-joined, to the control file inside the experiment's run directory.
//! The file channel is one-way and best-effort: the job is expected to poll
//! it, and delivery is never confirmed.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::io::layout::ProjectLayout;
use crate::io::process::{pid_alive, send_sigint};

pub fn control_experiment(root: &Path, name: &str, words: &[String]) -> Result<()> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    let record = layout
        .registry()
        .get(name)?
        .ok_or_else(|| anyhow!("no experiment named \"{name}\""))?;

    // Liveness is re-checked right before delivery; a recorded pid whose
    // process has gone away counts as not running.
    let Some(pid) = record.pid else {
        bail!("experiment \"{name}\" is not running");
    };
    if !pid_alive(pid) {
        bail!("experiment \"{name}\" is not running");
    }

    match words.first().map(String::as_str) {
        Some("stop") => {
            info!(name, pid, "stopping job");
            send_sigint(pid)
        }
        Some(_) => {
            let ctl_path = layout.ctl_path(name);
            if let Some(parent) = ctl_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create run dir {}", parent.display()))?;
            }
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&ctl_path)
                .with_context(|| format!("open control file {}", ctl_path.display()))?;
            writeln!(file, "{}", words.join(" "))
                .with_context(|| format!("write control file {}", ctl_path.display()))?;
            debug!(name, "control command appended");
            Ok(())
        }
        None => bail!("no control command given"),
    }
}
