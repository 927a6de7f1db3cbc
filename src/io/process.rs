//! Job process supervision: spawn, record, wait, finalize.
//!
//! The supervisor owns the `running` record for the duration of the job. A
//! finalization guard is armed as soon as the record is written and fires on
//! every exit path, so the registry never keeps a `running` entry for a
//! process that is no longer supervised.

use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::record::{ExperimentRecord, ExperimentStatus};
use crate::io::registry::Registry;

/// Environment variable used to pin a job to specific devices.
pub const GPU_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// Outcome of supervising a job to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: ExperimentStatus,
    pub exit_code: Option<i32>,
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Seals the record's live-only fields on every exit path.
struct FinalizeGuard<'a> {
    registry: &'a Registry,
    name: &'a str,
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.registry.update(self.name, |rec| rec.seal(Utc::now())) {
            warn!(name = self.name, err = %err, "failed to finalize record");
        }
    }
}

/// Spawn `command` in `workdir` and supervise it until exit.
///
/// The job inherits the caller's standard streams. With `background`, the
/// supervisor first detaches its own session (streams to /dev/null, working
/// directory preserved) and then supervises identically. The `running`
/// record is upserted as soon as the pid exists; exit code 0 maps to
/// `completed`, anything else to `error`, and an observed SIGINT to
/// `interrupted`.
#[instrument(skip_all, fields(name, background))]
pub fn supervise(
    registry: &Registry,
    name: &str,
    mut command: Command,
    workdir: &Path,
    gpu: Option<&str>,
    background: bool,
) -> Result<RunOutcome> {
    if background {
        detach().context("detach for background run")?;
    }
    install_interrupt_flag();

    command.current_dir(workdir);
    if let Some(gpu) = gpu {
        command.env(GPU_ENV, gpu);
    }

    let mut child = command.spawn().context("spawn job")?;
    let pid = child.id();
    registry.upsert(
        name,
        ExperimentRecord::running(pid, hostname(), gpu.map(str::to_string)),
    )?;
    let _guard = FinalizeGuard { registry, name };
    info!(name, pid, "job started");

    let exit = child.wait().context("wait for job")?;

    let status = if INTERRUPTED.load(Ordering::SeqCst) {
        ExperimentStatus::Interrupted
    } else if exit.success() {
        ExperimentStatus::Completed
    } else {
        ExperimentStatus::Error
    };
    registry.update(name, |rec| rec.finish(status, Utc::now()))?;
    debug!(name, ?status, exit_code = ?exit.code(), "job finished");

    Ok(RunOutcome {
        status,
        exit_code: exit.code(),
    })
}

/// Best-effort machine identity for the `running` record.
pub fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    if let Ok(output) = Command::new("hostname").output() {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }
    "unknown".to_string()
}

/// Check whether a process with the given pid is alive.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    // POSIX: kill(pid, 0) delivers nothing but reports existence
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    true
}

/// Deliver SIGINT to a process.
#[cfg(unix)]
pub fn send_sigint(pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).with_context(|| format!("signal pid {pid}"));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn send_sigint(_pid: u32) -> Result<()> {
    anyhow::bail!("signal delivery requires unix")
}

/// Flag SIGINT instead of dying, so the supervisor can finalize the record
/// after the child (which receives the same terminal signal) has exited.
#[cfg(unix)]
fn install_interrupt_flag() {
    extern "C" fn on_sigint(_signal: libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }
    let handler = on_sigint as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_interrupt_flag() {}

/// Detach from the controlling session: fork (the parent returns to the
/// shell with status 0), start a new session, and point the standard
/// streams at /dev/null. The working directory is preserved.
#[cfg(unix)]
fn detach() -> Result<()> {
    use std::fs::File;
    use std::os::fd::AsRawFd;

    match unsafe { libc::fork() } {
        -1 => return Err(std::io::Error::last_os_error()).context("fork"),
        0 => {}
        _ => std::process::exit(0),
    }
    if unsafe { libc::setsid() } == -1 {
        return Err(std::io::Error::last_os_error()).context("setsid");
    }

    let null = File::options()
        .read(true)
        .write(true)
        .open("/dev/null")
        .context("open /dev/null")?;
    for target in 0..=2 {
        if unsafe { libc::dup2(null.as_raw_fd(), target) } == -1 {
            return Err(std::io::Error::last_os_error()).context("redirect standard stream");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn detach() -> Result<()> {
    anyhow::bail!("background mode requires unix")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, Registry) {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = Registry::new(temp.path().join(".em.json"));
        (temp, registry)
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[test]
    fn zero_exit_records_completed() {
        let (temp, registry) = registry();
        let outcome =
            supervise(&registry, "ok", sh("exit 0"), temp.path(), None, false).expect("supervise");
        assert_eq!(outcome.status, ExperimentStatus::Completed);
        assert_eq!(outcome.exit_code, Some(0));

        let rec = registry.get("ok").expect("get").expect("present");
        assert_eq!(rec.status, ExperimentStatus::Completed);
        assert!(rec.pid.is_none());
        assert!(rec.ended.is_some());
    }

    #[test]
    fn nonzero_exit_records_error() {
        let (temp, registry) = registry();
        let outcome =
            supervise(&registry, "bad", sh("exit 3"), temp.path(), None, false).expect("supervise");
        assert_eq!(outcome.status, ExperimentStatus::Error);
        assert_eq!(outcome.exit_code, Some(3));
        let rec = registry.get("bad").expect("get").expect("present");
        assert_eq!(rec.status, ExperimentStatus::Error);
        assert!(rec.pid.is_none());
    }

    #[test]
    fn gpu_selector_reaches_the_job_environment() {
        let (temp, registry) = registry();
        let script = format!("test \"${GPU_ENV}\" = 1,2");
        let outcome = supervise(
            &registry,
            "gpu",
            sh(&script),
            temp.path(),
            Some("1,2"),
            false,
        )
        .expect("supervise");
        assert_eq!(outcome.status, ExperimentStatus::Completed);
    }

    #[test]
    fn guard_seals_the_record_when_dropped_early() {
        let (_temp, registry) = registry();
        registry
            .upsert(
                "doomed",
                ExperimentRecord::running(1234, "host".to_string(), None),
            )
            .expect("upsert");
        {
            let _guard = FinalizeGuard {
                registry: &registry,
                name: "doomed",
            };
            // Supervision unwinds here without reaching finish().
        }
        let rec = registry.get("doomed").expect("get").expect("present");
        assert_eq!(rec.status, ExperimentStatus::Interrupted);
        assert!(rec.pid.is_none());
        assert!(rec.ended.is_some());
    }

    #[test]
    fn own_pid_is_alive_and_far_pid_is_not() {
        assert!(pid_alive(std::process::id()));
        // pid_max on linux defaults well below this
        assert!(!pid_alive(4_000_000));
    }

    #[test]
    fn hostname_is_nonempty() {
        assert!(!hostname().is_empty());
    }
}
