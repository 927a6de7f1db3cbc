//! Orchestration for `em reset`: clear a glitched record.
//!
//! Used when a host died mid-run and the registry still says `running` for a
//! process that no longer exists anywhere. Sealing drops the live-only
//! fields, stamps an end time, and downgrades the status to `interrupted`.

use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::info;

use crate::io::layout::ProjectLayout;

pub fn reset_experiment(root: &Path, name: &str) -> Result<()> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    let touched = layout.registry().update(name, |rec| rec.seal(Utc::now()))?;
    if !touched {
        bail!("no experiment named \"{name}\"");
    }
    info!(name, "record reset");
    Ok(())
}
