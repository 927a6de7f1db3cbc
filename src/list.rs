//! Orchestration for `em list`.

use std::path::Path;

use anyhow::{Result, anyhow};

use crate::io::layout::ProjectLayout;

/// Sorted experiment names, optionally restricted to records whose
/// serialized `field` equals `value` exactly (`--filter field=value`).
pub fn list_experiments(root: &Path, filter: Option<&str>) -> Result<Vec<String>> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    let registry = layout.registry();

    match filter {
        Some(expr) => {
            let (field, value) = expr
                .split_once('=')
                .ok_or_else(|| anyhow!("filter must be <field>=<value> (got \"{expr}\")"))?;
            registry.list_filter(field, value)
        }
        None => registry.list(),
    }
}
