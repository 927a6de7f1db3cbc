//! Orchestration for `em show`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::io::layout::ProjectLayout;

/// Render an experiment's record as sorted `key: value` lines. With
/// `include_opts`, append the job-owned `run/opts.json` pretty-printed.
pub fn show_experiment(root: &Path, name: &str, include_opts: bool) -> Result<String> {
    let layout = ProjectLayout::new(root);
    layout.ensure_project()?;
    let record = layout
        .registry()
        .get(name)?
        .ok_or_else(|| anyhow!("no experiment named \"{name}\""))?;

    let Value::Object(fields) = serde_json::to_value(&record)? else {
        unreachable!("record serializes to an object");
    };
    let sorted: BTreeMap<String, Value> = fields.into_iter().collect();

    let mut out = String::new();
    for (key, value) in sorted {
        match value {
            Value::String(s) => writeln!(out, "{key}: {s}")?,
            other => writeln!(out, "{key}: {other}")?,
        }
    }

    if include_opts {
        let opts_path = layout.opts_path(name);
        let raw = fs::read_to_string(&opts_path)
            .with_context(|| format!("read options {}", opts_path.display()))?;
        let opts: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parse options {}", opts_path.display()))?;
        writeln!(out, "\noptions:")?;
        writeln!(out, "{}", serde_json::to_string_pretty(&opts)?)?;
    }

    Ok(out)
}
