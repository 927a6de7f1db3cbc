//! Source-change classification against the tracked-extension set.
//!
//! Drives the branching decision in `run`: whether a snapshot commit is
//! needed at all, and whether reusing an existing branch is safe.

use std::collections::BTreeSet;
use std::path::Path;

/// Working-tree change summary relative to the tracked extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Any non-clean, non-ignored path exists.
    pub has_changes: bool,
    /// At least one change touches a tracked-extension path.
    pub has_tracked_changes: bool,
}

/// Classify changed paths against the tracked extensions.
///
/// `paths` holds every changed path from the working tree (clean and ignored
/// paths are never reported by the status query). A path with no extension
/// never counts as tracked.
pub fn classify<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    tracked: &BTreeSet<String>,
) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for path in paths {
        summary.has_changes = true;
        if is_tracked(path, tracked) {
            summary.has_tracked_changes = true;
        }
    }
    summary
}

/// Subset of `paths` with a tracked extension, in input order.
pub fn tracked_paths<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    tracked: &BTreeSet<String>,
) -> Vec<&'a str> {
    paths
        .into_iter()
        .filter(|path| is_tracked(path, tracked))
        .collect()
}

fn is_tracked(path: &str, tracked: &BTreeSet<String>) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| tracked.contains(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked() -> BTreeSet<String> {
        ["py", "sh"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn clean_tree_has_no_changes() {
        let summary = classify([], &tracked());
        assert_eq!(summary, ChangeSummary::default());
    }

    #[test]
    fn untracked_extension_sets_only_has_changes() {
        let summary = classify(["results.csv"], &tracked());
        assert!(summary.has_changes);
        assert!(!summary.has_tracked_changes);
    }

    #[test]
    fn tracked_extension_sets_both() {
        let summary = classify(["results.csv", "train/model.py"], &tracked());
        assert!(summary.has_changes);
        assert!(summary.has_tracked_changes);
    }

    #[test]
    fn extensionless_path_is_never_tracked() {
        let summary = classify(["Makefile", "bin/run"], &tracked());
        assert!(summary.has_changes);
        assert!(!summary.has_tracked_changes);
    }

    #[test]
    fn tracked_paths_filters_and_preserves_order() {
        let paths = tracked_paths(["a.py", "b.csv", "c.sh", "d"], &tracked());
        assert_eq!(paths, vec!["a.py", "c.sh"]);
    }
}
