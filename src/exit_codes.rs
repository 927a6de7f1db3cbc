//! Stable exit codes for em CLI commands.

/// Command succeeded (the job's own exit status is recorded, not returned).
pub const OK: i32 = 0;
/// Command failed due to a reported error condition.
pub const ERROR: i32 = 1;
