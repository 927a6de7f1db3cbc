//! Snapshot-based manager for reproducible experiment runs.
//!
//! `em` freezes a working directory's tracked source files into a
//! per-experiment git branch, checks that branch out into an isolated
//! worktree under `experiments/<name>`, and supervises the job process
//! inside it while keeping a durable lifecycle record in `.em.json`. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (records, change
//!   classification). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (git, registry, config,
//!   process supervision). Isolated to enable fixture-driven tests.
//!
//! Orchestration modules ([`run`], [`sandbox`], [`clean`], [`list`],
//! [`show`], [`ctl`], [`rename`], [`reset`]) coordinate core logic with
//! I/O to implement CLI commands.

pub mod clean;
pub mod core;
pub mod ctl;
pub mod exit_codes;
pub mod io;
pub mod list;
pub mod logging;
pub mod rename;
pub mod reset;
pub mod run;
pub mod sandbox;
pub mod show;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
