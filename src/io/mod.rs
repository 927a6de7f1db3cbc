//! I/O helpers for em commands.

pub mod config;
pub mod git;
pub mod layout;
pub mod process;
pub mod registry;
