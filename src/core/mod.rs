//! Pure, deterministic logic shared by the em core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod changes;
pub mod record;
