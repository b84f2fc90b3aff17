//! Command implementations for docplus CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod allowlist;
pub mod doctor;
pub mod ext;
pub mod storage;
pub mod think;
