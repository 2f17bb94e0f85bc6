//! Core building blocks for shipway
//!
//! - **config**: product manifest (ship.toml) parsing and validation
//! - **error**: error types with exit codes and contextual help
//! - **process**: external tool invocation with retry and cancellation
//! - **vcs**: git operations abstraction (SystemGit)

pub mod config;
pub mod error;
pub mod process;
pub mod vcs;
