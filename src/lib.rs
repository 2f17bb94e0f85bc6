//! shipway: multi-repository release engineering
//!
//! Drives a family of product repositories through a deterministic
//! release pipeline: dependency resolution with per-invocation
//! overrides, version computation under local/CI/public policies,
//! build/test orchestration, publish fan-out with slot swap and
//! auto-revert, and git-history-driven version bumps.

pub mod commands;
pub mod core;
pub mod deps;
pub mod history;
pub mod pipeline;
pub mod props;
pub mod publish;
pub mod ui;
pub mod version;
