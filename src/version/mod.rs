//! Version computation
//!
//! - **main_info**: the version declaration file (main version, suffix,
//!   overridden patch, per-dependency defaults)
//! - **counter**: per-user per-product local version counter capability
//! - **resolver**: the version computation algorithm for the three
//!   versioning policies (local, CI-numbered, public)

pub mod counter;
pub mod main_info;
pub mod resolver;

pub use counter::{CounterStore, FileCounterStore, MemoryCounterStore};
pub use main_info::{DependencyDefault, MainVersionInfo};
pub use resolver::{compute_version, BuildInfo, LegacyVersionTokens, VersionComponents, VersionSpec};
