//! Dependency resolution
//!
//! - **source**: the resolved origin of one dependency (feed, local
//!   sibling checkout, or CI build) with its origin tag
//! - **overrides**: the dependency override file and its load/merge/
//!   fetch/persist lifecycle
//! - **build_server**: CI build resolution behind an injected client
//! - **snapshot**: persisted dependency snapshot for bump detection

pub mod build_server;
pub mod overrides;
pub mod snapshot;
pub mod source;

pub use build_server::{BuildServerClient, CommandBuildServer, MemoryBuildServer};
pub use overrides::{DependencyOverrideFile, LocalBuildImport, OverrideEntry, OverrideStore};
pub use snapshot::{DependencySnapshot, FileSnapshotStore, MemorySnapshotStore, SnapshotEntry, SnapshotStore};
pub use source::{DependencySource, Origin};
