//! CLI commands for shipway
//!
//! One `run_*` entry point per subcommand:
//! - **prepare**: resolve dependencies and compute the version
//! - **build**: run build units, verify and package artifacts
//! - **test**: run test units
//! - **publish**: fan out to publish targets (pre/publish/post phases)
//! - **swap**: swap deployment slots with smoke-tested auto-revert
//! - **bump**: record a version bump on the development branch
//! - **status**: show the checkout's release state

pub mod build;
pub mod bump;
pub mod prepare;
pub mod publish;
pub mod status;
pub mod swap;
pub mod test;

pub use build::run_build;
pub use bump::run_bump;
pub use prepare::{run_prepare, VersionKindArg};
pub use publish::{run_publish, PublishPhaseArg};
pub use status::run_status;
pub use swap::run_swap;
pub use test::run_test;

use crate::core::config::ShipConfig;
use crate::core::error::ShipResult;
use crate::core::process::CancelToken;
use crate::pipeline::ReleasePipeline;
use std::path::{Path, PathBuf};

/// Build the pipeline for the manifest at `config_path` (or ./ship.toml)
fn load_pipeline(config_path: Option<&Path>, cancel: CancelToken) -> ShipResult<ReleasePipeline> {
  let (root, config) = load_config(config_path)?;
  ReleasePipeline::new(&root, config, cancel)
}

fn load_config(config_path: Option<&Path>) -> ShipResult<(PathBuf, ShipConfig)> {
  let cwd = std::env::current_dir()?;
  match config_path {
    Some(path) => {
      let absolute = if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) };
      let config = ShipConfig::load_path(&absolute)?;
      let root = absolute.parent().map(Path::to_path_buf).unwrap_or(cwd);
      Ok((root, config))
    }
    None => {
      let config = ShipConfig::load(&cwd)?;
      Ok((cwd, config))
    }
  }
}
