use crate::core::config::Configuration;
use crate::core::error::ShipResult;
use crate::core::process::CancelToken;
use crate::pipeline::BuildOptions;
use std::path::PathBuf;

/// Run the build command
pub fn run_build(
  config: Option<PathBuf>,
  configuration: Configuration,
  no_zip: bool,
  cancel: CancelToken,
) -> ShipResult<()> {
  let pipeline = super::load_pipeline(config.as_deref(), cancel)?;
  pipeline.build(configuration, &BuildOptions { no_zip })
}
