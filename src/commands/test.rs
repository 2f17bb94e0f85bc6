use crate::core::config::Configuration;
use crate::core::error::ShipResult;
use crate::core::process::CancelToken;
use crate::pipeline::TestOptions;
use std::path::PathBuf;

/// Run the test command
pub fn run_test(
  config: Option<PathBuf>,
  configuration: Configuration,
  rebuild: bool,
  coverage: bool,
  cancel: CancelToken,
) -> ShipResult<()> {
  let pipeline = super::load_pipeline(config.as_deref(), cancel)?;
  pipeline.test(configuration, &TestOptions { rebuild, coverage })
}
