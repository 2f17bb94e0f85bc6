use crate::core::error::ShipResult;
use crate::core::process::CancelToken;
use crate::pipeline::BumpOptions;
use std::path::PathBuf;

/// Run the bump command
pub fn run_bump(
  config: Option<PathBuf>,
  override_previous_bump: bool,
  force: bool,
  cancel: CancelToken,
) -> ShipResult<()> {
  let pipeline = super::load_pipeline(config.as_deref(), cancel)?;
  pipeline.bump_version(&BumpOptions {
    override_previous_bump,
    force,
  })?;
  Ok(())
}
