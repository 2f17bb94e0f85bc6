use crate::core::error::ShipResult;
use crate::core::process::CancelToken;
use std::path::PathBuf;

/// Run the swap command
pub fn run_swap(config: Option<PathBuf>, cancel: CancelToken) -> ShipResult<()> {
  let pipeline = super::load_pipeline(config.as_deref(), cancel)?;
  pipeline.swap()
}
