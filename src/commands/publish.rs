use crate::core::error::ShipResult;
use crate::core::process::CancelToken;
use std::path::PathBuf;

/// Which publish phase to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PublishPhaseArg {
  /// Pre-publish targets, run on the development branch
  Pre,
  /// The main publish fan-out
  #[default]
  Publish,
  /// Post-publish targets
  Post,
}

/// Run the publish command
pub fn run_publish(
  config: Option<PathBuf>,
  phase: PublishPhaseArg,
  standalone: bool,
  force: bool,
  cancel: CancelToken,
) -> ShipResult<()> {
  let pipeline = super::load_pipeline(config.as_deref(), cancel)?;
  match phase {
    PublishPhaseArg::Pre => pipeline.pre_publish(force),
    PublishPhaseArg::Publish => {
      let standalone = standalone || pipeline.config().product.standalone;
      pipeline.publish(standalone, force)
    }
    PublishPhaseArg::Post => pipeline.post_publish(),
  }
}
