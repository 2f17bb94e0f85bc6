//! Publish and swap dispatch
//!
//! Executes the configured publish/swap targets for one phase. Every
//! target reports a single tagged outcome; the aggregation rule lives
//! here and nowhere else: `Error` continues to the next target but marks
//! the overall phase failed, `Fatal` aborts immediately. Swap runs its
//! smoke testers against the new active slot and automatically re-invokes
//! the swap action to revert on tester failure.

use crate::core::config::{ArtifactVisibility, PublishPhase, PublishTargetConfig, SwapConfig, SwapTesterConfig};
use crate::core::error::{ShipError, ShipResult};
use crate::core::process::{self, CancelToken, ToolUnit};
use crate::ui::progress::TargetProgress;
use std::path::{Path, PathBuf};

/// Outcome of one publish/swap/test target
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
  Success,
  /// Recorded, processing continues across independent targets
  Error(String),
  /// Aborts the phase immediately
  Fatal(String),
}

/// One named artifact set handed to publish targets
#[derive(Debug, Clone)]
pub struct ArtifactSet {
  pub visibility: ArtifactVisibility,
  pub files: Vec<PathBuf>,
}

/// A configured publish target
pub trait Publisher {
  fn name(&self) -> &str;
  fn visibility(&self) -> ArtifactVisibility;
  fn publish(&self, set: &ArtifactSet) -> TargetOutcome;
}

/// The configured slot-swap action
pub trait Swapper {
  fn swap(&self) -> TargetOutcome;
}

/// A smoke tester run against the new active slot
pub trait SmokeTester {
  fn name(&self) -> &str;
  fn run(&self) -> TargetOutcome;
}

/// Classify a tool invocation into a target outcome
fn classify(result: ShipResult<process::ToolOutput>, fatal_pattern: Option<&str>) -> TargetOutcome {
  match result {
    Ok(_) => TargetOutcome::Success,
    Err(err) => {
      let text = err.to_string();
      if err.is_fatal() || fatal_pattern.is_some_and(|p| text.contains(p)) {
        TargetOutcome::Fatal(text)
      } else {
        TargetOutcome::Error(text)
      }
    }
  }
}

/// Command-backed publish target (feed, slot-deploy or marketplace)
pub struct CommandPublisher {
  config: PublishTargetConfig,
  root: PathBuf,
  cancel: CancelToken,
}

impl CommandPublisher {
  pub fn new(config: PublishTargetConfig, root: &Path, cancel: CancelToken) -> Self {
    Self {
      config,
      root: root.to_path_buf(),
      cancel,
    }
  }

  fn takes_per_file_argument(&self) -> bool {
    self.config.command.args.iter().any(|a| a.contains("{file}"))
  }
}

impl Publisher for CommandPublisher {
  fn name(&self) -> &str {
    &self.config.name
  }

  fn visibility(&self) -> ArtifactVisibility {
    self.config.artifacts
  }

  fn publish(&self, set: &ArtifactSet) -> TargetOutcome {
    if self.takes_per_file_argument() {
      for file in &set.files {
        let unit = self.config.command.substituted(&[("file", &file.display().to_string())]);
        let outcome = classify(
          process::run_unit(&unit, &self.root, &self.cancel),
          self.config.fatal_pattern.as_deref(),
        );
        if outcome != TargetOutcome::Success {
          return outcome;
        }
      }
      TargetOutcome::Success
    } else {
      classify(
        process::run_unit(&self.config.command, &self.root, &self.cancel),
        self.config.fatal_pattern.as_deref(),
      )
    }
  }
}

/// Command-backed slot swapper; invoking the action again reverts the slots
pub struct CommandSwapper {
  action: ToolUnit,
  root: PathBuf,
  cancel: CancelToken,
}

impl CommandSwapper {
  pub fn new(config: &SwapConfig, root: &Path, cancel: CancelToken) -> Self {
    Self {
      action: config.action.clone(),
      root: root.to_path_buf(),
      cancel,
    }
  }
}

impl Swapper for CommandSwapper {
  fn swap(&self) -> TargetOutcome {
    classify(process::run_unit(&self.action, &self.root, &self.cancel), None)
  }
}

/// Command-backed smoke tester
pub struct CommandSmokeTester {
  config: SwapTesterConfig,
  root: PathBuf,
  cancel: CancelToken,
}

impl CommandSmokeTester {
  pub fn new(config: SwapTesterConfig, root: &Path, cancel: CancelToken) -> Self {
    Self {
      config,
      root: root.to_path_buf(),
      cancel,
    }
  }
}

impl SmokeTester for CommandSmokeTester {
  fn name(&self) -> &str {
    &self.config.name
  }

  fn run(&self) -> TargetOutcome {
    classify(
      process::run_unit(&self.config.command, &self.root, &self.cancel),
      self.config.fatal_pattern.as_deref(),
    )
  }
}

/// Build the command-backed publishers for one phase
pub fn publishers_for_phase(
  targets: &[PublishTargetConfig],
  phase: PublishPhase,
  root: &Path,
  cancel: &CancelToken,
) -> Vec<Box<dyn Publisher>> {
  targets
    .iter()
    .filter(|t| t.phase == phase)
    .map(|t| Box::new(CommandPublisher::new(t.clone(), root, cancel.clone())) as Box<dyn Publisher>)
    .collect()
}

/// Executes the configured targets for one phase
pub struct PublishDispatcher;

impl PublishDispatcher {
  /// Publish an artifact set across targets whose visibility matches.
  ///
  /// `Error` outcomes are aggregated; `Fatal` aborts immediately.
  pub fn publish(&self, targets: &[Box<dyn Publisher>], set: &ArtifactSet) -> ShipResult<()> {
    let applicable: Vec<_> = targets.iter().filter(|t| t.visibility() == set.visibility).collect();
    if applicable.is_empty() {
      return Ok(());
    }

    let mut progress = TargetProgress::new(applicable.len(), "publishing");
    let mut failures: Vec<String> = Vec::new();

    for target in applicable {
      match target.publish(set) {
        TargetOutcome::Success => {}
        TargetOutcome::Error(message) => {
          failures.push(format!("{}: {}", target.name(), message));
        }
        TargetOutcome::Fatal(message) => {
          return Err(ShipError::fatal(format!("publish target '{}': {}", target.name(), message)));
        }
      }
      progress.inc();
    }

    if failures.is_empty() {
      Ok(())
    } else {
      Err(ShipError::message(format!(
        "{} publish target(s) failed:\n{}",
        failures.len(),
        failures.join("\n")
      )))
    }
  }

  /// Execute the slot swap, verify it with the smoke testers, and revert
  /// automatically when a tester reports Error.
  ///
  /// If the revert itself fails, both failures are reported distinctly.
  /// A Fatal outcome at any point aborts without attempting revert.
  pub fn swap(&self, swapper: &dyn Swapper, testers: &[Box<dyn SmokeTester>]) -> ShipResult<()> {
    match swapper.swap() {
      TargetOutcome::Success => {}
      TargetOutcome::Error(message) => {
        return Err(ShipError::message(format!("Slot swap failed: {}", message)));
      }
      TargetOutcome::Fatal(message) => {
        return Err(ShipError::fatal(format!("Slot swap failed: {}", message)));
      }
    }

    for tester in testers {
      match tester.run() {
        TargetOutcome::Success => {}
        TargetOutcome::Error(message) => {
          // Re-invoke the same action to restore the prior slot state.
          let revert = swapper.swap();
          return match revert {
            TargetOutcome::Success => Err(ShipError::message(format!(
              "Smoke tester '{}' failed after swap (slots reverted): {}",
              tester.name(),
              message
            ))),
            TargetOutcome::Error(revert_message) | TargetOutcome::Fatal(revert_message) => {
              Err(ShipError::message(format!(
                "Smoke tester '{}' failed after swap: {}\nRevert also failed: {}",
                tester.name(),
                message,
                revert_message
              )))
            }
          };
        }
        TargetOutcome::Fatal(message) => {
          return Err(ShipError::fatal(format!(
            "Smoke tester '{}' reported a fatal condition: {}",
            tester.name(),
            message
          )));
        }
      }
    }

    Ok(())
  }
}
