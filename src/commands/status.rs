use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::error::ShipResult;
use crate::core::vcs::SystemGit;
use crate::deps::overrides::OverrideStore;
use crate::history::GitHistoryAnalyzer;
use crate::pipeline::BUILD_SENTINEL;
use crate::props::GeneratedProps;
use crate::version::main_info::MainVersionInfo;

/// Release state relative to the last published tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
  /// No commits since the last release
  Released,
  /// Commits exist and a bump was recorded
  ReadyToPublish,
  /// Commits exist without a recorded bump
  NeedsBump,
  /// No release tag found for the current release line
  NoSeedTag,
}

/// Resolved source of one dependency, as shown by status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
  pub kind: String,
  pub origin: String,
}

/// Status information for the checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStatus {
  pub product: String,
  pub family: String,
  pub branch: String,
  pub main_version: String,
  pub release_state: ReleaseState,
  /// Last prepared package version, if a properties file exists
  pub package_version: Option<String>,
  pub build_succeeded: bool,
  pub dependencies: BTreeMap<String, DependencyStatus>,
}

/// Run the status command
pub fn run_status(config: Option<PathBuf>, json: bool) -> ShipResult<()> {
  let (root, config) = super::load_config(config.as_deref())?;
  let git = SystemGit::open(&root)?;
  let main = MainVersionInfo::load(&root.join(&config.version.file))?;

  let release_state = match GitHistoryAnalyzer::new(&git).analyze(&main) {
    Ok(report) => {
      if !report.has_changes_since_last_deployment {
        ReleaseState::Released
      } else if report.has_bump_since_last_deployment {
        ReleaseState::ReadyToPublish
      } else {
        ReleaseState::NeedsBump
      }
    }
    Err(_) => ReleaseState::NoSeedTag,
  };

  let package_version = GeneratedProps::load(&GeneratedProps::path_for(&root, &config.product.name))
    .ok()
    .map(|p| p.package_version);

  let dependencies = OverrideStore::new(&root)
    .load_persisted()?
    .map(|file| {
      file
        .dependencies
        .iter()
        .map(|(name, entry)| {
          (
            name.clone(),
            DependencyStatus {
              kind: entry.source.kind_name().to_string(),
              origin: format!("{:?}", entry.origin),
            },
          )
        })
        .collect()
    })
    .unwrap_or_default();

  let status = ProductStatus {
    product: config.product.name.clone(),
    family: config.product.family.clone(),
    branch: git.current_branch()?,
    main_version: main.main_version.clone(),
    release_state,
    package_version,
    build_succeeded: crate::core::config::ShipConfig::state_dir(&root).join(BUILD_SENTINEL).exists(),
    dependencies,
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&status)?);
  } else {
    print_human(&status);
  }
  Ok(())
}

fn print_human(status: &ProductStatus) {
  println!("📦 {} ({})", status.product, status.family);
  println!("   branch:       {}", status.branch);
  println!("   main version: {}", status.main_version);
  match &status.package_version {
    Some(version) => println!("   prepared:     {}", version),
    None => println!("   prepared:     (not prepared)"),
  }
  println!(
    "   last build:   {}",
    if status.build_succeeded { "✅ succeeded" } else { "—" }
  );
  match status.release_state {
    ReleaseState::Released => println!("   release:      ✅ up to date"),
    ReleaseState::ReadyToPublish => println!("   release:      🚀 bump recorded, ready to publish"),
    ReleaseState::NeedsBump => println!("   release:      ⚠️  changes without a version bump"),
    ReleaseState::NoSeedTag => println!("   release:      ❓ no release tag for this line"),
  }

  if !status.dependencies.is_empty() {
    println!("   dependencies:");
    for (name, dep) in &status.dependencies {
      println!("     {} [{}] ({})", name, dep.kind, dep.origin);
    }
  }
}
