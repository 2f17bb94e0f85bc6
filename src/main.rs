use clap::{Parser, Subcommand};
use shipway::commands::{self, PublishPhaseArg, VersionKindArg};
use shipway::core::config::Configuration;
use shipway::core::error::{print_error, ShipError};
use shipway::core::process::CancelToken;
use std::path::PathBuf;

/// Release engineering for multi-repository products
#[derive(Parser)]
#[command(name = "shipway")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct ShipwayCli {
  /// Path to the product manifest (default: ./ship.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Build configuration
  #[arg(long, global = true, value_enum, default_value = "release")]
  configuration: Configuration,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve dependencies and compute this invocation's version
  Prepare {
    /// Versioning policy (default: local, or numbered when --build-number is given)
    #[arg(long, value_enum)]
    version_kind: Option<VersionKindArg>,
    /// CI-issued build number for numbered builds
    #[arg(long)]
    build_number: Option<u64>,
    /// Skip dependency resolution and fetching
    #[arg(long)]
    no_dependencies: bool,
    /// Allow a public build outside CI
    #[arg(long)]
    force: bool,
    /// Skip when a properties file newer than this RFC 3339 timestamp exists
    #[arg(long)]
    fresh_since: Option<String>,
  },

  /// Run build units, verify and package artifacts
  Build {
    /// Skip zipping private artifacts
    #[arg(long)]
    no_zip: bool,
  },

  /// Run test units
  Test {
    /// Rebuild before testing
    #[arg(long)]
    rebuild: bool,
    /// Run tests under the configured coverage wrapper
    #[arg(long)]
    coverage: bool,
  },

  /// Fan out artifacts to the configured publish targets
  Publish {
    /// Which publish phase to run
    #[arg(long, value_enum, default_value = "publish")]
    phase: PublishPhaseArg,
    /// Tag and merge here instead of leaving it to the release train
    #[arg(long)]
    standalone: bool,
    /// Publish even when changes exist without a recorded bump
    #[arg(long)]
    force: bool,
  },

  /// Swap deployment slots and smoke-test the result
  Swap,

  /// Record a version bump on the development branch
  Bump {
    /// Bump again even when a bump was already recorded
    #[arg(long)]
    override_previous_bump: bool,
    /// Bump even without local or dependency changes
    #[arg(long)]
    force: bool,
  },

  /// Show the checkout's release state
  Status {
    /// Output status in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = ShipwayCli::parse();

  let cancel = CancelToken::new();
  {
    let cancel = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
      eprintln!("Warning: could not install Ctrl-C handler: {}", e);
    }
  }

  let result = match cli.command {
    Commands::Prepare {
      version_kind,
      build_number,
      no_dependencies,
      force,
      fresh_since,
    } => commands::run_prepare(
      cli.config,
      cli.configuration,
      version_kind,
      build_number,
      no_dependencies,
      force,
      fresh_since,
      cancel,
    ),
    Commands::Build { no_zip } => commands::run_build(cli.config, cli.configuration, no_zip, cancel),
    Commands::Test { rebuild, coverage } => commands::run_test(cli.config, cli.configuration, rebuild, coverage, cancel),
    Commands::Publish {
      phase,
      standalone,
      force,
    } => commands::run_publish(cli.config, phase, standalone, force, cancel),
    Commands::Swap => commands::run_swap(cli.config, cancel),
    Commands::Bump {
      override_previous_bump,
      force,
    } => commands::run_bump(cli.config, override_previous_bump, force, cancel),
    Commands::Status { json } => commands::run_status(cli.config, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: ShipError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
