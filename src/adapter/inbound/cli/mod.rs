//! CLI module graph.

pub mod check;
pub mod command;
pub mod cycle;
pub mod output;
pub mod run;

use std::path::Path;

use owo_colors::{set_override, unset_override};

use self::command::{CheckCommand, Cli, ColorChoice, Commands};
use self::output::OutputConfig;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Apply global flags and run the selected subcommand.
///
/// # Errors
/// Returns the first error raised by the subcommand.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.color {
        ColorChoice::Always => set_override(true),
        ColorChoice::Never => set_override(false),
        ColorChoice::Auto => unset_override(),
    }
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    match cli.command {
        Commands::Run(args) => run::execute(&args.config).await,
        Commands::Cycle(args) => cycle::execute(&args.config).await,
        Commands::Check(CheckCommand::Config(args)) => check::config::execute_config(&args.config),
        Commands::Check(CheckCommand::Connection(args)) => {
            check::connection::execute_connection(&args.config).await
        }
    }
}

/// Load configuration and start logging for commands that run the agent.
///
/// JSON and quiet output keep the log out of stdout's way.
pub(crate) fn load_and_init_logging(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    if output::is_json() || output::is_quiet() {
        crate::infrastructure::config::logging::LoggingConfig::init_quiet();
    } else {
        config.init_logging();
    }
    Ok(config)
}
