//! Command handlers: load settings, drive the engine, hand results to the console.

pub mod backup;
pub mod check_config;
pub mod preflight;
pub mod setup;
pub mod test;

use std::path::PathBuf;

use medialink_core::{Pipeline, RunContext, StackSettings};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Console;

/// The config file in effect: `--config` / `MEDIALINK_CONFIG`, else the default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(medialink_config::config_path)
}

pub fn load_settings(global: &GlobalOpts) -> Result<StackSettings, CliError> {
    let path = config_file(global);
    tracing::debug!(path = %path.display(), "loading configuration");
    Ok(medialink_config::load_settings(&path)?)
}

fn pipeline(global: &GlobalOpts) -> Result<Pipeline, CliError> {
    let settings = load_settings(global)?;
    Ok(Pipeline::new(RunContext::new(settings)?))
}

/// Dispatch a command that talks to the services.
pub async fn dispatch(
    cmd: Command,
    global: &GlobalOpts,
    console: &mut Console,
) -> Result<i32, CliError> {
    let pipeline = pipeline(global)?;
    match cmd {
        Command::Setup => setup::handle(&pipeline, console).await,
        Command::Test(args) => test::handle(&pipeline, &args, console).await,
        // Handled before dispatch
        Command::Preflight
        | Command::CheckConfig(_)
        | Command::Backup(_)
        | Command::Restore(_)
        | Command::Completions(_) => unreachable!(),
    }
}
