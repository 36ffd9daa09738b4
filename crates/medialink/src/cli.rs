//! Clap derive structures for the `medialink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use medialink_core::ServiceName;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// medialink -- wire up and verify a self-hosted media stack
#[derive(Debug, Parser)]
#[command(
    name = "medialink",
    version,
    about = "Wire up and verify a self-hosted media stack",
    long_about = "Waits for every service of the stack to answer, configures them to\n\
        reference each other through their REST APIs, renders proxy, dashboard\n\
        and compose artifacts, then verifies the result.\n\n\
        Running it again is safe: converged settings are left untouched.",
    propagate_version = true,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(flatten)]
    pub mode: ModeFlags,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The command to run: the subcommand, else a mode flag, else `setup`.
    pub fn resolved_command(&self) -> Command {
        if let Some(command) = &self.command {
            return command.clone();
        }
        if self.mode.preflight {
            Command::Preflight
        } else if self.mode.check_config {
            Command::CheckConfig(CheckConfigArgs { show: false })
        } else if self.mode.test {
            Command::Test(TestArgs { service: None })
        } else {
            Command::Setup
        }
    }
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "MEDIALINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Skip the container runtime check during preflight
    #[arg(long, global = true)]
    pub no_runtime_check: bool,
}

/// Legacy mode switches, equivalent to the subcommands of the same name.
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct ModeFlags {
    /// Same as `medialink preflight`
    #[arg(long)]
    pub preflight: bool,

    /// Same as `medialink check-config`
    #[arg(long)]
    pub check_config: bool,

    /// Same as `medialink test`
    #[arg(long)]
    pub test: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Progress lines and a summary table
    Text,
    /// One JSON document on stdout
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Wait, configure, render, then verify (default)
    Setup,

    /// Check local prerequisites without changing anything
    Preflight,

    /// Validate the configuration file and list every problem
    CheckConfig(CheckConfigArgs),

    /// Run the verification suite only
    #[command(alias = "verify")]
    Test(TestArgs),

    /// Archive the config root
    Backup(BackupArgs),

    /// Unpack a backup archive into the config root
    Restore(RestoreArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CheckConfigArgs {
    /// Print the effective configuration with secrets masked
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// Only verify this service
    #[arg(long, short = 's', value_parser = parse_service)]
    pub service: Option<ServiceName>,
}

#[derive(Debug, Clone, Args)]
pub struct BackupArgs {
    /// Directory the archive is written to
    #[arg(long, short = 'd', default_value = ".")]
    pub dest: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct RestoreArgs {
    /// Archive produced by `medialink backup`
    pub archive: PathBuf,

    /// Restore into a config root that already has content
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

fn parse_service(value: &str) -> Result<ServiceName, String> {
    ServiceName::parse(value).map_err(|e| e.to_string())
}
