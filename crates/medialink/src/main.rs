mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Console;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(code);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so `--output json` stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the process exit code; `Err` is reserved for precondition failures.
async fn run(cli: Cli) -> Result<i32, CliError> {
    let command = cli.resolved_command();
    let mut console = Console::new(&cli.global);

    match command {
        // Needs neither a config file nor the services
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "medialink", &mut std::io::stdout());
            Ok(error::exit_code::SUCCESS)
        }

        Command::CheckConfig(args) => commands::check_config::handle(&args, &cli.global, &console),
        Command::Preflight => commands::preflight::handle(&cli.global, &console).await,
        Command::Backup(args) => commands::backup::handle_backup(&args, &cli.global, &console),
        Command::Restore(args) => commands::backup::handle_restore(&args, &cli.global, &console),

        cmd => {
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &cli.global, &mut console).await
        }
    }
}
