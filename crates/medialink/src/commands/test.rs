use medialink_core::Pipeline;

use crate::cli::TestArgs;
use crate::error::CliError;
use crate::output::Console;

pub async fn handle(
    pipeline: &Pipeline,
    args: &TestArgs,
    console: &mut Console,
) -> Result<i32, CliError> {
    let report = pipeline.verify(args.service, console).await;
    console.tally(&report);
    console.json(&report)?;
    Ok(i32::from(report.exit_code()))
}
