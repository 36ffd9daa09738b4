use serde::Serialize;

use medialink_core::{Pipeline, RunReport, SetupReport};

use crate::error::CliError;
use crate::output::Console;

#[derive(Serialize)]
struct SetupDocument<'a> {
    setup: &'a SetupReport,
    verify: &'a RunReport,
}

/// Full run: setup stages, then the verification suite.
///
/// Action failures are reported but only failed checks drive the exit code.
pub async fn handle(pipeline: &Pipeline, console: &mut Console) -> Result<i32, CliError> {
    let setup = pipeline.setup(console).await;
    console.setup_summary(&setup);

    let verify = pipeline.verify(None, console).await;
    console.tally(&verify);

    tracing::info!(
        mutations = setup.mutations(),
        failed_actions = setup.failed_actions(),
        failed_checks = verify.failed,
        "run finished"
    );

    console.json(&SetupDocument {
        setup: &setup,
        verify: &verify,
    })?;
    Ok(i32::from(verify.exit_code()))
}
