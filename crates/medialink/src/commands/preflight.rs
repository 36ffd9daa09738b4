//! Local prerequisites, checked before anything touches a service.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use medialink_core::{CheckOutcome, CheckResult, RunReport, StackSettings};

use crate::cli::GlobalOpts;
use crate::commands::load_settings;
use crate::error::{CliError, exit_code};
use crate::output::Console;

const RUNTIME_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn handle(global: &GlobalOpts, console: &Console) -> Result<i32, CliError> {
    let mut report = RunReport::default();
    let mut record = |description: String, outcome: CheckOutcome| {
        let result = CheckResult {
            service: None,
            description,
            outcome,
        };
        console.check(&result);
        report.push(result);
    };

    // An unusable config ends preflight here: nothing else can be checked.
    let settings = load_settings(global)?;
    record("configuration is valid".into(), CheckOutcome::Pass);

    if global.no_runtime_check {
        record(
            "container runtime".into(),
            CheckOutcome::skip("--no-runtime-check"),
        );
    } else {
        record("container runtime".into(), container_runtime().await);
    }

    for (description, outcome) in filesystem_checks(&settings) {
        record(description, outcome);
    }

    console.tally(&report);
    console.json(&report)?;
    if report.failed > 0 {
        return Err(CliError::Preflight {
            failed: report.failed,
        });
    }
    Ok(exit_code::SUCCESS)
}

/// `docker info` answers within the timeout.
async fn container_runtime() -> CheckOutcome {
    let probe = Command::new("docker")
        .arg("info")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    match tokio::time::timeout(RUNTIME_TIMEOUT, probe).await {
        Ok(Ok(status)) => CheckOutcome::pass_if(status.success(), || {
            format!("`docker info` exited with {status}")
        }),
        Ok(Err(e)) => CheckOutcome::fail(format!("cannot run docker: {e}")),
        Err(_) => CheckOutcome::fail(format!(
            "`docker info` did not answer within {}s",
            RUNTIME_TIMEOUT.as_secs()
        )),
    }
}

fn filesystem_checks(settings: &StackSettings) -> Vec<(String, CheckOutcome)> {
    let mut checks = vec![(
        format!("config root {}", settings.config_root.display()),
        directory(&settings.config_root),
    )];

    let paths = &settings.paths;
    for (label, value) in [
        ("downloads", &paths.downloads),
        ("tv", &paths.tv),
        ("movies", &paths.movies),
        ("music", &paths.music),
    ] {
        checks.push((format!("{label} path {value}"), directory(Path::new(value))));
    }

    if let Some(dir) = &settings.templates_dir {
        checks.push((format!("templates {}", dir.display()), directory(dir)));
    }
    checks
}

fn directory(path: &Path) -> CheckOutcome {
    if !path.is_absolute() {
        return CheckOutcome::fail("not an absolute path");
    }
    match std::fs::read_dir(path) {
        Ok(_) => CheckOutcome::Pass,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckOutcome::fail("does not exist"),
        Err(e) => CheckOutcome::fail(format!("not readable: {e}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_fails_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(directory(dir.path()), CheckOutcome::Pass);
        assert_eq!(
            directory(&dir.path().join("absent")),
            CheckOutcome::fail("does not exist")
        );
        assert_eq!(
            directory(Path::new("relative/dir")),
            CheckOutcome::fail("not an absolute path")
        );
    }
}
