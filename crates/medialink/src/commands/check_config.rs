use std::io::Write;

use serde::Serialize;

use medialink_config::ConfigError;
use medialink_core::render::{self, known_token, load_template, tokens};
use medialink_core::{ArtifactKind, StackSettings};

use crate::cli::{CheckConfigArgs, GlobalOpts};
use crate::commands::config_file;
use crate::error::{CliError, exit_code};
use crate::output::{Console, Mark};

#[derive(Serialize)]
struct Validity<'a> {
    path: String,
    valid: bool,
    problems: &'a [String],
}

/// Validate without contacting anything. Problems exit 1 via `InvalidConfig`.
pub fn handle(
    args: &CheckConfigArgs,
    global: &GlobalOpts,
    console: &Console,
) -> Result<i32, CliError> {
    let path = config_file(global);
    let config = medialink_config::load(&path)?;
    let problems = config.validate();

    console.json(&Validity {
        path: path.display().to_string(),
        valid: problems.is_empty(),
        problems: &problems,
    })?;

    if !problems.is_empty() {
        return Err(ConfigError::Invalid { problems }.into());
    }

    console.line(Mark::Ok, &format!("{} is valid", path.display()));
    let settings = config.to_settings()?;
    for (kind, token) in unknown_tokens(&settings)? {
        tracing::warn!(template = %kind, token = %token, "unknown token renders empty");
        console.line(
            Mark::Warn,
            &format!("{kind} template uses unknown token {{{{{token}}}}}"),
        );
    }

    if args.show && !console.is_json() {
        let text = config.to_redacted_toml()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout)?;
        write!(stdout, "{text}")?;
    }
    Ok(exit_code::SUCCESS)
}

/// Tokens in the effective templates (overrides included) that nothing binds.
fn unknown_tokens(settings: &StackSettings) -> Result<Vec<(ArtifactKind, String)>, CliError> {
    let mut unknown = Vec::new();
    for artifact in render::artifacts(settings) {
        let template = load_template(artifact.kind, settings)?;
        for token in tokens(&template) {
            if !known_token(&token) {
                unknown.push((artifact.kind, token));
            }
        }
    }
    Ok(unknown)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use medialink_core::AdminAccount;

    use super::*;

    #[test]
    fn override_with_typo_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stack.env"), "KEY={{SONAR_API_KEY}}\n").unwrap();

        let mut settings = StackSettings::new(
            dir.path().join("config"),
            AdminAccount {
                username: "admin".into(),
                password: "pw".into(),
                email: String::new(),
            },
        );
        assert!(unknown_tokens(&settings).unwrap().is_empty());

        settings.templates_dir = Some(dir.path().to_path_buf());
        assert_eq!(
            unknown_tokens(&settings).unwrap(),
            vec![(ArtifactKind::ComposeEnv, "SONAR_API_KEY".to_owned())]
        );
    }
}
