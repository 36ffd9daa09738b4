//! CLI error types with miette diagnostics.
//!
//! Everything here is a precondition failure: the run stops before (or
//! instead of) touching any service. Action and check failures never reach
//! this type; they are counted into the exit code instead.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use medialink_config::ConfigError;
use medialink_core::CoreError;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Bad configuration or a missing local prerequisite.
    pub const PRECONDITION: i32 = 1;
    /// Local IO outside the engine (backup, restore, report output).
    pub const IO: i32 = 1;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found: {}", .path.display())]
    #[diagnostic(
        code(medialink::no_config),
        help(
            "Pass --config PATH or set MEDIALINK_CONFIG.\n\
             Default location: {default}"
        )
    )]
    NoConfig { path: PathBuf, default: String },

    #[error("Configuration has {count} problem(s)")]
    #[diagnostic(code(medialink::invalid_config), help("{details}"))]
    InvalidConfig { count: usize, details: String },

    #[error(transparent)]
    #[diagnostic(code(medialink::config))]
    Config(ConfigError),

    // ── Engine ───────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(medialink::engine),
        help("Check the service URLs in the configuration file.")
    )]
    Core(#[from] CoreError),

    // ── Preflight ────────────────────────────────────────────────────

    #[error("{failed} preflight check(s) failed")]
    #[diagnostic(
        code(medialink::preflight),
        help("Fix the items marked ✗ above, then run `medialink preflight` again.")
    )]
    Preflight { failed: usize },

    // ── Backup / restore ─────────────────────────────────────────────

    #[error("Refusing to restore into non-empty {}", .path.display())]
    #[diagnostic(
        code(medialink::restore_target),
        help("Pass --force to unpack over the existing files.")
    )]
    RestoreTarget { path: PathBuf },

    #[error("Archive failed for {}: {source}", .path.display())]
    #[diagnostic(code(medialink::archive))]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot serialize report: {0}")]
    #[diagnostic(code(medialink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Archive { .. } | Self::Io(_) | Self::Json(_) => exit_code::IO,
            _ => exit_code::PRECONDITION,
        }
    }

    pub fn archive(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Archive { path, source }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path,
                default: medialink_config::config_path().display().to_string(),
            },
            ConfigError::Invalid { problems } => Self::InvalidConfig {
                count: problems.len(),
                details: problems
                    .iter()
                    .map(|p| format!("• {p}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_lists_every_problem() {
        let err = CliError::from(ConfigError::Invalid {
            problems: vec!["config_root: required".into(), "paths.tv: bad".into()],
        });
        match err {
            CliError::InvalidConfig { count, details } => {
                assert_eq!(count, 2);
                assert_eq!(details, "• config_root: required\n• paths.tv: bad");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn preflight_failure_exits_one() {
        let err = CliError::Preflight { failed: 3 };
        assert_eq!(err.exit_code(), 1);
    }
}
