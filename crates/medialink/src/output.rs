//! Console output: one status line per event, a tally table, or JSON.
//!
//! Text mode prints `✓` / `!` / `✗` / `-` prefixed lines as the pipeline
//! runs. JSON mode stays silent until the end and prints a single document.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use medialink_core::pipeline::ServiceReadiness;
use medialink_core::{
    ActionOutcome, ArtifactStatus, CheckOutcome, CheckResult, Observer, PipelineEvent, Readiness,
    RunReport, SetupReport,
};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Ok,
    Warn,
    Fail,
    Skip,
}

impl Mark {
    fn symbol(self) -> &'static str {
        match self {
            Self::Ok => "✓",
            Self::Warn => "!",
            Self::Fail => "✗",
            Self::Skip => "-",
        }
    }
}

pub struct Console {
    format: OutputFormat,
    color: bool,
}

impl Console {
    pub fn new(global: &GlobalOpts) -> Self {
        Self {
            format: global.output,
            color: should_color(global.color),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn paint(&self, mark: Mark) -> String {
        let symbol = mark.symbol();
        if !self.color {
            return symbol.to_owned();
        }
        match mark {
            Mark::Ok => symbol.green().to_string(),
            Mark::Warn => symbol.yellow().to_string(),
            Mark::Fail => symbol.red().to_string(),
            Mark::Skip => symbol.dimmed().to_string(),
        }
    }

    /// One status line (text mode only).
    pub fn line(&self, mark: Mark, text: &str) {
        if self.is_json() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "  {} {text}", self.paint(mark));
    }

    pub fn heading(&self, text: &str) {
        if self.is_json() {
            return;
        }
        let text = if self.color {
            text.bold().to_string()
        } else {
            text.to_owned()
        };
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }

    pub fn check(&self, result: &CheckResult) {
        let (mark, detail) = check_line(&result.outcome);
        self.line(mark, &format!("{}{detail}", result.description));
    }

    /// The final document; prints nothing in text mode.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), CliError> {
        if !self.is_json() {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(value)?;
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
        Ok(())
    }

    /// Pass / fail / skip tally for a verification run.
    pub fn tally(&self, report: &RunReport) {
        if self.is_json() {
            return;
        }
        let rows = [
            TallyRow::new("passed", report.passed),
            TallyRow::new("failed", report.failed),
            TallyRow::new("skipped", report.skipped),
        ];
        print_table(&rows);
    }

    /// Action counts by outcome for a setup run.
    pub fn setup_summary(&self, report: &SetupReport) {
        if self.is_json() {
            return;
        }
        let count = |f: fn(&ActionOutcome) -> bool| {
            report.actions.iter().filter(|r| f(&r.outcome)).count()
        };
        let rows = [
            TallyRow::new(
                "already configured",
                count(|o| matches!(o, ActionOutcome::AlreadyConfigured)),
            ),
            TallyRow::new("applied", count(ActionOutcome::is_mutation)),
            TallyRow::new("failed", count(ActionOutcome::is_failure)),
            TallyRow::new("skipped", count(|o| matches!(o, ActionOutcome::Skipped { .. }))),
        ];
        print_table(&rows);
    }

}

fn print_table(rows: &[TallyRow]) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout);
    let _ = writeln!(stdout, "{}", Table::new(rows).with(Style::rounded()));
}

#[derive(Tabled)]
struct TallyRow {
    #[tabled(rename = "Result")]
    label: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

impl TallyRow {
    fn new(label: &'static str, count: usize) -> Self {
        Self { label, count }
    }
}

fn check_line(outcome: &CheckOutcome) -> (Mark, String) {
    match outcome {
        CheckOutcome::Pass => (Mark::Ok, String::new()),
        CheckOutcome::Fail { reason } => (Mark::Fail, format!(": {reason}")),
        CheckOutcome::Skip { reason } => (Mark::Skip, format!(" ({reason})")),
    }
}

fn action_line(outcome: &ActionOutcome) -> (Mark, String) {
    match outcome {
        ActionOutcome::AlreadyConfigured => (Mark::Ok, " (already configured)".into()),
        ActionOutcome::Applied => (Mark::Ok, " (applied)".into()),
        ActionOutcome::AppliedUnverified { reason } => {
            (Mark::Warn, format!(" (applied, unverified: {reason})"))
        }
        ActionOutcome::Failed { error } => (Mark::Fail, format!(": {error}")),
        ActionOutcome::Skipped { reason } => (Mark::Skip, format!(" (skipped: {reason})")),
    }
}

fn readiness_line(r: &ServiceReadiness) -> (Mark, String) {
    match r.readiness {
        Readiness::Ready { attempts } => (
            Mark::Ok,
            format!("{} ready after {attempts} attempt(s)", r.service.display_name()),
        ),
        Readiness::TimedOut { attempts } => (
            Mark::Fail,
            format!(
                "{} not reachable after {attempts} attempt(s)",
                r.service.display_name()
            ),
        ),
    }
}

impl Observer for Console {
    fn on_event(&mut self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::StageStarted(stage) => self.heading(&format!("==> {stage}")),
            PipelineEvent::Readiness { service, readiness } => {
                let (mark, text) = readiness_line(&ServiceReadiness {
                    service: *service,
                    readiness: *readiness,
                });
                self.line(mark, &text);
            }
            PipelineEvent::Credentials(summary) => {
                for service in &summary.found {
                    self.line(Mark::Ok, &format!("{} credential found", service.display_name()));
                }
                for service in &summary.missing {
                    self.line(
                        Mark::Warn,
                        &format!("{} credential not found", service.display_name()),
                    );
                }
            }
            PipelineEvent::Action(record) => {
                let (mark, detail) = action_line(&record.outcome);
                self.line(
                    mark,
                    &format!("{}: {}{detail}", record.service.display_name(), record.description),
                );
            }
            PipelineEvent::Rendered(artifact) => {
                let path = artifact.destination.display();
                match &artifact.status {
                    ArtifactStatus::Written => self.line(Mark::Ok, &format!("wrote {path}")),
                    ArtifactStatus::Unchanged => {
                        self.line(Mark::Ok, &format!("{path} unchanged"));
                    }
                    ArtifactStatus::Failed { error } => {
                        self.line(Mark::Fail, &format!("{}: {error}", artifact.kind));
                    }
                }
            }
            PipelineEvent::Check(result) => self.check(result),
        }
    }
}
