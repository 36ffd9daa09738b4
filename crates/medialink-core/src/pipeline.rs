// ── Pipeline ──
//
// Setup: wait → resolve → configure → re-resolve → render.
// Verify: run the suite. Each stage reports through an `Observer` so the
// CLI can print progress as it happens.

use serde::Serialize;
use strum::Display;
use tracing::info;

use crate::action::ActionRecord;
use crate::configurator::configure_all;
use crate::context::RunContext;
use crate::credentials::{CredentialSummary, resolve_all};
use crate::integration::{ServiceIntegration, integrations};
use crate::readiness::{Readiness, wait_all};
use crate::registry::ServiceName;
use crate::render::{RenderedArtifact, render_all};
use crate::verify::{CheckResult, RunReport, VerificationSuite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Readiness,
    Credentials,
    Configure,
    Render,
    Verify,
}

/// Progress emitted while the pipeline runs.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    StageStarted(Stage),
    Readiness {
        service: ServiceName,
        readiness: Readiness,
    },
    Credentials(&'a CredentialSummary),
    Action(&'a ActionRecord),
    Rendered(&'a RenderedArtifact),
    Check(&'a CheckResult),
}

pub trait Observer {
    fn on_event(&mut self, event: &PipelineEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&mut self, _event: &PipelineEvent<'_>) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceReadiness {
    pub service: ServiceName,
    #[serde(flatten)]
    pub readiness: Readiness,
}

/// Everything the setup half did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetupReport {
    pub readiness: Vec<ServiceReadiness>,
    pub credentials: CredentialSummary,
    pub actions: Vec<ActionRecord>,
    pub rendered: Vec<RenderedArtifact>,
}

impl SetupReport {
    pub fn failed_actions(&self) -> usize {
        self.actions.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn mutations(&self) -> usize {
        self.actions.iter().filter(|r| r.outcome.is_mutation()).count()
    }
}

pub struct Pipeline {
    ctx: RunContext,
    integrations: Vec<Box<dyn ServiceIntegration>>,
}

impl Pipeline {
    pub fn new(ctx: RunContext) -> Self {
        Self::with_integrations(ctx, integrations())
    }

    pub fn with_integrations(ctx: RunContext, integrations: Vec<Box<dyn ServiceIntegration>>) -> Self {
        Self { ctx, integrations }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub async fn setup(&self, observer: &mut dyn Observer) -> SetupReport {
        let ctx = &self.ctx;
        let mut report = SetupReport::default();

        observer.on_event(&PipelineEvent::StageStarted(Stage::Readiness));
        info!("waiting for services");
        report.readiness = wait_all(ctx, |service, readiness| {
            observer.on_event(&PipelineEvent::Readiness { service, readiness });
        })
        .await
        .into_iter()
        .map(|(service, readiness)| ServiceReadiness { service, readiness })
        .collect();

        observer.on_event(&PipelineEvent::StageStarted(Stage::Credentials));
        let summary = resolve_all(ctx.registry(), ctx.settings(), ctx.credentials());
        info!(found = summary.found.len(), missing = summary.missing.len(), "credentials resolved");
        observer.on_event(&PipelineEvent::Credentials(&summary));

        observer.on_event(&PipelineEvent::StageStarted(Stage::Configure));
        report.actions = configure_all(ctx, &self.integrations, &mut |record| {
            observer.on_event(&PipelineEvent::Action(record));
        })
        .await;

        // Bootstrap may have generated keys (Jellyfin, first-start *arr).
        report.credentials = resolve_all(ctx.registry(), ctx.settings(), ctx.credentials());
        if report.credentials.missing != summary.missing {
            observer.on_event(&PipelineEvent::Credentials(&report.credentials));
        }

        observer.on_event(&PipelineEvent::StageStarted(Stage::Render));
        report.rendered = render_all(ctx, &mut |artifact| {
            observer.on_event(&PipelineEvent::Rendered(artifact));
        });

        info!(
            actions = report.actions.len(),
            mutations = report.mutations(),
            failed = report.failed_actions(),
            "setup finished"
        );
        report
    }

    pub async fn verify(&self, only: Option<ServiceName>, observer: &mut dyn Observer) -> RunReport {
        let ctx = &self.ctx;

        // A standalone `test` run has not resolved anything yet.
        if ctx.credentials().is_empty() {
            resolve_all(ctx.registry(), ctx.settings(), ctx.credentials());
        }

        observer.on_event(&PipelineEvent::StageStarted(Stage::Verify));
        let suite = VerificationSuite::build(ctx, &self.integrations, only);
        info!(checks = suite.len(), "running verification");
        let report = suite
            .run(ctx, &mut |result| {
                observer.on_event(&PipelineEvent::Check(result));
            })
            .await;
        info!(
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            "verification finished"
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::readiness::WaitPolicy;
    use crate::settings::{AdminAccount, StackSettings};

    #[derive(Default)]
    struct Recorder {
        stages: Vec<Stage>,
        rendered: usize,
    }

    impl Observer for Recorder {
        fn on_event(&mut self, event: &PipelineEvent<'_>) {
            match event {
                PipelineEvent::StageStarted(stage) => self.stages.push(*stage),
                PipelineEvent::Rendered(_) => self.rendered += 1,
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn setup_with_every_service_disabled_only_renders() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = StackSettings::new(
            dir.path().join("config"),
            AdminAccount {
                username: "admin".into(),
                password: SecretString::from("pw"),
                email: String::new(),
            },
        );
        settings.readiness = WaitPolicy {
            max_attempts: 1,
            interval: Duration::from_millis(1),
            connect_timeout: Duration::from_millis(50),
        };
        for service in ServiceName::all() {
            settings.services.entry(service).or_default().enabled = false;
        }

        let pipeline = Pipeline::new(RunContext::new(settings).unwrap());
        let mut recorder = Recorder::default();
        let report = pipeline.setup(&mut recorder).await;

        assert!(report.readiness.is_empty());
        assert!(report.actions.is_empty());
        assert_eq!(report.rendered.len(), 4);
        assert_eq!(recorder.rendered, 4);
        assert_eq!(
            recorder.stages,
            vec![Stage::Readiness, Stage::Credentials, Stage::Configure, Stage::Render]
        );
        assert!(dir.path().join(".env").is_file());
    }
}
