// ── Verification suite ──
//
// Read-only checks run after setup (or on their own with `test`). Every
// check yields pass, fail or skip; a probe that errors counts as a fail.
// Checks for disabled services or unknown credentials skip.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::registry::ServiceName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass,
    Fail { reason: String },
    Skip { reason: String },
}

impl CheckOutcome {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }

    /// `Pass` when `ok`, otherwise `Fail` with the lazily built reason.
    pub fn pass_if(ok: bool, reason: impl FnOnce() -> String) -> Self {
        if ok { Self::Pass } else { Self::Fail { reason: reason() } }
    }
}

#[async_trait]
pub trait VerificationCheck: Send + Sync {
    /// The service this check is about; `None` for stack-wide checks.
    fn service(&self) -> Option<ServiceName>;

    fn description(&self) -> String;

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub service: Option<ServiceName>,
    pub description: String,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

/// Aggregated verification results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<CheckResult>,
}

impl RunReport {
    pub fn push(&mut self, result: CheckResult) {
        match result.outcome {
            CheckOutcome::Pass => self.passed += 1,
            CheckOutcome::Fail { .. } => self.failed += 1,
            CheckOutcome::Skip { .. } => self.skipped += 1,
        }
        self.results.push(result);
    }

    /// Failed-check count, clamped so 256 failures never exit 0.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.failed).unwrap_or(u8::MAX)
    }
}

// ── Built-in checks ─────────────────────────────────────────────────

/// The service's health endpoint answers; one retry after a backoff.
pub struct ReachabilityCheck {
    service: ServiceName,
    backoff: Duration,
}

impl ReachabilityCheck {
    pub fn new(service: ServiceName, backoff: Duration) -> Self {
        Self { service, backoff }
    }

    async fn attempt(&self, ctx: &RunContext) -> Result<(), String> {
        let url = ctx
            .descriptor(self.service)
            .health_url()
            .map_err(|e| e.to_string())?;
        ctx.http()
            .get(url)
            .timeout(ctx.settings().readiness.connect_timeout.max(Duration::from_secs(5)))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl VerificationCheck for ReachabilityCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(self.service)
    }

    fn description(&self) -> String {
        format!("{} reachable", self.service.display_name())
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if self.attempt(ctx).await.is_ok() {
            return Ok(CheckOutcome::Pass);
        }
        debug!(service = %self.service, backoff = ?self.backoff, "retrying reachability");
        tokio::time::sleep(self.backoff).await;
        Ok(match self.attempt(ctx).await {
            Ok(()) => CheckOutcome::Pass,
            Err(reason) => CheckOutcome::Fail { reason },
        })
    }
}

/// A rendered artifact exists on disk.
pub struct ArtifactCheck {
    label: String,
    path: PathBuf,
}

impl ArtifactCheck {
    pub fn new(label: impl Into<String>, path: PathBuf) -> Self {
        Self {
            label: label.into(),
            path,
        }
    }
}

#[async_trait]
impl VerificationCheck for ArtifactCheck {
    fn service(&self) -> Option<ServiceName> {
        None
    }

    fn description(&self) -> String {
        format!("{} rendered", self.label)
    }

    async fn probe(&self, _ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        Ok(CheckOutcome::pass_if(self.path.is_file(), || {
            format!("{} does not exist", self.path.display())
        }))
    }
}

// ── Suite ───────────────────────────────────────────────────────────

/// Ordered list of checks for one verification pass.
pub struct VerificationSuite {
    checks: Vec<Box<dyn VerificationCheck>>,
}

impl VerificationSuite {
    /// Reachability for every service, then each integration's checks,
    /// then one check per rendered artifact. `only` limits the suite to one
    /// service and drops the artifact checks.
    pub fn build(
        ctx: &RunContext,
        integrations: &[Box<dyn ServiceIntegration>],
        only: Option<ServiceName>,
    ) -> Self {
        let wanted = |s: ServiceName| only.is_none_or(|o| o == s);
        let backoff = ctx.settings().verify_backoff;
        let mut checks: Vec<Box<dyn VerificationCheck>> = Vec::new();

        for service in ServiceName::all().filter(|s| wanted(*s)) {
            checks.push(Box::new(ReachabilityCheck::new(service, backoff)));
        }
        for integration in integrations.iter().filter(|i| wanted(i.service())) {
            checks.extend(integration.verification_checks(ctx));
        }
        if only.is_none() {
            for artifact in crate::render::artifacts(ctx.settings()) {
                checks.push(Box::new(ArtifactCheck::new(
                    artifact.kind.label(),
                    artifact.destination,
                )));
            }
        }

        Self { checks }
    }

    pub fn from_checks(checks: Vec<Box<dyn VerificationCheck>>) -> Self {
        Self { checks }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub async fn run(
        &self,
        ctx: &RunContext,
        on_result: &mut dyn FnMut(&CheckResult),
    ) -> RunReport {
        let mut report = RunReport::default();

        for check in &self.checks {
            let service = check.service();
            let outcome = match service {
                Some(s) if !ctx.is_enabled(s) => CheckOutcome::skip(format!("{s} is disabled")),
                _ => match check.probe(ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => CheckOutcome::fail(e.to_string()),
                },
            };
            if let CheckOutcome::Fail { reason } = &outcome {
                warn!(check = %check.description(), %reason, "check failed");
            }
            let result = CheckResult {
                service,
                description: check.description(),
                outcome,
            };
            on_result(&result);
            report.push(result);
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn result(outcome: CheckOutcome) -> CheckResult {
        CheckResult {
            service: None,
            description: "x".into(),
            outcome,
        }
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = RunReport::default();
        report.push(result(CheckOutcome::Pass));
        report.push(result(CheckOutcome::fail("down")));
        report.push(result(CheckOutcome::skip("no key")));
        report.push(result(CheckOutcome::Pass));

        assert_eq!((report.passed, report.failed, report.skipped), (2, 1, 1));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn exit_code_never_wraps() {
        let mut report = RunReport::default();
        for _ in 0..256 {
            report.push(result(CheckOutcome::fail("x")));
        }
        assert_eq!(report.exit_code(), 255);
    }

    #[test]
    fn report_serializes_flat_outcomes() {
        let mut report = RunReport::default();
        report.push(CheckResult {
            service: Some(ServiceName::Sonarr),
            description: "Sonarr reachable".into(),
            outcome: CheckOutcome::fail("connection refused"),
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["results"][0]["service"], "sonarr");
        assert_eq!(json["results"][0]["status"], "fail");
        assert_eq!(json["results"][0]["reason"], "connection refused");
    }
}
