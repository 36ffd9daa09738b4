// ── Configuration actions ──
//
// One idempotent unit of configuration against one service. `check`
// compares current state to desired state without mutating anything;
// `apply` converges it. The configurator only calls `apply` after a
// `Diverged` check.

use async_trait::async_trait;
use serde::Serialize;

use crate::context::RunContext;
use crate::error::CoreError;
use crate::links::DesiredLink;
use crate::registry::ServiceName;

/// Result of comparing current to desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    Satisfied,
    Diverged { reason: String },
}

impl Convergence {
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// `Satisfied` when `ok`, otherwise `Diverged` with the lazily built reason.
    pub fn when(ok: bool, reason: impl FnOnce() -> String) -> Self {
        if ok {
            Self::Satisfied
        } else {
            Self::Diverged { reason: reason() }
        }
    }
}

#[async_trait]
pub trait ConfigurationAction: Send + Sync {
    /// The service this action mutates.
    fn target(&self) -> ServiceName;

    fn description(&self) -> String;

    /// The link this action maintains, if it maintains one.
    fn link(&self) -> Option<&DesiredLink> {
        None
    }

    /// A reason to skip this action outright (e.g. a credential from
    /// another service is unknown). Checked before `check`.
    fn skip_reason(&self, _ctx: &RunContext) -> Option<String> {
        None
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError>;

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError>;
}

/// What happened to one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    AlreadyConfigured,
    Applied,
    /// Applied, but the follow-up check still reports divergence or failed.
    AppliedUnverified { reason: String },
    Failed { error: String },
    Skipped { reason: String },
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Applied | Self::AppliedUnverified { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub service: ServiceName,
    pub description: String,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}
