// ── Idempotent configurator ──
//
// Drives every integration's actions in dependency order. Each action is
// checked, applied only when diverged, then re-checked. Failures are
// recorded and logged; the run always continues to the next action.

use tracing::{info, warn};

use crate::action::{ActionOutcome, ActionRecord, ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::integration::ServiceIntegration;

/// Run one action through check → apply → re-check.
pub async fn run_action(ctx: &RunContext, action: &dyn ConfigurationAction) -> ActionOutcome {
    let service = action.target();
    let description = action.description();

    if let Some(reason) = action.skip_reason(ctx) {
        warn!(%service, action = %description, %reason, "skipping action");
        return ActionOutcome::Skipped { reason };
    }

    let reason = match action.check(ctx).await {
        Ok(Convergence::Satisfied) => {
            info!(%service, action = %description, "already configured");
            return ActionOutcome::AlreadyConfigured;
        }
        Ok(Convergence::Diverged { reason }) => reason,
        Err(e) => {
            warn!(%service, action = %description, error = %e, "check failed");
            return ActionOutcome::Failed {
                error: e.to_string(),
            };
        }
    };

    info!(%service, action = %description, %reason, "applying");
    if let Err(e) = action.apply(ctx).await {
        warn!(%service, action = %description, error = %e, "apply failed");
        return ActionOutcome::Failed {
            error: e.to_string(),
        };
    }

    match action.check(ctx).await {
        Ok(Convergence::Satisfied) => ActionOutcome::Applied,
        Ok(Convergence::Diverged { reason }) => {
            warn!(%service, action = %description, %reason, "still diverged after apply");
            ActionOutcome::AppliedUnverified { reason }
        }
        Err(e) => ActionOutcome::AppliedUnverified {
            reason: format!("re-check failed: {e}"),
        },
    }
}

/// Configure one integration. Disabled services produce no records;
/// unready services or a missing credential skip every action.
pub async fn configure_integration(
    ctx: &RunContext,
    integration: &dyn ServiceIntegration,
    on_record: &mut dyn FnMut(&ActionRecord),
) -> Vec<ActionRecord> {
    let service = integration.service();
    if !ctx.is_enabled(service) {
        return Vec::new();
    }

    let skip_all = if ctx.is_ready(service) {
        integration
            .required_credential()
            .filter(|kind| !ctx.credentials().contains(service, *kind))
            .map(|kind| format!("no {kind} for {service}"))
    } else {
        Some(format!("{service} is not ready"))
    };

    let actions = match integration.configuration_actions(ctx) {
        Ok(actions) => actions,
        Err(e) => {
            // Client construction fails when the skipped-for credential is absent.
            let outcome = if let Some(reason) = &skip_all {
                ActionOutcome::Skipped {
                    reason: reason.clone(),
                }
            } else {
                warn!(%service, error = %e, "cannot prepare actions");
                ActionOutcome::Failed {
                    error: e.to_string(),
                }
            };
            let record = ActionRecord {
                service,
                description: format!("configure {service}"),
                outcome,
            };
            on_record(&record);
            return vec![record];
        }
    };

    let mut records = Vec::with_capacity(actions.len());
    for action in actions {
        let outcome = match &skip_all {
            Some(reason) => {
                warn!(%service, action = %action.description(), %reason, "skipping action");
                ActionOutcome::Skipped {
                    reason: reason.clone(),
                }
            }
            None => run_action(ctx, action.as_ref()).await,
        };
        let record = ActionRecord {
            service,
            description: action.description(),
            outcome,
        };
        on_record(&record);
        records.push(record);
    }
    records
}

/// Configure every integration in order.
pub async fn configure_all(
    ctx: &RunContext,
    integrations: &[Box<dyn ServiceIntegration>],
    on_record: &mut dyn FnMut(&ActionRecord),
) -> Vec<ActionRecord> {
    let mut records = Vec::new();
    for integration in integrations {
        records.extend(configure_integration(ctx, integration.as_ref(), on_record).await);
    }
    records
}
