// Prowlarr: forms auth, one application per *arr, declared indexers.

use async_trait::async_trait;
use medialink_api::arr::Provider;
use secrecy::ExposeSecret;

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::CredentialKind;
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::arr::{ApiKeyCheck, AuthAction};
use crate::integrations::{peer_unknown, value_str};
use crate::links::{DesiredLink, LinkKind};
use crate::registry::ServiceName;
use crate::settings::IndexerSpec;
use crate::verify::{CheckOutcome, VerificationCheck};

pub struct ProwlarrIntegration;

impl ServiceIntegration for ProwlarrIntegration {
    fn service(&self) -> ServiceName {
        ServiceName::Prowlarr
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        Some(CredentialKind::ApiKey)
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        let mut actions: Vec<Box<dyn ConfigurationAction>> = vec![Box::new(AuthAction {
            service: ServiceName::Prowlarr,
        })];
        for link in ctx.links_from(ServiceName::Prowlarr, LinkKind::Application) {
            actions.push(Box::new(ApplicationAction { link: link.clone() }));
        }
        for indexer in &ctx.settings().indexers {
            actions.push(Box::new(IndexerAction {
                spec: indexer.clone(),
            }));
        }
        Ok(actions)
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        let mut checks: Vec<Box<dyn VerificationCheck>> = vec![Box::new(ApiKeyCheck {
            service: ServiceName::Prowlarr,
        })];
        for link in ctx.links_from(ServiceName::Prowlarr, LinkKind::Application) {
            checks.push(Box::new(ApplicationCheck { app: link.to }));
        }
        if !ctx.settings().indexers.is_empty() {
            checks.push(Box::new(IndexersCheck {
                expected: ctx
                    .settings()
                    .indexers
                    .iter()
                    .map(|i| i.definition.clone())
                    .collect(),
            }));
        }
        checks
    }
}

fn matches_definition(indexer: &Provider, definition: &str) -> bool {
    indexer
        .definition_name()
        .is_some_and(|d| d.eq_ignore_ascii_case(definition))
}

// ── Applications ────────────────────────────────────────────────────

/// Prowlarr pushes its indexers into the linked *arr with full sync.
struct ApplicationAction {
    link: DesiredLink,
}

impl ApplicationAction {
    fn desired(&self, ctx: &RunContext) -> Result<Provider, CoreError> {
        let app = self.link.to;
        let key = ctx.require_api_key(app)?;
        let name = app.display_name();

        Ok(Provider::new(name, name, format!("{name}Settings"))
            .with_attr("syncLevel", "fullSync")
            .with_field("prowlarrUrl", ctx.descriptor(ServiceName::Prowlarr).internal_base())
            .with_field("baseUrl", ctx.descriptor(app).internal_base())
            .with_field("apiKey", key.expose_secret()))
    }
}

#[async_trait]
impl ConfigurationAction for ApplicationAction {
    fn target(&self) -> ServiceName {
        ServiceName::Prowlarr
    }

    fn description(&self) -> String {
        format!("application {}", self.link.to.display_name())
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        ctx.api_key(self.link.to)
            .is_none()
            .then(|| format!("{} API key unknown", self.link.to))
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let desired = self.desired(ctx)?;
        let apps = ctx.arr_client(ServiceName::Prowlarr)?.applications().await?;
        let Some(current) = apps
            .iter()
            .find(|a| a.implementation == desired.implementation)
        else {
            return Ok(Convergence::diverged("missing"));
        };

        let drifted: Vec<_> = ["prowlarrUrl", "baseUrl"]
            .into_iter()
            .filter(|f| value_str(current.field(f)) != value_str(desired.field(f)))
            .collect();
        Ok(Convergence::when(drifted.is_empty(), || {
            format!("drifted: {}", drifted.join(", "))
        }))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let desired = self.desired(ctx)?;
        let client = ctx.arr_client(ServiceName::Prowlarr)?;
        let existing = client
            .applications()
            .await?
            .into_iter()
            .find(|a| a.implementation == desired.implementation);

        match existing {
            Some(mut current) => {
                for field in &desired.fields {
                    current.set_field(&field.name, field.value.clone());
                }
                current
                    .extra
                    .insert("syncLevel".into(), "fullSync".into());
                client.update_application(&current).await?;
            }
            None => {
                client.add_application(&desired).await?;
            }
        }
        Ok(())
    }
}

// ── Indexers ────────────────────────────────────────────────────────

/// A declared indexer, created from the schema entry with the same
/// definition name. Existing indexers are never modified.
struct IndexerAction {
    spec: IndexerSpec,
}

#[async_trait]
impl ConfigurationAction for IndexerAction {
    fn target(&self) -> ServiceName {
        ServiceName::Prowlarr
    }

    fn description(&self) -> String {
        format!("indexer '{}'", self.spec.definition)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let indexers = ctx.arr_client(ServiceName::Prowlarr)?.indexers().await?;
        Ok(Convergence::when(
            indexers
                .iter()
                .any(|i| matches_definition(i, &self.spec.definition)),
            || "missing".into(),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = ctx.arr_client(ServiceName::Prowlarr)?;
        let mut indexer = client
            .indexer_schema()
            .await?
            .into_iter()
            .find(|s| matches_definition(s, &self.spec.definition))
            .ok_or_else(|| {
                CoreError::action(format!(
                    "no indexer definition named '{}'",
                    self.spec.definition
                ))
            })?;

        indexer.id = None;
        if let Some(name) = &self.spec.name {
            indexer.name.clone_from(name);
        }
        indexer.extra.insert("enable".into(), true.into());
        indexer.extra.insert("appProfileId".into(), 1.into());
        for (name, value) in &self.spec.fields {
            indexer.set_field(name, value.clone());
        }

        client.add_indexer(&indexer).await?;
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

struct ApplicationCheck {
    app: ServiceName,
}

#[async_trait]
impl VerificationCheck for ApplicationCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Prowlarr)
    }

    fn description(&self) -> String {
        format!("Prowlarr syncs to {}", self.app.display_name())
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Prowlarr).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        if let Some(reason) = peer_unknown(ctx, self.app) {
            return Ok(CheckOutcome::skip(reason));
        }
        let apps = ctx.arr_client(ServiceName::Prowlarr)?.applications().await?;
        Ok(CheckOutcome::pass_if(
            apps.iter()
                .any(|a| a.implementation == self.app.display_name()),
            || "not registered".into(),
        ))
    }
}

struct IndexersCheck {
    expected: Vec<String>,
}

#[async_trait]
impl VerificationCheck for IndexersCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Prowlarr)
    }

    fn description(&self) -> String {
        "Prowlarr indexers present".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Prowlarr).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        let indexers = ctx.arr_client(ServiceName::Prowlarr)?.indexers().await?;
        let missing: Vec<_> = self
            .expected
            .iter()
            .filter(|d| !indexers.iter().any(|i| matches_definition(i, d)))
            .map(String::as_str)
            .collect();
        Ok(CheckOutcome::pass_if(missing.is_empty(), || {
            format!("missing: {}", missing.join(", "))
        }))
    }
}
