// Bazarr: point subtitle search at Sonarr and Radarr.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::CredentialKind;
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::{peer_unknown, value_str};
use crate::links::{DesiredLink, LinkKind};
use crate::registry::ServiceName;
use crate::verify::{CheckOutcome, VerificationCheck};

pub struct BazarrIntegration;

impl ServiceIntegration for BazarrIntegration {
    fn service(&self) -> ServiceName {
        ServiceName::Bazarr
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        Some(CredentialKind::ApiKey)
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        Ok(ctx
            .links_from(ServiceName::Bazarr, LinkKind::Subtitles)
            .map(|link| Box::new(SubtitlesAction { link: link.clone() }) as Box<dyn ConfigurationAction>)
            .collect())
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        let mut checks: Vec<Box<dyn VerificationCheck>> = vec![Box::new(StatusCheck)];
        for link in ctx.links_from(ServiceName::Bazarr, LinkKind::Subtitles) {
            checks.push(Box::new(LinkedCheck { app: link.to }));
        }
        checks
    }
}

/// Settings section Bazarr uses for `app` (`sonarr` or `radarr`).
fn section(app: ServiceName) -> &'static str {
    match app {
        ServiceName::Radarr => "radarr",
        _ => "sonarr",
    }
}

/// Whether Bazarr's settings point at `app` with the given key.
fn is_linked(settings: &Value, app: ServiceName, host: &str, port: u16, key: &str) -> bool {
    let name = section(app);
    let enabled = settings
        .pointer(&format!("/general/use_{name}"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let Some(sect) = settings.get(name) else {
        return false;
    };

    enabled
        && value_str(sect.get("ip")).as_deref() == Some(host)
        && value_str(sect.get("port")) == Some(port.to_string())
        && value_str(sect.get("apikey")).as_deref() == Some(key)
}

struct SubtitlesAction {
    link: DesiredLink,
}

impl SubtitlesAction {
    fn target_key(&self, ctx: &RunContext) -> Result<String, CoreError> {
        Ok(ctx.require_api_key(self.link.to)?.expose_secret().to_owned())
    }
}

#[async_trait]
impl ConfigurationAction for SubtitlesAction {
    fn target(&self) -> ServiceName {
        ServiceName::Bazarr
    }

    fn description(&self) -> String {
        format!("{} connection", self.link.to.display_name())
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
        let app = ctx.descriptor(self.link.to);
        let key = self.target_key(ctx)?;
        let settings = ctx.bazarr_client()?.settings().await?;
        Ok(Convergence::when(
            is_linked(&settings, self.link.to, app.internal_host(), app.internal_port(), &key),
            || "not linked".into(),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let app = ctx.descriptor(self.link.to);
        let name = section(self.link.to);
        let key = self.target_key(ctx)?;

        let fields = vec![
            (format!("settings-general-use_{name}"), "true".to_owned()),
            (format!("settings-{name}-ip"), app.internal_host().to_owned()),
            (format!("settings-{name}-port"), app.internal_port().to_string()),
            (format!("settings-{name}-apikey"), key),
            (format!("settings-{name}-base_url"), String::new()),
            (format!("settings-{name}-ssl"), "false".to_owned()),
        ];
        ctx.bazarr_client()?.update_settings(&fields).await?;
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

struct StatusCheck;

#[async_trait]
impl VerificationCheck for StatusCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Bazarr)
    }

    fn description(&self) -> String {
        "Bazarr accepts API key".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Bazarr).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        ctx.bazarr_client()?.status().await?;
        Ok(CheckOutcome::Pass)
    }
}

struct LinkedCheck {
    app: ServiceName,
}

#[async_trait]
impl VerificationCheck for LinkedCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Bazarr)
    }

    fn description(&self) -> String {
        format!("Bazarr linked to {}", self.app.display_name())
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Bazarr).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        if let Some(reason) = peer_unknown(ctx, self.app) {
            return Ok(CheckOutcome::skip(reason));
        }
        let app = ctx.descriptor(self.app);
        let key = ctx.require_api_key(self.app)?;
        let settings = ctx.bazarr_client()?.settings().await?;
        Ok(CheckOutcome::pass_if(
            is_linked(
                &settings,
                self.app,
                app.internal_host(),
                app.internal_port(),
                key.expose_secret(),
            ),
            || "not linked".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn linked_requires_every_field() {
        let settings = json!({
            "general": { "use_sonarr": true, "use_radarr": false },
            "sonarr": { "ip": "sonarr", "port": 8989, "apikey": "k" },
            "radarr": { "ip": "radarr", "port": 7878, "apikey": "k" }
        });
        assert!(is_linked(&settings, ServiceName::Sonarr, "sonarr", 8989, "k"));
        assert!(!is_linked(&settings, ServiceName::Sonarr, "sonarr", 8989, "other"));
        assert!(!is_linked(&settings, ServiceName::Radarr, "radarr", 7878, "k"));
    }
}
