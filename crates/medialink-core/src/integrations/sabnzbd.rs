// SABnzbd: host whitelist, one category per *arr, optional news server.

use async_trait::async_trait;
use medialink_api::sabnzbd::{NewsServer, list_value};
use serde_json::Value;

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::CredentialKind;
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::value_str;
use crate::links::{DesiredLink, LinkKind};
use crate::registry::ServiceName;
use crate::settings::UsenetProvider;
use crate::verify::{CheckOutcome, VerificationCheck};

pub struct SabnzbdIntegration;

impl ServiceIntegration for SabnzbdIntegration {
    fn service(&self) -> ServiceName {
        ServiceName::Sabnzbd
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        Some(CredentialKind::ApiKey)
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        let host = ctx.descriptor(ServiceName::Sabnzbd).internal_host().to_owned();
        let mut actions: Vec<Box<dyn ConfigurationAction>> = vec![Box::new(WhitelistAction { host })];

        for link in downloader_links(ctx) {
            if let Some(category) = link.field("category") {
                actions.push(Box::new(CategoryAction {
                    link: link.clone(),
                    name: category.to_owned(),
                }));
            }
        }

        if let Some(provider) = &ctx.settings().usenet {
            actions.push(Box::new(ServerAction {
                provider: provider.clone(),
            }));
        }

        Ok(actions)
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        let expected = downloader_links(ctx)
            .filter_map(|l| l.field("category").map(str::to_owned))
            .collect();
        vec![Box::new(ApiKeyCheck), Box::new(CategoriesCheck { expected })]
    }
}

fn downloader_links(ctx: &RunContext) -> impl Iterator<Item = &DesiredLink> {
    ctx.links()
        .iter()
        .filter(|l| l.kind == LinkKind::DownloadClient && l.to == ServiceName::Sabnzbd)
}

fn category_names(section: &Value) -> Vec<String> {
    section
        .as_array()
        .map(|cats| {
            cats.iter()
                .filter_map(|c| c.get("name").and_then(Value::as_str).map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

// ── Actions ─────────────────────────────────────────────────────────

/// SABnzbd refuses requests whose Host header is not whitelisted, so the
/// name other containers use must be added. Existing entries are kept.
struct WhitelistAction {
    host: String,
}

impl WhitelistAction {
    async fn current(&self, ctx: &RunContext) -> Result<Vec<String>, CoreError> {
        let misc = ctx.sabnzbd_client()?.config_section("misc").await?;
        Ok(misc.get("host_whitelist").map(list_value).unwrap_or_default())
    }
}

#[async_trait]
impl ConfigurationAction for WhitelistAction {
    fn target(&self) -> ServiceName {
        ServiceName::Sabnzbd
    }

    fn description(&self) -> String {
        format!("host whitelist includes '{}'", self.host)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let entries = self.current(ctx).await?;
        Ok(Convergence::when(
            entries.iter().any(|e| e.eq_ignore_ascii_case(&self.host)),
            || format!("whitelist is [{}]", entries.join(", ")),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let mut entries = self.current(ctx).await?;
        entries.push(self.host.clone());
        ctx.sabnzbd_client()?
            .set_keyword("misc", "host_whitelist", &entries.join(", "))
            .await?;
        Ok(())
    }
}

struct CategoryAction {
    link: DesiredLink,
    name: String,
}

#[async_trait]
impl ConfigurationAction for CategoryAction {
    fn target(&self) -> ServiceName {
        ServiceName::Sabnzbd
    }

    fn description(&self) -> String {
        format!("category '{}'", self.name)
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let section = ctx.sabnzbd_client()?.config_section("categories").await?;
        Ok(Convergence::when(
            category_names(&section).contains(&self.name),
            || "missing".into(),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        ctx.sabnzbd_client()?
            .set_category(&self.name, &self.name)
            .await?;
        Ok(())
    }
}

/// The declared usenet provider, matched by host.
struct ServerAction {
    provider: UsenetProvider,
}

#[async_trait]
impl ConfigurationAction for ServerAction {
    fn target(&self) -> ServiceName {
        ServiceName::Sabnzbd
    }

    fn description(&self) -> String {
        format!("news server {}", self.provider.host)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let section = ctx.sabnzbd_client()?.config_section("servers").await?;
        let servers = section.as_array().cloned().unwrap_or_default();
        let Some(server) = servers
            .iter()
            .find(|s| s.get("host").and_then(Value::as_str) == Some(self.provider.host.as_str()))
        else {
            return Ok(Convergence::diverged("missing"));
        };

        let port = value_str(server.get("port"));
        let username = value_str(server.get("username"));
        Ok(Convergence::when(
            port.as_deref() == Some(self.provider.port.to_string().as_str())
                && username.as_deref() == Some(self.provider.username.as_str()),
            || "port or username differs".into(),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let p = &self.provider;
        ctx.sabnzbd_client()?
            .set_server(&NewsServer {
                host: p.host.clone(),
                port: p.port,
                username: p.username.clone(),
                password: p.password.clone(),
                connections: p.connections,
                ssl: p.ssl,
            })
            .await?;
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

struct ApiKeyCheck;

#[async_trait]
impl VerificationCheck for ApiKeyCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Sabnzbd)
    }

    fn description(&self) -> String {
        "SABnzbd accepts API key".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Sabnzbd).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        // `mode=version` needs no key; a config read proves the key works.
        ctx.sabnzbd_client()?.config_section("misc").await?;
        Ok(CheckOutcome::Pass)
    }
}

struct CategoriesCheck {
    expected: Vec<String>,
}

#[async_trait]
impl VerificationCheck for CategoriesCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Sabnzbd)
    }

    fn description(&self) -> String {
        "SABnzbd categories present".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Sabnzbd).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        if self.expected.is_empty() {
            return Ok(CheckOutcome::skip("no *arr uses SABnzbd"));
        }
        let section = ctx.sabnzbd_client()?.config_section("categories").await?;
        let present = category_names(&section);
        let missing: Vec<_> = self
            .expected
            .iter()
            .filter(|c| !present.contains(c))
            .map(String::as_str)
            .collect();
        Ok(CheckOutcome::pass_if(missing.is_empty(), || {
            format!("missing: {}", missing.join(", "))
        }))
    }
}
