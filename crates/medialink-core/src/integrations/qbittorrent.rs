// qBittorrent: WebUI credentials, default save path, one category per *arr.

use std::sync::Arc;

use async_trait::async_trait;
use medialink_api::QbitClient;
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::{CredentialKind, ephemeral_password, qbittorrent_log};
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::same_path;
use crate::links::{DesiredLink, LinkKind};
use crate::registry::ServiceName;
use crate::verify::{CheckOutcome, VerificationCheck};

/// Username qBittorrent pairs with its temporary first-start password.
const DEFAULT_WEBUI_USER: &str = "admin";

pub struct QbittorrentIntegration;

impl ServiceIntegration for QbittorrentIntegration {
    fn service(&self) -> ServiceName {
        ServiceName::Qbittorrent
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        Some(CredentialKind::Password)
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        let session = Arc::new(Session::new(ctx.qbit_client()?));
        let torrents = torrent_root(ctx);

        let mut actions: Vec<Box<dyn ConfigurationAction>> = vec![
            Box::new(LoginAction {
                session: Arc::clone(&session),
            }),
            Box::new(SavePathAction {
                session: Arc::clone(&session),
                path: torrents.clone(),
            }),
        ];

        let mut seen = Vec::new();
        for link in downloader_links(ctx) {
            let Some(category) = link.field("category") else {
                continue;
            };
            if seen.contains(&category) {
                continue;
            }
            seen.push(category);
            actions.push(Box::new(CategoryAction {
                session: Arc::clone(&session),
                link: link.clone(),
                name: category.to_owned(),
                save_path: format!("{torrents}/{category}"),
            }));
        }

        Ok(actions)
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        let expected = downloader_links(ctx)
            .filter_map(|l| l.field("category").map(str::to_owned))
            .collect();
        vec![Box::new(LoginCheck), Box::new(CategoriesCheck { expected })]
    }
}

fn torrent_root(ctx: &RunContext) -> String {
    format!("{}/torrents", ctx.settings().paths.downloads.trim_end_matches('/'))
}

fn downloader_links(ctx: &RunContext) -> impl Iterator<Item = &DesiredLink> {
    ctx.links()
        .iter()
        .filter(|l| l.kind == LinkKind::DownloadClient && l.to == ServiceName::Qbittorrent)
}

async fn declared_login(client: &QbitClient, ctx: &RunContext) -> Result<(), CoreError> {
    let admin = &ctx.settings().admin;
    client.login(&admin.username, &admin.password).await?;
    Ok(())
}

// ── Session ─────────────────────────────────────────────────────────

/// One cookie session shared by every qBittorrent action of a run.
struct Session {
    client: QbitClient,
    logged_in: OnceCell<()>,
}

impl Session {
    fn new(client: QbitClient) -> Self {
        Self {
            client,
            logged_in: OnceCell::new(),
        }
    }

    async fn client(&self, ctx: &RunContext) -> Result<&QbitClient, CoreError> {
        self.logged_in
            .get_or_try_init(|| declared_login(&self.client, ctx))
            .await?;
        Ok(&self.client)
    }
}

// ── Actions ─────────────────────────────────────────────────────────

/// The WebUI accepts the declared credentials.
///
/// Fresh installs only log a temporary password. When the declared login
/// is refused, the latest temporary password is read from the log and used
/// to set the declared credentials. Best effort: the log may have rotated.
struct LoginAction {
    session: Arc<Session>,
}

#[async_trait]
impl ConfigurationAction for LoginAction {
    fn target(&self) -> ServiceName {
        ServiceName::Qbittorrent
    }

    fn description(&self) -> String {
        "WebUI credentials".into()
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        match declared_login(&self.session.client, ctx).await {
            Ok(()) => {
                let _ = self.session.logged_in.set(());
                Ok(Convergence::Satisfied)
            }
            Err(CoreError::AuthenticationFailed { .. }) => {
                Ok(Convergence::diverged("declared WebUI password rejected"))
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let log = qbittorrent_log(ctx.settings());
        let temporary = ephemeral_password(&log).ok_or_else(|| {
            CoreError::action(format!(
                "declared password rejected and no temporary password in {}",
                log.display()
            ))
        })?;

        info!("logging in with qBittorrent's temporary password");
        self.session
            .client
            .login(DEFAULT_WEBUI_USER, &temporary)
            .await?;

        let admin = &ctx.settings().admin;
        self.session
            .client
            .set_preferences(&json!({
                "web_ui_username": admin.username,
                "web_ui_password": admin.password.expose_secret(),
            }))
            .await?;
        Ok(())
    }
}

/// Default save path under the downloads directory.
struct SavePathAction {
    session: Arc<Session>,
    path: String,
}

#[async_trait]
impl ConfigurationAction for SavePathAction {
    fn target(&self) -> ServiceName {
        ServiceName::Qbittorrent
    }

    fn description(&self) -> String {
        format!("default save path {}", self.path)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let prefs = self.session.client(ctx).await?.preferences().await?;
        let current = prefs.get("save_path").and_then(|v| v.as_str()).unwrap_or("");
        debug!(current, desired = %self.path, "qBittorrent save path");
        Ok(Convergence::when(same_path(current, &self.path), || {
            format!("save path is '{current}'")
        }))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        self.session
            .client(ctx)
            .await?
            .set_preferences(&json!({ "save_path": self.path }))
            .await?;
        Ok(())
    }
}

/// A category the *arr apps tag their grabs with.
struct CategoryAction {
    session: Arc<Session>,
    link: DesiredLink,
    name: String,
    save_path: String,
}

#[async_trait]
impl ConfigurationAction for CategoryAction {
    fn target(&self) -> ServiceName {
        ServiceName::Qbittorrent
    }

    fn description(&self) -> String {
        format!("category '{}'", self.name)
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let categories = self.session.client(ctx).await?.categories().await?;
        Ok(match categories.get(&self.name) {
            None => Convergence::diverged("missing"),
            Some(c) => Convergence::when(same_path(&c.save_path, &self.save_path), || {
                format!("save path is '{}'", c.save_path)
            }),
        })
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = self.session.client(ctx).await?;
        if client.categories().await?.contains_key(&self.name) {
            client.edit_category(&self.name, &self.save_path).await?;
        } else {
            client.create_category(&self.name, &self.save_path).await?;
        }
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

struct LoginCheck;

#[async_trait]
impl VerificationCheck for LoginCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Qbittorrent)
    }

    fn description(&self) -> String {
        "qBittorrent accepts declared credentials".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        let client = ctx.qbit_client()?;
        Ok(match declared_login(&client, ctx).await {
            Ok(()) => CheckOutcome::Pass,
            Err(CoreError::AuthenticationFailed { message }) => CheckOutcome::fail(message),
            Err(e) => return Err(e),
        })
    }
}

struct CategoriesCheck {
    expected: Vec<String>,
}

#[async_trait]
impl VerificationCheck for CategoriesCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Qbittorrent)
    }

    fn description(&self) -> String {
        "qBittorrent categories present".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if self.expected.is_empty() {
            return Ok(CheckOutcome::skip("no *arr uses qBittorrent"));
        }
        let client = ctx.qbit_client()?;
        declared_login(&client, ctx).await?;
        let categories = client.categories().await?;
        let missing: Vec<_> = self
            .expected
            .iter()
            .filter(|c| !categories.contains_key(c.as_str()))
            .map(String::as_str)
            .collect();
        Ok(CheckOutcome::pass_if(missing.is_empty(), || {
            format!("missing: {}", missing.join(", "))
        }))
    }
}
