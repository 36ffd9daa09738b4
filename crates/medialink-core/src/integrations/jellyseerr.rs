// Jellyseerr: Jellyfin login and libraries, Sonarr/Radarr servers, then
// the portal is marked initialised.
//
// First-run setup only works through a cookie session opened by logging in
// via Jellyfin, so every action shares one session. The API key from
// settings.json is only used by the verification checks.

use std::sync::Arc;

use async_trait::async_trait;
use medialink_api::JellyseerrClient;
use medialink_api::jellyseerr::{ArrFlavor, ArrServer, JellyfinLogin};
use secrecy::ExposeSecret;
use serde_json::{Map, Value, json};
use tokio::sync::OnceCell;

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::CredentialKind;
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::{peer_unavailable, same_path};
use crate::links::{DesiredLink, LinkKind};
use crate::registry::ServiceName;
use crate::verify::{CheckOutcome, VerificationCheck};

/// Jellyseerr's `mediaServerType` for Jellyfin.
const MEDIA_SERVER_JELLYFIN: u8 = 2;

pub struct JellyseerrIntegration;

impl ServiceIntegration for JellyseerrIntegration {
    fn service(&self) -> ServiceName {
        ServiceName::Jellyseerr
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        None
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        let session = Arc::new(Session::new(ctx.jellyseerr_session()?));
        let mut actions: Vec<Box<dyn ConfigurationAction>> = Vec::new();

        for link in ctx.links_from(ServiceName::Jellyseerr, LinkKind::MediaServer) {
            actions.push(Box::new(MediaServerAction {
                session: Arc::clone(&session),
                link: link.clone(),
            }));
            actions.push(Box::new(LibrariesAction {
                session: Arc::clone(&session),
            }));
        }
        for link in ctx.links_from(ServiceName::Jellyseerr, LinkKind::ArrServer) {
            actions.push(Box::new(ArrServerAction {
                session: Arc::clone(&session),
                link: link.clone(),
            }));
        }
        actions.push(Box::new(InitializeAction { session }));

        Ok(actions)
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        let mut checks: Vec<Box<dyn VerificationCheck>> = vec![Box::new(InitializedCheck)];
        for link in ctx.links_from(ServiceName::Jellyseerr, LinkKind::ArrServer) {
            checks.push(Box::new(ServerCheck { app: link.to }));
        }
        checks
    }
}

fn flavor(app: ServiceName) -> ArrFlavor {
    match app {
        ServiceName::Radarr => ArrFlavor::Radarr,
        _ => ArrFlavor::Sonarr,
    }
}

/// Jellyfin must be up for any portal setup.
fn jellyfin_unavailable(ctx: &RunContext) -> Option<String> {
    if !ctx.is_enabled(ServiceName::Jellyfin) {
        Some("Jellyfin is disabled".into())
    } else if !ctx.is_ready(ServiceName::Jellyfin) {
        Some("Jellyfin is not ready".into())
    } else {
        None
    }
}

// ── Session ─────────────────────────────────────────────────────────

struct Session {
    client: JellyseerrClient,
    logged_in: OnceCell<()>,
}

impl Session {
    fn new(client: JellyseerrClient) -> Self {
        Self {
            client,
            logged_in: OnceCell::new(),
        }
    }

    async fn login(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let admin = &ctx.settings().admin;
        let jellyfin = ctx.descriptor(ServiceName::Jellyfin);
        self.client
            .login_jellyfin(&JellyfinLogin {
                username: &admin.username,
                password: &admin.password,
                hostname: jellyfin.internal_host(),
                port: jellyfin.internal_port(),
                use_ssl: false,
                email: &admin.email,
            })
            .await?;
        Ok(())
    }

    async fn client(&self, ctx: &RunContext) -> Result<&JellyseerrClient, CoreError> {
        self.logged_in.get_or_try_init(|| self.login(ctx)).await?;
        Ok(&self.client)
    }
}

// ── Actions ─────────────────────────────────────────────────────────

/// The portal uses Jellyfin as its media server. On an unconfigured
/// portal the first Jellyfin login records the server address.
struct MediaServerAction {
    session: Arc<Session>,
    link: DesiredLink,
}

#[async_trait]
impl ConfigurationAction for MediaServerAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyseerr
    }

    fn description(&self) -> String {
        "Jellyfin media server".into()
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        jellyfin_unavailable(ctx)
    }

    async fn check(&self, _ctx: &RunContext) -> Result<Convergence, CoreError> {
        let public = self.session.client.public_settings().await?;
        Ok(Convergence::when(
            public.media_server_type == Some(MEDIA_SERVER_JELLYFIN),
            || "media server not configured".into(),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        self.session.client(ctx).await?;
        Ok(())
    }
}

/// Every Jellyfin library is synced and enabled.
struct LibrariesAction {
    session: Arc<Session>,
}

#[async_trait]
impl ConfigurationAction for LibrariesAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyseerr
    }

    fn description(&self) -> String {
        "Jellyfin libraries enabled".into()
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        jellyfin_unavailable(ctx)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let settings = self.session.client(ctx).await?.jellyfin_settings().await?;
        let libraries = settings
            .get("libraries")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let disabled = libraries
            .iter()
            .filter(|l| !l.get("enabled").and_then(Value::as_bool).unwrap_or(false))
            .count();

        Ok(if libraries.is_empty() {
            Convergence::diverged("no libraries synced")
        } else {
            Convergence::when(disabled == 0, || format!("{disabled} libraries disabled"))
        })
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = self.session.client(ctx).await?;
        let libraries = client.sync_libraries().await?;
        if libraries.is_empty() {
            return Err(CoreError::action("Jellyfin reported no libraries"));
        }
        let ids: Vec<String> = libraries.into_iter().map(|l| l.id).collect();
        client.enable_libraries(&ids).await?;
        Ok(())
    }
}

/// Requests are forwarded to the linked *arr with the declared quality
/// profile and its media root folder.
struct ArrServerAction {
    session: Arc<Session>,
    link: DesiredLink,
}

impl ArrServerAction {
    async fn desired(&self, ctx: &RunContext, id: Option<i64>) -> Result<ArrServer, CoreError> {
        let app = self.link.to;
        let descriptor = ctx.descriptor(app);
        let key = ctx.require_api_key(app)?;
        let wanted = &ctx.settings().quality_profile;
        let root = ctx
            .settings()
            .paths
            .for_service(app)
            .unwrap_or_default()
            .to_owned();

        let profiles = ctx.arr_client(app)?.quality_profiles().await?;
        let profile = profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                CoreError::action(format!("{app} has no quality profile '{wanted}'"))
            })?;

        let mut extra = Map::new();
        extra.insert("syncEnabled".into(), json!(true));
        extra.insert("preventSearch".into(), json!(false));
        if app == ServiceName::Radarr {
            extra.insert("minimumAvailability".into(), json!("released"));
        } else {
            extra.insert("enableSeasonFolders".into(), json!(true));
        }

        Ok(ArrServer {
            id,
            name: app.display_name().to_owned(),
            hostname: descriptor.internal_host().to_owned(),
            port: descriptor.internal_port(),
            api_key: key.expose_secret().to_owned(),
            use_ssl: false,
            base_url: String::new(),
            active_profile_id: profile.id,
            active_profile_name: profile.name.clone(),
            active_directory: root,
            is4k: false,
            is_default: true,
            extra,
        })
    }
}

#[async_trait]
impl ConfigurationAction for ArrServerAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyseerr
    }

    fn description(&self) -> String {
        format!("{} server", self.link.to.display_name())
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        peer_unavailable(ctx, self.link.to).or_else(|| jellyfin_unavailable(ctx))
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let servers = self
            .session
            .client(ctx)
            .await?
            .servers(flavor(self.link.to))
            .await?;
        let host = ctx.descriptor(self.link.to).internal_host();
        let Some(current) = servers.iter().find(|s| s.hostname == host) else {
            return Ok(Convergence::diverged("missing"));
        };

        let desired = self.desired(ctx, current.id).await?;
        Ok(Convergence::when(
            current.port == desired.port
                && current.active_profile_id == desired.active_profile_id
                && same_path(&current.active_directory, &desired.active_directory),
            || "port, profile or root folder differs".into(),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = self.session.client(ctx).await?;
        let flavor = flavor(self.link.to);
        let host = ctx.descriptor(self.link.to).internal_host();
        let existing = client
            .servers(flavor)
            .await?
            .into_iter()
            .find(|s| s.hostname == host);

        match existing {
            Some(current) => {
                let desired = self.desired(ctx, current.id).await?;
                client.update_server(flavor, &desired).await?;
            }
            None => {
                let desired = self.desired(ctx, None).await?;
                client.add_server(flavor, &desired).await?;
            }
        }
        Ok(())
    }
}

struct InitializeAction {
    session: Arc<Session>,
}

#[async_trait]
impl ConfigurationAction for InitializeAction {
    fn target(&self) -> ServiceName {
        ServiceName::Jellyseerr
    }

    fn description(&self) -> String {
        "portal initialised".into()
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        jellyfin_unavailable(ctx)
    }

    async fn check(&self, _ctx: &RunContext) -> Result<Convergence, CoreError> {
        let public = self.session.client.public_settings().await?;
        Ok(Convergence::when(public.initialized, || "not initialised".into()))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        self.session.client(ctx).await?.initialize().await?;
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

struct InitializedCheck;

#[async_trait]
impl VerificationCheck for InitializedCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Jellyseerr)
    }

    fn description(&self) -> String {
        "Jellyseerr initialised".into()
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        let public = ctx.jellyseerr_session()?.public_settings().await?;
        Ok(CheckOutcome::pass_if(public.initialized, || {
            "setup not finished".into()
        }))
    }
}

struct ServerCheck {
    app: ServiceName,
}

#[async_trait]
impl VerificationCheck for ServerCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(ServiceName::Jellyseerr)
    }

    fn description(&self) -> String {
        format!("Jellyseerr forwards to {}", self.app.display_name())
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if ctx.api_key(ServiceName::Jellyseerr).is_none() {
            return Ok(CheckOutcome::skip("API key unknown"));
        }
        let servers = ctx.jellyseerr_client()?.servers(flavor(self.app)).await?;
        let host = ctx.descriptor(self.app).internal_host();
        Ok(CheckOutcome::pass_if(
            servers.iter().any(|s| s.hostname == host),
            || "not registered".into(),
        ))
    }
}
