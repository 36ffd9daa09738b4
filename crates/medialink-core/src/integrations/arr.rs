// Sonarr, Radarr and Lidarr share one API shape, so one integration
// covers all three: forms auth, root folder, download clients, quality
// profile upgrades and the Jellyfin library-refresh notification.

use async_trait::async_trait;
use medialink_api::ArrClient;
use medialink_api::arr::{Provider, RootFolder};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::action::{ConfigurationAction, Convergence};
use crate::context::RunContext;
use crate::credentials::CredentialKind;
use crate::error::CoreError;
use crate::integration::ServiceIntegration;
use crate::integrations::{same_path, value_str};
use crate::links::{DesiredLink, LinkKind};
use crate::registry::ServiceName;
use crate::verify::{CheckOutcome, VerificationCheck};

pub struct ArrIntegration {
    service: ServiceName,
}

impl ArrIntegration {
    pub fn new(service: ServiceName) -> Self {
        Self { service }
    }
}

impl ServiceIntegration for ArrIntegration {
    fn service(&self) -> ServiceName {
        self.service
    }

    fn required_credential(&self) -> Option<CredentialKind> {
        Some(CredentialKind::ApiKey)
    }

    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError> {
        let service = self.service;
        let mut actions: Vec<Box<dyn ConfigurationAction>> = vec![Box::new(AuthAction { service })];

        if let Some(path) = ctx.settings().paths.for_service(service) {
            actions.push(Box::new(RootFolderAction {
                service,
                path: path.to_owned(),
            }));
        }

        for link in ctx.links_from(service, LinkKind::DownloadClient) {
            actions.push(Box::new(DownloadClientAction { link: link.clone() }));
        }

        actions.push(Box::new(QualityProfileAction {
            service,
            name: ctx.settings().quality_profile.clone(),
        }));

        for link in ctx.links_from(service, LinkKind::Notification) {
            actions.push(Box::new(NotificationAction { link: link.clone() }));
        }

        Ok(actions)
    }

    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>> {
        let service = self.service;
        let mut checks: Vec<Box<dyn VerificationCheck>> = vec![Box::new(ApiKeyCheck { service })];

        if let Some(path) = ctx.settings().paths.for_service(service) {
            checks.push(Box::new(RootFolderCheck {
                service,
                path: path.to_owned(),
            }));
        }
        for link in ctx.links_from(service, LinkKind::DownloadClient) {
            checks.push(Box::new(ProviderCheck::download_client(service, link.to)));
        }
        if ctx.links_from(service, LinkKind::Notification).next().is_some() {
            checks.push(Box::new(ProviderCheck::jellyfin_notification(service)));
        }
        checks
    }
}

/// Field that carries the downloader category for each app.
fn category_field(service: ServiceName) -> &'static str {
    match service {
        ServiceName::Radarr => "movieCategory",
        ServiceName::Lidarr => "musicCategory",
        _ => "tvCategory",
    }
}

/// `Skip` when the app's own key is unknown.
fn key_unknown(ctx: &RunContext, service: ServiceName) -> Option<CheckOutcome> {
    ctx.api_key(service)
        .is_none()
        .then(|| CheckOutcome::skip("API key unknown"))
}

/// Compare the named string-ish fields of two providers.
fn drifted_fields(current: &Provider, desired: &Provider, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .filter(|name| value_str(current.field(name)) != value_str(desired.field(name)))
        .map(|name| (*name).to_owned())
        .collect()
}

// ── Authentication ──────────────────────────────────────────────────

/// Forms authentication with the declared admin. Shared with Prowlarr.
pub(crate) struct AuthAction {
    pub(crate) service: ServiceName,
}

#[async_trait]
impl ConfigurationAction for AuthAction {
    fn target(&self) -> ServiceName {
        self.service
    }

    fn description(&self) -> String {
        "forms authentication".into()
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let host = ctx.arr_client(self.service)?.host_config().await?;
        let method = host
            .get("authenticationMethod")
            .and_then(Value::as_str)
            .unwrap_or("none");
        let username = host.get("username").and_then(Value::as_str).unwrap_or("");

        Ok(Convergence::when(
            method.eq_ignore_ascii_case("forms") && username == ctx.settings().admin.username,
            || format!("authentication is '{method}' for user '{username}'"),
        ))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = ctx.arr_client(self.service)?;
        let mut host = client.host_config().await?;
        let admin = &ctx.settings().admin;
        let obj = host
            .as_object_mut()
            .ok_or_else(|| CoreError::action("host config is not an object"))?;

        obj.insert("authenticationMethod".into(), json!("forms"));
        obj.insert("authenticationRequired".into(), json!("enabled"));
        obj.insert("username".into(), json!(admin.username));
        obj.insert("password".into(), json!(admin.password.expose_secret()));
        obj.insert("passwordConfirmation".into(), json!(admin.password.expose_secret()));

        client.update_host_config(&host).await?;
        Ok(())
    }
}

// ── Root folder ─────────────────────────────────────────────────────

/// The declared media path is the only root folder. Anything else (e.g.
/// a `/downloads` root left by an earlier bad run) is deleted first.
struct RootFolderAction {
    service: ServiceName,
    path: String,
}

impl RootFolderAction {
    /// Lidarr needs default profiles on a new root folder.
    async fn new_folder(&self, client: &ArrClient) -> Result<RootFolder, CoreError> {
        let mut folder = RootFolder::new(&self.path);
        if self.service == ServiceName::Lidarr {
            let name = self
                .path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or("Music");
            folder.extra.insert("name".into(), json!(name));
            if let Some(profile) = client.quality_profiles().await?.first() {
                folder
                    .extra
                    .insert("defaultQualityProfileId".into(), json!(profile.id));
            }
            if let Some(profile) = client.metadata_profiles().await?.first() {
                folder
                    .extra
                    .insert("defaultMetadataProfileId".into(), json!(profile.id));
            }
        }
        Ok(folder)
    }
}

#[async_trait]
impl ConfigurationAction for RootFolderAction {
    fn target(&self) -> ServiceName {
        self.service
    }

    fn description(&self) -> String {
        format!("root folder {}", self.path)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let folders = ctx.arr_client(self.service)?.root_folders().await?;
        let has_desired = folders.iter().any(|f| same_path(&f.path, &self.path));
        let stale: Vec<_> = folders
            .iter()
            .filter(|f| !same_path(&f.path, &self.path))
            .map(|f| f.path.as_str())
            .collect();

        Ok(if stale.is_empty() {
            Convergence::when(has_desired, || "missing".into())
        } else {
            Convergence::diverged(format!("stale root folders: {}", stale.join(", ")))
        })
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = ctx.arr_client(self.service)?;
        let folders = client.root_folders().await?;

        for folder in folders.iter().filter(|f| !same_path(&f.path, &self.path)) {
            if let Some(id) = folder.id {
                info!(service = %self.service, path = %folder.path, "deleting stale root folder");
                client.delete_root_folder(id).await?;
            }
        }

        if !folders.iter().any(|f| same_path(&f.path, &self.path)) {
            let folder = self.new_folder(&client).await?;
            client.add_root_folder(&folder).await?;
        }
        Ok(())
    }
}

// ── Download clients ────────────────────────────────────────────────

struct DownloadClientAction {
    link: DesiredLink,
}

impl DownloadClientAction {
    fn desired(&self, ctx: &RunContext) -> Result<Provider, CoreError> {
        let service = self.link.from;
        let downloader = ctx.descriptor(self.link.to);
        let category = self.link.field("category").unwrap_or_default();

        let provider = match self.link.to {
            ServiceName::Qbittorrent => {
                let admin = &ctx.settings().admin;
                Provider::new("qBittorrent", "QBittorrent", "QBittorrentSettings")
                    .with_attr("protocol", "torrent")
                    .with_field("username", admin.username.as_str())
                    .with_field("password", admin.password.expose_secret())
            }
            ServiceName::Sabnzbd => {
                let key = ctx.require_api_key(ServiceName::Sabnzbd)?;
                Provider::new("SABnzbd", "Sabnzbd", "SabnzbdSettings")
                    .with_attr("protocol", "usenet")
                    .with_field("apiKey", key.expose_secret())
            }
            other => {
                return Err(CoreError::action(format!("{other} is not a download client")));
            }
        };

        Ok(provider
            .with_attr("enable", true)
            .with_attr("priority", 1)
            .with_attr("removeCompletedDownloads", true)
            .with_attr("removeFailedDownloads", true)
            .with_field("host", downloader.internal_host())
            .with_field("port", downloader.internal_port())
            .with_field("useSsl", false)
            .with_field(category_field(service), category))
    }

    fn compared_fields(&self) -> [&'static str; 3] {
        ["host", "port", category_field(self.link.from)]
    }
}

#[async_trait]
impl ConfigurationAction for DownloadClientAction {
    fn target(&self) -> ServiceName {
        self.link.from
    }

    fn description(&self) -> String {
        format!("download client {}", self.link.to.display_name())
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        (self.link.to == ServiceName::Sabnzbd && ctx.api_key(ServiceName::Sabnzbd).is_none())
            .then(|| "SABnzbd API key unknown".into())
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let desired = self.desired(ctx)?;
        let clients = ctx.arr_client(self.link.from)?.download_clients().await?;
        let Some(current) = clients
            .iter()
            .find(|c| c.implementation == desired.implementation)
        else {
            return Ok(Convergence::diverged("missing"));
        };

        let drift = drifted_fields(current, &desired, &self.compared_fields());
        Ok(Convergence::when(drift.is_empty(), || {
            format!("drifted: {}", drift.join(", "))
        }))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let desired = self.desired(ctx)?;
        let client = ctx.arr_client(self.link.from)?;
        let existing = client
            .download_clients()
            .await?
            .into_iter()
            .find(|c| c.implementation == desired.implementation);

        match existing {
            Some(mut current) => {
                debug!(id = ?current.id, "updating download client in place");
                for field in &desired.fields {
                    current.set_field(&field.name, field.value.clone());
                }
                client.update_download_client(&current).await?;
            }
            None => {
                client.add_download_client(&desired).await?;
            }
        }
        Ok(())
    }
}

// ── Quality profile ─────────────────────────────────────────────────

struct QualityProfileAction {
    service: ServiceName,
    name: String,
}

#[async_trait]
impl ConfigurationAction for QualityProfileAction {
    fn target(&self) -> ServiceName {
        self.service
    }

    fn description(&self) -> String {
        format!("quality profile '{}' allows upgrades", self.name)
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let profiles = ctx.arr_client(self.service)?.quality_profiles().await?;
        let profile = profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&self.name))
            .ok_or_else(|| CoreError::action(format!("quality profile '{}' not found", self.name)))?;
        Ok(Convergence::when(profile.upgrade_allowed, || {
            "upgrades disabled".into()
        }))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let client = ctx.arr_client(self.service)?;
        let mut profile = client
            .quality_profiles()
            .await?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(&self.name))
            .ok_or_else(|| CoreError::action(format!("quality profile '{}' not found", self.name)))?;
        profile.upgrade_allowed = true;
        client.update_quality_profile(&profile).await?;
        Ok(())
    }
}

// ── Jellyfin notification ───────────────────────────────────────────

struct NotificationAction {
    link: DesiredLink,
}

impl NotificationAction {
    fn desired(ctx: &RunContext) -> Result<Provider, CoreError> {
        let jellyfin = ctx.descriptor(ServiceName::Jellyfin);
        let key = ctx.require_api_key(ServiceName::Jellyfin)?;
        Ok(
            Provider::new("Jellyfin", "MediaBrowser", "MediaBrowserSettings")
                .with_attr("onDownload", true)
                .with_attr("onUpgrade", true)
                .with_attr("onRename", true)
                .with_field("host", jellyfin.internal_host())
                .with_field("port", jellyfin.internal_port())
                .with_field("useSsl", false)
                .with_field("apiKey", key.expose_secret())
                .with_field("notify", false)
                .with_field("updateLibrary", true),
        )
    }
}

#[async_trait]
impl ConfigurationAction for NotificationAction {
    fn target(&self) -> ServiceName {
        self.link.from
    }

    fn description(&self) -> String {
        "Jellyfin library notification".into()
    }

    fn link(&self) -> Option<&DesiredLink> {
        Some(&self.link)
    }

    fn skip_reason(&self, ctx: &RunContext) -> Option<String> {
        ctx.api_key(ServiceName::Jellyfin)
            .is_none()
            .then(|| "Jellyfin API key unknown".into())
    }

    async fn check(&self, ctx: &RunContext) -> Result<Convergence, CoreError> {
        let desired = Self::desired(ctx)?;
        let notifications = ctx.arr_client(self.link.from)?.notifications().await?;
        let Some(current) = notifications
            .iter()
            .find(|n| n.implementation == desired.implementation)
        else {
            return Ok(Convergence::diverged("missing"));
        };
        let drift = drifted_fields(current, &desired, &["host", "port"]);
        Ok(Convergence::when(drift.is_empty(), || {
            format!("drifted: {}", drift.join(", "))
        }))
    }

    async fn apply(&self, ctx: &RunContext) -> Result<(), CoreError> {
        let desired = Self::desired(ctx)?;
        let client = ctx.arr_client(self.link.from)?;
        let existing = client
            .notifications()
            .await?
            .into_iter()
            .find(|n| n.implementation == desired.implementation);

        match existing {
            Some(mut current) => {
                for field in &desired.fields {
                    current.set_field(&field.name, field.value.clone());
                }
                client.update_notification(&current).await?;
            }
            None => {
                client.add_notification(&desired).await?;
            }
        }
        Ok(())
    }
}

// ── Checks ──────────────────────────────────────────────────────────

/// The app's key from disk is accepted. Shared with Prowlarr.
pub(crate) struct ApiKeyCheck {
    pub(crate) service: ServiceName,
}

#[async_trait]
impl VerificationCheck for ApiKeyCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(self.service)
    }

    fn description(&self) -> String {
        format!("{} accepts API key", self.service.display_name())
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if let Some(skip) = key_unknown(ctx, self.service) {
            return Ok(skip);
        }
        let status = ctx.arr_client(self.service)?.system_status().await?;
        debug!(service = %self.service, version = %status.version, "API key accepted");
        Ok(CheckOutcome::Pass)
    }
}

struct RootFolderCheck {
    service: ServiceName,
    path: String,
}

#[async_trait]
impl VerificationCheck for RootFolderCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(self.service)
    }

    fn description(&self) -> String {
        format!("{} root folder {}", self.service.display_name(), self.path)
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if let Some(skip) = key_unknown(ctx, self.service) {
            return Ok(skip);
        }
        let folders = ctx.arr_client(self.service)?.root_folders().await?;
        Ok(CheckOutcome::pass_if(
            folders.iter().any(|f| same_path(&f.path, &self.path)),
            || {
                let paths: Vec<_> = folders.iter().map(|f| f.path.as_str()).collect();
                format!("root folders are [{}]", paths.join(", "))
            },
        ))
    }
}

/// A download client or notification with the given implementation exists.
struct ProviderCheck {
    service: ServiceName,
    label: String,
    implementation: &'static str,
    notification: bool,
}

impl ProviderCheck {
    fn download_client(service: ServiceName, downloader: ServiceName) -> Self {
        let implementation = match downloader {
            ServiceName::Sabnzbd => "Sabnzbd",
            _ => "QBittorrent",
        };
        Self {
            service,
            label: format!("download client {}", downloader.display_name()),
            implementation,
            notification: false,
        }
    }

    fn jellyfin_notification(service: ServiceName) -> Self {
        Self {
            service,
            label: "Jellyfin notification".into(),
            implementation: "MediaBrowser",
            notification: true,
        }
    }
}

#[async_trait]
impl VerificationCheck for ProviderCheck {
    fn service(&self) -> Option<ServiceName> {
        Some(self.service)
    }

    fn description(&self) -> String {
        format!("{} {}", self.service.display_name(), self.label)
    }

    async fn probe(&self, ctx: &RunContext) -> Result<CheckOutcome, CoreError> {
        if let Some(skip) = key_unknown(ctx, self.service) {
            return Ok(skip);
        }
        let client = ctx.arr_client(self.service)?;
        let providers = if self.notification {
            client.notifications().await?
        } else {
            client.download_clients().await?
        };
        Ok(CheckOutcome::pass_if(
            providers.iter().any(|p| p.implementation == self.implementation),
            || "not registered".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn category_fields_per_app() {
        assert_eq!(category_field(ServiceName::Sonarr), "tvCategory");
        assert_eq!(category_field(ServiceName::Radarr), "movieCategory");
        assert_eq!(category_field(ServiceName::Lidarr), "musicCategory");
    }

    #[test]
    fn drift_compares_numbers_and_strings_alike() {
        let current = Provider::new("q", "QBittorrent", "c")
            .with_field("host", "qbittorrent")
            .with_field("port", json!("8080"));
        let desired = Provider::new("q", "QBittorrent", "c")
            .with_field("host", "qbittorrent")
            .with_field("port", 8080);
        assert!(drifted_fields(&current, &desired, &["host", "port"]).is_empty());

        let moved = desired.clone().with_field("host", "torrent");
        assert_eq!(drifted_fields(&current, &moved, &["host", "port"]), vec!["host"]);
    }
}
